//! Progress-callback trait for page and section events.
//!
//! Inject an [`Arc<dyn TranscriptionProgressCallback>`] via
//! [`crate::config::TranscriptionConfigBuilder::progress_callback`] to observe
//! the pipeline while it fans out. Callers can forward events to a terminal
//! progress bar, a channel or a log without the library knowing about it.
//!
//! # Example
//!
//! ```rust
//! use pdf_transcribe::{TranscriptionConfig, TranscriptionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct SectionCounter(AtomicUsize);
//!
//! impl TranscriptionProgressCallback for SectionCounter {
//!     fn on_section_complete(&self, _page: usize, _section: usize, _sections: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = TranscriptionConfig::builder()
//!     .progress_callback(Arc::new(SectionCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes pages and sections.
///
/// Pages and sections run concurrently, so every method may be invoked from
/// several tasks at once. Implementations must guard shared state with
/// `Mutex`/atomics. All methods default to no-ops.
pub trait TranscriptionProgressCallback: Send + Sync {
    /// Called once, after the PDF has been rendered.
    fn on_document_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called once the page has been split, just before its model calls start.
    fn on_page_start(&self, page_num: usize, total_pages: usize, sections: usize) {
        let _ = (page_num, total_pages, sections);
    }

    /// Called when one section's model call has succeeded.
    ///
    /// `section` is 0-based, in top-to-bottom order.
    fn on_section_complete(&self, page_num: usize, section: usize, sections: usize) {
        let _ = (page_num, section, sections);
    }

    /// Called when a page's markdown has been assembled.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, markdown_len: usize) {
        let _ = (page_num, total_pages, markdown_len);
    }

    /// Called when a page fails. The document will fail with it.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: String) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after every page has finished, successfully or not.
    fn on_document_complete(&self, total_pages: usize, success_pages: usize) {
        let _ = (total_pages, success_pages);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl TranscriptionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::TranscriptionConfig`].
pub type ProgressCallback = Arc<dyn TranscriptionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sections: AtomicUsize,
        errors: Mutex<Vec<String>>,
    }

    impl TranscriptionProgressCallback for Recorder {
        fn on_section_complete(&self, _page: usize, _section: usize, _sections: usize) {
            self.sections.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page: usize, _total: usize, error: String) {
            self.errors.lock().unwrap().push(error);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_document_start(2);
        cb.on_page_start(1, 2, 3);
        cb.on_section_complete(1, 0, 3);
        cb.on_page_complete(1, 2, 42);
        cb.on_page_error(2, 2, "boom".to_string());
        cb.on_document_complete(2, 1);
    }

    #[tokio::test]
    async fn callback_can_move_into_spawned_task() {
        let recorder = Arc::new(Recorder::default());
        let cb: ProgressCallback = Arc::clone(&recorder) as ProgressCallback;

        tokio::spawn(async move {
            cb.on_section_complete(1, 0, 2);
            cb.on_section_complete(1, 1, 2);
            cb.on_page_error(2, 2, "timeout".to_string());
        })
        .await
        .expect("spawn must succeed");

        assert_eq!(recorder.sections.load(Ordering::SeqCst), 2);
        assert_eq!(*recorder.errors.lock().unwrap(), vec!["timeout"]);
    }
}
