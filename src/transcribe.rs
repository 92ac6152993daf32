//! Document-level entry points: the orchestrator and its convenience wrappers.
//!
//! A [`Transcriber`] owns the resolved vision model, the prompt and the
//! concurrency limiter. Build one per process and share it. Every request it
//! serves draws from the same pool of in-flight model calls.
//!
//! ## Flow of [`Transcriber::transcribe`]
//!
//! ```text
//! (file_name, bytes)
//!   ├─ 1. `.pdf` name check            → Validation error
//!   ├─ 2. `%PDF-` header check         → Decode error
//!   ├─ 3. render all pages (pdfium)    → Decode error
//!   ├─ 4. page pipeline per page, all launched at once, all awaited
//!   └─ 5. join pages in page order, trim
//! ```
//!
//! All-or-nothing: when any section of any page fails, the error of the
//! lowest (page, section) is returned and no markdown is produced.

use crate::config::TranscriptionConfig;
use crate::error::TranscribeError;
use crate::output::{PageMarkdown, TranscriptionOutput, TranscriptionStats};
use crate::pipeline::input;
use crate::pipeline::llm::{LlmVisionModel, VisionModel};
use crate::pipeline::page::{self, PageOutcome, PipelineContext};
use crate::pipeline::render;
use crate::pipeline::split::PageImage;
use crate::prompts::Prompt;
use futures::future::join_all;
use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::info;

/// Timeout for URL downloads in [`transcribe_file`].
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Shared, reusable PDF → Markdown transcriber.
#[derive(Clone)]
pub struct Transcriber {
    ctx: PipelineContext,
}

impl Transcriber {
    /// Build a transcriber around an explicit model.
    pub fn new(model: Arc<dyn VisionModel>, config: TranscriptionConfig) -> Self {
        let prompt = Prompt::resolve(
            config.system_prompt.as_deref(),
            config.user_prompt.as_deref(),
        );
        Self {
            ctx: PipelineContext {
                model,
                prompt: Arc::new(prompt),
                limiter: Arc::new(Semaphore::new(config.concurrency.max(1))),
                config: Arc::new(config),
            },
        }
    }

    /// Build a transcriber whose model is resolved from `config` and the
    /// environment (see [`crate::pipeline::llm::resolve_provider`]).
    pub fn from_config(config: TranscriptionConfig) -> Result<Self, TranscribeError> {
        let model = LlmVisionModel::from_config(&config)?;
        Ok(Self::new(Arc::new(model), config))
    }

    pub fn config(&self) -> &TranscriptionConfig {
        &self.ctx.config
    }

    /// Transcribe a named PDF payload.
    ///
    /// # Errors
    /// - [`TranscribeError::InvalidFileType`] when `file_name` does not end in `.pdf`
    /// - [`TranscribeError::NotAPdf`] when the payload has no PDF header
    /// - any render, encode or model-call failure, see [`TranscribeError::kind`]
    pub async fn transcribe(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<TranscriptionOutput, TranscribeError> {
        let start = Instant::now();
        input::validate_file_name(file_name)?;
        input::check_pdf_magic(&bytes)?;
        info!("Transcribing '{}' ({} bytes)", file_name, bytes.len());

        let render_start = Instant::now();
        let pages = render::render_pdf(bytes, self.ctx.config.dpi).await?;
        let render_duration_ms = render_start.elapsed().as_millis() as u64;
        info!("Rendered {} pages in {}ms", pages.len(), render_duration_ms);

        let mut output = self.run_pages(pages).await?;
        output.stats.render_duration_ms = render_duration_ms;
        output.stats.total_duration_ms = start.elapsed().as_millis() as u64;
        Ok(output)
    }

    /// Transcribe already-rendered page bitmaps, first page first.
    pub async fn transcribe_pages(
        &self,
        pages: Vec<DynamicImage>,
    ) -> Result<TranscriptionOutput, TranscribeError> {
        let start = Instant::now();
        let pages = pages
            .into_iter()
            .enumerate()
            .map(|(i, image)| PageImage {
                page_num: i + 1,
                image,
            })
            .collect();
        let mut output = self.run_pages(pages).await?;
        output.stats.total_duration_ms = start.elapsed().as_millis() as u64;
        Ok(output)
    }

    async fn run_pages(&self, pages: Vec<PageImage>) -> Result<TranscriptionOutput, TranscribeError> {
        let total_pages = pages.len();
        let callback = self.ctx.config.progress_callback.as_ref();
        if let Some(cb) = callback {
            cb.on_document_start(total_pages);
        }

        let results: Vec<Result<PageOutcome, TranscribeError>> =
            join_all(pages.into_iter().map(|p| async move {
                let page_num = p.page_num;
                let result = page::transcribe_page(&self.ctx, p, total_pages).await;
                if let Some(cb) = callback {
                    match &result {
                        Ok(o) => cb.on_page_complete(page_num, total_pages, o.page.markdown.len()),
                        Err(e) => cb.on_page_error(page_num, total_pages, e.to_string()),
                    }
                }
                result
            }))
            .await;

        let success_pages = results.iter().filter(|r| r.is_ok()).count();
        if let Some(cb) = callback {
            cb.on_document_complete(total_pages, success_pages);
        }

        let mut stats = TranscriptionStats {
            total_pages,
            ..Default::default()
        };
        let mut page_markdowns: Vec<PageMarkdown> = Vec::with_capacity(total_pages);
        for result in results {
            let outcome = result?;
            stats.total_sections += outcome.page.section_count;
            stats.model_calls += outcome.model_calls;
            stats.retries += outcome.retries;
            page_markdowns.push(outcome.page);
        }

        let markdown = assemble_document(&page_markdowns);
        info!(
            "Transcribed {} pages ({} sections, {} model calls, {} retries)",
            stats.total_pages, stats.total_sections, stats.model_calls, stats.retries
        );

        Ok(TranscriptionOutput {
            markdown,
            pages: page_markdowns,
            stats,
        })
    }
}

/// Page markdowns in order, separated by blank lines, trimmed.
fn assemble_document(pages: &[PageMarkdown]) -> String {
    pages
        .iter()
        .map(|p| p.markdown.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
        .trim()
        .to_string()
}

/// Transcribe a local PDF file or HTTP/HTTPS URL.
pub async fn transcribe_file(
    input_str: impl AsRef<str>,
    config: &TranscriptionConfig,
) -> Result<TranscriptionOutput, TranscribeError> {
    let doc = input::resolve_input(input_str.as_ref(), DOWNLOAD_TIMEOUT_SECS).await?;
    let transcriber = Transcriber::from_config(config.clone())?;
    transcriber.transcribe(&doc.file_name, doc.bytes).await
}

/// Transcribe a PDF and write the markdown to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn transcribe_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &TranscriptionConfig,
) -> Result<TranscriptionStats, TranscribeError> {
    let output = transcribe_file(input_str, config).await?;
    write_atomic(output_path.as_ref(), &output.markdown).await?;
    Ok(output.stats)
}

/// Write `contents` to a sibling temp file, then rename it over `path`.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), TranscribeError> {
    let write_failed = |source| TranscribeError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_failed)
}

/// Synchronous wrapper around [`transcribe_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn transcribe_sync(
    input_str: impl AsRef<str>,
    config: &TranscriptionConfig,
) -> Result<TranscriptionOutput, TranscribeError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| TranscribeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(transcribe_file(input_str, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: usize, md: &str) -> PageMarkdown {
        PageMarkdown {
            page_num: n,
            section_count: 1,
            markdown: md.to_string(),
        }
    }

    #[test]
    fn document_joins_pages_with_blank_lines() {
        let pages = [page(1, "## Page 1\n\nA."), page(2, "## Page 2\n\nB.")];
        assert_eq!(
            assemble_document(&pages),
            "## Page 1\n\nA.\n\n## Page 2\n\nB."
        );
        assert_eq!(assemble_document(&[]), "");
    }

    #[tokio::test]
    async fn atomic_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/nested/doc.md");
        write_atomic(&path, "# Hi").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Hi");
        assert!(!path.with_extension("md.tmp").exists());
    }
}
