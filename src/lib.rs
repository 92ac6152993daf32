//! # pdf-transcribe
//!
//! Transcribe PDF documents to Markdown with a vision language model.
//!
//! Each page is rendered to a bitmap, cut into sections of bounded height,
//! shrunk into a fixed bounding box and JPEG-encoded. Every section is sent
//! to the model concurrently, and the answers are normalised into clean
//! Markdown and stitched back together in page and section order, whatever
//! order the calls complete in.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Check    `.pdf` name, `%PDF-` header
//!  ├─ 2. Render   rasterise pages via pdfium (spawn_blocking)
//!  ├─ 3. Split    sections of ≤ 2000 rows
//!  ├─ 4. Encode   fit into 600×800, JPEG q75
//!  ├─ 5. VLM      one bounded-concurrency call per section, with retry
//!  ├─ 6. Polish   8-step Markdown normalisation, per section and per page
//!  └─ 7. Output   `## Page N` blocks joined in page order
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_transcribe::{Transcriber, TranscriptionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from MISTRAL_API_KEY / OPENAI_API_KEY / …
//!     let transcriber = Transcriber::from_config(TranscriptionConfig::default())?;
//!     let bytes = std::fs::read("document.pdf")?;
//!     let output = transcriber.transcribe("document.pdf", bytes).await?;
//!     println!("{}", output.markdown);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | `pdf-transcribe` binary (clap + indicatif + tracing-subscriber) |
//! | `server` | on      | [`server`] module and `pdf-transcribe-server` binary (axum) |
//!
//! Disable both when using only the library:
//! ```toml
//! pdf-transcribe = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;
pub mod transcribe;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{TranscriptionConfig, TranscriptionConfigBuilder};
pub use error::{ErrorKind, ModelError, TranscribeError};
pub use output::{PageMarkdown, TranscriptionOutput, TranscriptionResponse, TranscriptionStats};
pub use pipeline::encode::EncodedSection;
pub use pipeline::llm::{LlmVisionModel, VisionModel};
pub use pipeline::postprocess::normalize_markdown;
pub use progress::{NoopProgressCallback, ProgressCallback, TranscriptionProgressCallback};
pub use prompts::Prompt;
pub use transcribe::{transcribe_file, transcribe_sync, transcribe_to_file, Transcriber};
