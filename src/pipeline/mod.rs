//! Pipeline stages for PDF-to-Markdown transcription.
//!
//! Each submodule implements exactly one transformation step and is
//! independently testable.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ split ──▶ encode ──▶ llm ──▶ postprocess
//! (bytes)   (pdfium)   (rows)    (JPEG)    (VLM)   (normalise)
//!                      └──────────── page ────────────┘
//! ```
//!
//! 1. [`input`]  — `.pdf` name and `%PDF-` header checks; path/URL loading
//! 2. [`render`] — rasterise every page; runs in `spawn_blocking` because
//!    pdfium blocks
//! 3. [`split`]  — cut tall pages into horizontal sections
//! 4. [`encode`] — fit each section into the bounding box and JPEG-encode it
//! 5. [`llm`]    — one vision-model request per section; the only stage with
//!    network I/O
//! 6. [`postprocess`] — deterministic Markdown normalisation
//! 7. [`page`]   — drives 3–6 for one page with bounded concurrency and retry

pub mod encode;
pub mod input;
pub mod llm;
pub mod page;
pub mod postprocess;
pub mod render;
pub mod split;
