//! Error types for the pdf-transcribe library.
//!
//! Two error types reflect the two layers where things go wrong:
//!
//! * [`TranscribeError`] — **request-level**: the transcription cannot produce
//!   a document. Every variant belongs to exactly one [`ErrorKind`], so callers
//!   (the HTTP layer in particular) can map failures to a client-error or a
//!   processing-error response without string matching.
//!
//! * [`ModelError`] — **call-level**: one vision-model request failed. The page
//!   pipeline decides whether to retry it; once retries are exhausted it is
//!   wrapped into [`TranscribeError::ModelCall`] together with the page and
//!   section it belongs to.

use std::path::PathBuf;
use thiserror::Error;

/// The closed set of failure categories a transcription can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request itself was unacceptable (wrong file type, unreadable input).
    Validation,
    /// The PDF or one of its page bitmaps could not be decoded or re-encoded.
    Decode,
    /// The vision model failed for at least one section.
    RemoteCall,
    /// Configuration, environment or runtime problems on our side.
    Internal,
}

/// All fatal errors returned by the pdf-transcribe library.
#[derive(Debug, Error)]
pub enum TranscribeError {
    // ── Validation ────────────────────────────────────────────────────────
    /// The uploaded file name does not end in `.pdf`.
    #[error("Invalid PDF file: '{file_name}' does not have a .pdf extension")]
    InvalidFileType { file_name: String },

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is neither a readable path nor an HTTP/HTTPS URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Decode ────────────────────────────────────────────────────────────
    /// The payload carries a `.pdf` name but no PDF header.
    #[error("File is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF is corrupt: {detail}")]
    CorruptPdf { detail: String },

    /// The PDF is encrypted.
    #[error("PDF is encrypted and requires a password")]
    PasswordRequired,

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// A page or section bitmap cannot be encoded (e.g. zero area).
    #[error("Invalid bitmap for page {page}, section {section}: {detail}")]
    InvalidImage {
        page: usize,
        section: usize,
        detail: String,
    },

    /// JPEG encoding of a section failed.
    #[error("Image encoding failed for page {page}, section {section}: {detail}")]
    ImageEncode {
        page: usize,
        section: usize,
        detail: String,
    },

    // ── Remote call ───────────────────────────────────────────────────────
    /// The vision model failed for one section after all attempts.
    #[error("Model call failed for page {page}, section {section} after {attempts} attempt(s): {source}")]
    ModelCall {
        page: usize,
        section: usize,
        attempts: u32,
        #[source]
        source: ModelError,
    },

    // ── Internal ──────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Install pdfium system-wide or set PDFIUM_LIB_PATH=/path/to/libpdfium."
    )]
    PdfiumBindingFailed(String),

    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error (panicked task, runtime construction, ...).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TranscribeError {
    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        use TranscribeError::*;
        match self {
            InvalidFileType { .. }
            | FileNotFound { .. }
            | PermissionDenied { .. }
            | InvalidInput { .. }
            | DownloadFailed { .. }
            | DownloadTimeout { .. } => ErrorKind::Validation,
            NotAPdf { .. }
            | CorruptPdf { .. }
            | PasswordRequired
            | RasterisationFailed { .. }
            | InvalidImage { .. }
            | ImageEncode { .. } => ErrorKind::Decode,
            ModelCall { .. } => ErrorKind::RemoteCall,
            ProviderNotConfigured { .. }
            | InvalidConfig(_)
            | PdfiumBindingFailed(_)
            | OutputWriteFailed { .. }
            | Internal(_) => ErrorKind::Internal,
        }
    }

    /// `true` when the caller is at fault and no processing was attempted.
    pub fn is_client_error(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

/// Failure of a single vision-model request.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
#[error("{message}")]
pub struct ModelError {
    /// Provider-supplied description of the failure.
    pub message: String,
    /// Whether repeating the identical request may succeed.
    pub retryable: bool,
}

impl ModelError {
    /// A transient failure (timeout, 429, 5xx, dropped connection).
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// A failure that will not go away by itself (bad credentials, bad request).
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}
