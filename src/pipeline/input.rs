//! Input handling: preconditions on uploaded payloads and resolution of a
//! user-supplied path or URL to an in-memory document.
//!
//! pdfium loads documents straight from a byte buffer, so URL downloads are
//! kept in memory and never touch the file system. The `.pdf` name check and
//! the `%PDF-` header check run before any rendering, so callers get a
//! meaningful error rather than a pdfium failure.

use crate::error::TranscribeError;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// How far into the payload the `%PDF-` header may appear.
///
/// Some producers emit a short preamble before the header, and pdfium
/// accepts the header anywhere within the first kilobyte.
pub const PDF_MAGIC_WINDOW: usize = 1024;
const PDF_MAGIC: &[u8] = b"%PDF-";

/// A named PDF payload, ready for transcription.
#[derive(Debug, Clone)]
pub struct InputDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Accept only file names ending in `.pdf`, case-insensitively.
pub fn validate_file_name(file_name: &str) -> Result<(), TranscribeError> {
    if file_name.to_lowercase().ends_with(".pdf") {
        Ok(())
    } else {
        Err(TranscribeError::InvalidFileType {
            file_name: file_name.to_string(),
        })
    }
}

/// Require the `%PDF-` header within the first [`PDF_MAGIC_WINDOW`] bytes.
pub fn check_pdf_magic(bytes: &[u8]) -> Result<(), TranscribeError> {
    let window = &bytes[..bytes.len().min(PDF_MAGIC_WINDOW)];
    if window.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC) {
        Ok(())
    } else {
        Err(TranscribeError::NotAPdf {
            magic: bytes.iter().take(8).copied().collect(),
        })
    }
}

/// Resolve a local path or HTTP(S) URL into an [`InputDocument`].
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
) -> Result<InputDocument, TranscribeError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else if input.trim().is_empty() || input.contains("://") {
        Err(TranscribeError::InvalidInput {
            input: input.to_string(),
        })
    } else {
        read_local(Path::new(input)).await
    }
}

async fn read_local(path: &Path) -> Result<InputDocument, TranscribeError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => TranscribeError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => TranscribeError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(InputDocument { file_name, bytes })
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<InputDocument, TranscribeError> {
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| TranscribeError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            TranscribeError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let is_pdf_content = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/pdf"));
    let file_name = file_name_for(url, is_pdf_content);

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    info!("Downloaded {} bytes as '{}'", bytes.len(), file_name);

    Ok(InputDocument {
        file_name,
        bytes: bytes.to_vec(),
    })
}

/// Name for a downloaded document.
///
/// The last URL path segment is used when it already ends in `.pdf`. A
/// server that declares `application/pdf` for an extension-less path gets
/// a synthetic `.pdf` name. Anything else keeps its own name, so the
/// `.pdf` check rejects it later.
fn file_name_for(url: &str, is_pdf_content: bool) -> String {
    let last = reqwest::Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|mut s| s.next_back().map(str::to_string))
            .filter(|s| !s.is_empty())
    });

    match last {
        Some(name) if validate_file_name(&name).is_ok() => name,
        _ if is_pdf_content => "downloaded.pdf".to_string(),
        Some(name) => name,
        None => "download".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn file_name_check_is_case_insensitive() {
        assert!(validate_file_name("report.pdf").is_ok());
        assert!(validate_file_name("REPORT.PDF").is_ok());
        assert!(validate_file_name("scan.Pdf").is_ok());
        assert!(validate_file_name("notes.txt").is_err());
        assert!(validate_file_name("pdf").is_err());
        assert!(validate_file_name("report.pdf.zip").is_err());
    }

    #[test]
    fn file_name_is_checked_verbatim() {
        assert!(validate_file_name(".pdf").is_ok());
        assert!(validate_file_name("report.pdf ").is_err());
        assert!(validate_file_name(" report.pdf").is_ok());
    }

    #[test]
    fn magic_may_follow_a_short_preamble() {
        assert!(check_pdf_magic(b"%PDF-1.7\n...").is_ok());

        let mut bytes = vec![b' '; 100];
        bytes.extend_from_slice(b"%PDF-1.4");
        assert!(check_pdf_magic(&bytes).is_ok());

        let mut late = vec![0u8; PDF_MAGIC_WINDOW];
        late.extend_from_slice(b"%PDF-1.4");
        assert!(check_pdf_magic(&late).is_err());
    }

    #[test]
    fn missing_magic_reports_leading_bytes() {
        match check_pdf_magic(b"GIF89a-not-a-pdf") {
            Err(TranscribeError::NotAPdf { magic }) => assert_eq!(magic, b"GIF89a-n"),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
        assert!(check_pdf_magic(b"").is_err());
    }

    #[test]
    fn download_names() {
        assert_eq!(file_name_for("https://x.org/a/paper.PDF", false), "paper.PDF");
        assert_eq!(file_name_for("https://x.org/get?id=7", true), "downloaded.pdf");
        assert_eq!(file_name_for("https://x.org/file.html", false), "file.html");
        assert_eq!(file_name_for("https://x.org/", false), "download");
    }

    #[tokio::test]
    async fn missing_local_file_is_not_found() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, TranscribeError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn unsupported_scheme_is_invalid_input() {
        let err = resolve_input("ftp://x.org/a.pdf", 5).await.unwrap_err();
        assert!(matches!(err, TranscribeError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn local_file_is_read_with_its_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Doc.PDF");
        std::fs::write(&path, b"%PDF-1.4\n").unwrap();
        let doc = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(doc.file_name, "Doc.PDF");
        assert_eq!(doc.bytes, b"%PDF-1.4\n");
    }
}
