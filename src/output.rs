//! Result types returned by a transcription.

use serde::{Deserialize, Serialize};

/// The full result of transcribing one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionOutput {
    /// Page markdowns in page order, separated by blank lines, trimmed.
    pub markdown: String,
    /// Per-page results, in page order.
    pub pages: Vec<PageMarkdown>,
    pub stats: TranscriptionStats,
}

/// Normalised markdown for one page, including its `## Page N` heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMarkdown {
    /// 1-based page number.
    pub page_num: usize,
    /// Number of sections the page was split into.
    pub section_count: usize,
    pub markdown: String,
}

/// Counters and timings for one transcription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionStats {
    pub total_pages: usize,
    pub total_sections: usize,
    /// Model requests issued, retries included.
    pub model_calls: usize,
    /// Model requests that were repeats of a failed attempt.
    pub retries: usize,
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Wire shape of a successful "transcribe a PDF" response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    pub markdown_content: String,
}

impl From<TranscriptionOutput> for TranscriptionResponse {
    fn from(output: TranscriptionOutput) -> Self {
        Self {
            markdown_content: output.markdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_serialises_with_single_field() {
        let output = TranscriptionOutput {
            markdown: "## Page 1\n\nHello.".into(),
            pages: vec![],
            stats: TranscriptionStats::default(),
        };
        let json = serde_json::to_value(TranscriptionResponse::from(output)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "markdown_content": "## Page 1\n\nHello." })
        );
    }
}
