//! Instructions sent with every section image.
//!
//! Callers can override both via [`crate::config::TranscriptionConfig::system_prompt`]
//! and [`crate::config::TranscriptionConfig::user_prompt`]; the constants here
//! are used only when no override is provided.

/// Default system instruction: how a section must be transcribed.
pub const SYSTEM_PROMPT: &str = r#"You transcribe one section of a scanned or rendered document page into Markdown.

Rules:
1. Preserve the structure of the section: reading order, paragraphs, emphasis.
2. Use Markdown headers (#, ##, ###) for headings, - or 1. for lists,
   GFM pipe tables for tables and fenced code blocks for code.
3. Never wrap the whole response in a code fence.
4. Use real line breaks, never the two characters "\n".
5. The section may start or end mid-sentence; transcribe exactly what is visible.
6. Output only the raw Markdown. No commentary, no explanations."#;

/// Default user instruction accompanying the image.
pub const USER_PROMPT: &str = "Convert this document section to markdown.";

/// The instruction pair attached to every model request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    /// Resolve overrides against the built-in defaults.
    pub fn resolve(system: Option<&str>, user: Option<&str>) -> Self {
        Self {
            system: system.unwrap_or(SYSTEM_PROMPT).to_string(),
            user: user.unwrap_or(USER_PROMPT).to_string(),
        }
    }
}

impl Default for Prompt {
    fn default() -> Self {
        Self::resolve(None, None)
    }
}
