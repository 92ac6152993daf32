//! Post-processing: deterministic normalisation of model-generated Markdown.
//!
//! Vision models answer with Markdown that is *almost* right: escaped
//! newlines instead of line breaks, a ```` ```markdown ```` fence around the
//! whole answer despite the prompt, tables glued to the paragraph above,
//! long runs of blank lines. [`normalize_markdown`] fixes these with an
//! ordered list of pure `&str → String` rules.
//!
//! The function is total (any text in, some text out) and idempotent:
//! normalising its own output changes nothing. The page pipeline relies on
//! that, because every section is normalised on its own and then again as
//! part of the assembled page.
//!
//! ## Rule order
//!
//! 1. Unescape literal `\n`, normalise line endings, drop invisible Unicode
//! 2. Strip one outer code fence that wraps the entire answer
//! 3. Collapse runs of blank lines to a single empty line
//! 4. Append a two-space hard break to running-text lines
//! 5. Pad horizontal rules and tables with blank lines
//! 6. Turn bare e-mail addresses into `mailto:` links
//! 7. Collapse blank-line runs again (rule 5 can create them)
//! 8. Trim the whole text
//!
//! Rules 4–6 leave fenced code blocks byte-exact.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Normalise raw model output into well-formed Markdown.
pub fn normalize_markdown(input: &str) -> String {
    let s = unescape_newlines(input);
    let s = strip_outer_fence(&s);
    let s = collapse_blank_lines(&s);
    let s = add_hard_breaks(&s);
    let s = pad_block_constructs(&s);
    let s = link_emails(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

// ── Fenced code tracking ─────────────────────────────────────────────────────

fn fence_marker(line: &str) -> Option<&'static str> {
    let t = line.trim_start();
    if t.starts_with("```") {
        Some("```")
    } else if t.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

/// Walks lines in order and reports which ones belong to a fenced block.
#[derive(Default)]
struct FenceTracker {
    open: Option<&'static str>,
}

impl FenceTracker {
    /// `true` for fence lines and everything between them.
    fn is_code(&mut self, line: &str) -> bool {
        match (self.open, fence_marker(line)) {
            (None, Some(marker)) => {
                self.open = Some(marker);
                true
            }
            (Some(open), Some(marker)) if open == marker => {
                self.open = None;
                true
            }
            (Some(_), _) => true,
            (None, None) => false,
        }
    }
}

// ── Rule 1: Unescape newlines ────────────────────────────────────────────────

const INVISIBLE: [char; 6] = [
    '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
];

fn unescape_newlines(input: &str) -> String {
    // Invisible characters go first so `\` U+200B `n` unfolds in this pass.
    input
        .replace(INVISIBLE, "")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace("\\n", "\n")
}

// ── Rule 2: Strip an outer fence ─────────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?[ \t]*\n(.*)\n```$").unwrap());

/// Only a fence around the *whole* answer is removed. Two separate code
/// blocks that happen to open and close the text are left alone.
fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) if !caps[1].lines().any(|l| l.trim_start().starts_with("```")) => {
            caps[1].to_string()
        }
        _ => input.to_string(),
    }
}

// ── Rules 3 & 7: Collapse blank lines ────────────────────────────────────────

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n(?:[ \t]*\n){2,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n").into_owned()
}

// ── Rule 4: Hard line breaks ─────────────────────────────────────────────────

fn needs_hard_break(line: &str) -> bool {
    const BLOCK_STARTS: [&str; 4] = ["|", "#", "---", "> "];
    const LINE_ENDS: [&str; 3] = [":", ".", "  "];
    !BLOCK_STARTS.iter().any(|p| line.starts_with(p))
        && !LINE_ENDS.iter().any(|s| line.ends_with(s))
}

fn add_hard_breaks(input: &str) -> String {
    let mut fences = FenceTracker::default();
    input
        .split('\n')
        .map(|line| {
            if fences.is_code(line) {
                line.to_string()
            } else if line.trim().is_empty() {
                String::new()
            } else if needs_hard_break(line) {
                format!("{line}  ")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Pad rules and tables ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Blank,
    Code,
    Rule,
    Table,
    Text,
}

fn classify(line: &str, fences: &mut FenceTracker) -> Block {
    if fences.is_code(line) {
        return Block::Code;
    }
    let t = line.trim();
    if t.is_empty() {
        Block::Blank
    } else if t.starts_with('|') {
        Block::Table
    } else if t.starts_with("---") {
        Block::Rule
    } else {
        Block::Text
    }
}

fn needs_padding(prev: Block, next: Block) -> bool {
    use Block::*;
    match (prev, next) {
        (Blank | Code, _) | (_, Blank | Code) => false,
        (Rule, _) | (_, Rule) => true,
        (Table, Table) => false,
        (Table, _) | (_, Table) => true,
        (Text, Text) => false,
    }
}

fn pad_block_constructs(input: &str) -> String {
    let mut fences = FenceTracker::default();
    let mut out: Vec<&str> = Vec::new();
    let mut prev = Block::Blank;
    for line in input.split('\n') {
        let kind = classify(line, &mut fences);
        if needs_padding(prev, kind) {
            out.push("");
        }
        out.push(line);
        prev = kind;
    }
    out.join("\n")
}

// ── Rule 6: Link e-mail addresses ────────────────────────────────────────────

// The first alternative swallows spans that must not be rewritten: inline
// code, existing links, autolinks and URLs. The local part starts with an
// alphanumeric so a link never absorbs a `---`, `|` or `#` line prefix.
static RE_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(`[^`\n]*`|\[[^\]\n]*\]\([^)\n]*\)|<[^>\s]+>|https?://\S+)|([A-Za-z0-9][A-Za-z0-9._%+-]*@[A-Za-z0-9.-]+\.[A-Za-z]{2,})",
    )
    .unwrap()
});

fn link_emails(input: &str) -> String {
    let mut fences = FenceTracker::default();
    input
        .split('\n')
        .map(|line| {
            if fences.is_code(line) || !line.contains('@') {
                return line.to_string();
            }
            RE_EMAIL
                .replace_all(line, |caps: &Captures| match caps.get(2) {
                    Some(addr) => format!("[{0}](mailto:{0})", addr.as_str()),
                    None => caps[0].to_string(),
                })
                .into_owned()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
