//! CLI binary for pdf-transcribe.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `TranscriptionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_transcribe::pipeline::input::resolve_input;
use pdf_transcribe::transcribe::write_atomic;
use pdf_transcribe::{
    ProgressCallback, Transcriber, TranscriptionConfig, TranscriptionOutput,
    TranscriptionProgressCallback, TranscriptionResponse,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── Terminal styling ─────────────────────────────────────────────────────────

const GREEN: u8 = 32;
const RED: u8 = 31;
const CYAN: u8 = 36;
const BOLD: u8 = 1;
const DIM: u8 = 2;

fn paint(code: u8, s: &str) -> String {
    format!("\x1b[{code}m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar over pages, with a per-page log line. Pages and their
/// sections finish out of order, so all state is keyed by page number.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Page start time and number of sections done so far.
    pages: Mutex<HashMap<usize, (Instant, usize)>>,
}

impl CliProgressCallback {
    /// Spinner until `on_document_start` reports the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading input…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            pages: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Transcribing");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.pages
            .lock()
            .ok()
            .and_then(|mut pages| pages.remove(&page_num))
            .map(|(start, _)| start.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl TranscriptionProgressCallback for CliProgressCallback {
    fn on_document_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            paint(CYAN, "◆"),
            paint(BOLD, &format!("Transcribing {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize, sections: usize) {
        if let Ok(mut pages) = self.pages.lock() {
            pages.insert(page_num, (Instant::now(), 0));
        }
        self.bar
            .set_message(format!("page {page_num}: 0/{sections} sections"));
    }

    fn on_section_complete(&self, page_num: usize, _section: usize, sections: usize) {
        let done = self.pages.lock().ok().and_then(|mut pages| {
            pages.get_mut(&page_num).map(|entry| {
                entry.1 += 1;
                entry.1
            })
        });
        if let Some(done) = done {
            self.bar
                .set_message(format!("page {page_num}: {done}/{sections} sections"));
        }
    }

    fn on_page_complete(&self, page_num: usize, total: usize, markdown_len: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            paint(GREEN, "✓"),
            page_num,
            total,
            paint(DIM, &format!("{markdown_len:>5} chars")),
            paint(DIM, &format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: String) {
        let secs = self.elapsed_secs(page_num);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            paint(RED, "✗"),
            page_num,
            total,
            paint(RED, &msg),
            paint(DIM, &format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_complete(&self, total_pages: usize, success_count: usize) {
        self.bar.finish_and_clear();
        if success_count == total_pages {
            eprintln!(
                "{} {} pages transcribed",
                paint(GREEN, "✔"),
                paint(BOLD, &success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages transcribed, document failed",
                paint(RED, "✘"),
                paint(BOLD, &success_count.to_string()),
                total_pages,
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Transcribe to stdout
  pdf-transcribe document.pdf

  # Transcribe to a file
  pdf-transcribe document.pdf -o output.md

  # Use a specific provider and model
  pdf-transcribe --provider mistral --model pixtral-12b-2409 scan.pdf

  # Transcribe from URL
  pdf-transcribe https://arxiv.org/pdf/1706.03762 -o attention.md

  # Service-shaped JSON ({"markdown_content": "..."})
  pdf-transcribe --json document.pdf > output.json

ENVIRONMENT VARIABLES:
  MISTRAL_API_KEY         Mistral API key (pixtral-12b-2409 by default)
  OPENAI_API_KEY          OpenAI API key (gpt-4.1-nano by default)
  EDGEQUAKE_LLM_PROVIDER  Override provider (with EDGEQUAKE_MODEL)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter, e.g. pdf_transcribe=debug
"#;

/// Transcribe PDF files and URLs to Markdown with a vision model.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-transcribe",
    version,
    about = "Transcribe PDF files and URLs to Markdown with a vision model",
    long_about = "Render each page of a PDF, cut tall pages into sections, send every \
section to a vision language model concurrently and stitch the answers back together \
as clean Markdown, in page order.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "PDF_TRANSCRIBE_OUTPUT")]
    output: Option<PathBuf>,

    /// Vision model ID (e.g. pixtral-12b-2409, gpt-4.1-nano).
    #[arg(long, env = "PDF_TRANSCRIBE_MODEL")]
    model: Option<String>,

    /// Model provider: mistral, openai, anthropic, gemini, ollama, …
    #[arg(long, env = "PDF_TRANSCRIBE_PROVIDER")]
    provider: Option<String>,

    /// Rendering DPI (50–400).
    #[arg(long, env = "PDF_TRANSCRIBE_DPI", default_value_t = 100,
          value_parser = clap::value_parser!(u32).range(50..=400))]
    dpi: u32,

    /// Maximum model calls in flight.
    #[arg(short, long, env = "PDF_TRANSCRIBE_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,

    /// Maximum section height in pixels; taller pages are split.
    #[arg(long, env = "PDF_TRANSCRIBE_SECTION_HEIGHT", default_value_t = 2000)]
    section_height: u32,

    /// Bounding box width each section is fitted into.
    #[arg(long, env = "PDF_TRANSCRIBE_MAX_WIDTH", default_value_t = 600)]
    max_width: u32,

    /// Bounding box height each section is fitted into.
    #[arg(long, env = "PDF_TRANSCRIBE_MAX_HEIGHT", default_value_t = 800)]
    max_height: u32,

    /// JPEG quality for section images (1–100).
    #[arg(long, env = "PDF_TRANSCRIBE_JPEG_QUALITY", default_value_t = 75,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PDF_TRANSCRIBE_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max model output tokens per section.
    #[arg(long, env = "PDF_TRANSCRIBE_MAX_TOKENS", default_value_t = 4000)]
    max_tokens: usize,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "PDF_TRANSCRIBE_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per section on a transient model failure.
    #[arg(long, env = "PDF_TRANSCRIBE_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Output `{"markdown_content": ...}` JSON instead of Markdown.
    #[arg(long, env = "PDF_TRANSCRIBE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF_TRANSCRIBE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF_TRANSCRIBE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF_TRANSCRIBE_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF_TRANSCRIBE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Run transcription ────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new_dynamic);
    let output = run_with_progress(&cli, progress).await?;
    let stats = output.stats.clone();

    let rendered = if cli.json {
        serde_json::to_string_pretty(&TranscriptionResponse::from(output))
            .context("Failed to serialise output")?
    } else {
        output.markdown
    };

    if let Some(ref output_path) = cli.output {
        write_atomic(output_path, &rendered)
            .await
            .context("Failed to write output")?;
        if !cli.quiet {
            eprintln!(
                "{}  {} pages  {} sections  {}ms  →  {}",
                paint(GREEN, "✔"),
                stats.total_pages,
                stats.total_sections,
                stats.total_duration_ms,
                paint(BOLD, &output_path.display().to_string()),
            );
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?;
        if !rendered.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !cli.json {
        eprintln!(
            "   {} model calls  /  {} retries  —  {}ms total",
            paint(DIM, &stats.model_calls.to_string()),
            paint(DIM, &stats.retries.to_string()),
            stats.total_duration_ms,
        );
    }

    Ok(())
}

/// Map CLI args to `TranscriptionConfig`.
/// Runs the transcription and always takes the spinner off the terminal,
/// since a failed download or render never reaches `on_document_complete`.
async fn run_with_progress(
    cli: &Cli,
    progress: Option<Arc<CliProgressCallback>>,
) -> Result<TranscriptionOutput> {
    let outcome = run(cli, progress.clone()).await;
    if let Some(progress) = &progress {
        progress.bar.finish_and_clear();
    }
    outcome
}

async fn run(cli: &Cli, progress: Option<Arc<CliProgressCallback>>) -> Result<TranscriptionOutput> {
    let doc = resolve_input(&cli.input, cli.download_timeout)
        .await
        .context("Failed to read input")?;
    if let Some(progress) = &progress {
        progress.bar.set_message("Rendering PDF…");
    }

    let progress_cb = progress.map(|cb| cb as Arc<dyn TranscriptionProgressCallback>);
    let config = build_config(cli, progress_cb).await?;
    let transcriber =
        Transcriber::from_config(config).context("Failed to set up the vision model")?;
    transcriber
        .transcribe(&doc.file_name, doc.bytes)
        .await
        .context("Transcription failed")
}

async fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
) -> Result<TranscriptionConfig> {
    let mut builder = TranscriptionConfig::builder()
        .dpi(cli.dpi)
        .concurrency(cli.concurrency)
        .max_section_height(cli.section_height)
        .bounding_box(cli.max_width, cli.max_height)
        .jpeg_quality(cli.jpeg_quality)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spinner_is_cleared_when_input_is_missing() {
        let cli = Cli::parse_from(["pdf-transcribe", "/definitely/not/here.pdf"]);
        let progress = CliProgressCallback::new_dynamic();

        let err = run_with_progress(&cli, Some(progress.clone()))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to read input"), "{err:#}");
        assert!(progress.bar.is_finished());
    }

    #[test]
    fn spinner_starts_on_input() {
        let progress = CliProgressCallback::new_dynamic();
        assert_eq!(progress.bar.message(), "Reading input…");
        progress.bar.finish_and_clear();
    }
}
