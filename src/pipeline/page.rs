//! Page pipeline: split → encode → model call per section → assemble.
//!
//! All sections of a page are launched together and awaited together
//! (`join_all`), so the page is the unit of output: either every section
//! produced text and the page assembles, or the page fails as a whole.
//! Results are collected by section index, never by completion order.
//!
//! ## Concurrency and retries
//!
//! A permit from the shared [`Semaphore`] is held for the duration of each
//! model *attempt*, not across backoff sleeps, so a section waiting to retry
//! does not block other sections. Retryable failures are repeated up to
//! `max_retries` times with exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`); non-retryable failures fail at once.

use crate::config::TranscriptionConfig;
use crate::error::TranscribeError;
use crate::output::PageMarkdown;
use crate::pipeline::encode::{encode_section, EncodedSection};
use crate::pipeline::llm::VisionModel;
use crate::pipeline::postprocess::normalize_markdown;
use crate::pipeline::split::{split_sections, PageImage};
use crate::prompts::Prompt;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Everything a page needs that is shared across pages and requests.
#[derive(Clone)]
pub struct PipelineContext {
    pub model: Arc<dyn VisionModel>,
    pub prompt: Arc<Prompt>,
    /// Bounds model calls in flight across every page and request.
    pub limiter: Arc<Semaphore>,
    pub config: Arc<TranscriptionConfig>,
}

/// A transcribed page plus the call counters behind it.
#[derive(Debug, Clone)]
pub struct PageOutcome {
    pub page: PageMarkdown,
    pub model_calls: usize,
    pub retries: usize,
}

struct SectionText {
    text: String,
    attempts: u32,
}

/// Run one page through the pipeline.
pub async fn transcribe_page(
    ctx: &PipelineContext,
    page: PageImage,
    total_pages: usize,
) -> Result<PageOutcome, TranscribeError> {
    let page_num = page.page_num;
    let sections = prepare_sections(ctx, page).await?;
    let section_count = sections.len();
    info!("Page {}/{}: {} section(s)", page_num, total_pages, section_count);

    if let Some(ref cb) = ctx.config.progress_callback {
        cb.on_page_start(page_num, total_pages, section_count);
    }

    let results = join_all(
        sections
            .iter()
            .map(|section| transcribe_section(ctx, section, section_count)),
    )
    .await;

    let mut texts = Vec::with_capacity(section_count);
    let mut model_calls = 0usize;
    for result in results {
        let section = result?;
        model_calls += section.attempts as usize;
        texts.push(section.text);
    }

    let markdown = assemble_page(page_num, &texts);
    debug!("Page {}: {} chars of markdown", page_num, markdown.len());

    Ok(PageOutcome {
        page: PageMarkdown {
            page_num,
            section_count,
            markdown,
        },
        model_calls,
        retries: model_calls - section_count,
    })
}

/// Split and encode on the blocking pool; both are CPU-bound.
async fn prepare_sections(
    ctx: &PipelineContext,
    page: PageImage,
) -> Result<Vec<EncodedSection>, TranscribeError> {
    let config = Arc::clone(&ctx.config);
    tokio::task::spawn_blocking(move || {
        let max_size = (config.max_image_width, config.max_image_height);
        split_sections(&page.image, config.max_section_height)
            .iter()
            .map(|s| encode_section(&s.image, page.page_num, s.index, max_size, config.jpeg_quality))
            .collect::<Result<Vec<_>, _>>()
    })
    .await
    .map_err(|e| TranscribeError::Internal(format!("Encode task panicked: {}", e)))?
}

async fn transcribe_section(
    ctx: &PipelineContext,
    section: &EncodedSection,
    section_count: usize,
) -> Result<SectionText, TranscribeError> {
    let max_retries = ctx.config.max_retries;
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let result = {
            let _permit = ctx
                .limiter
                .acquire()
                .await
                .map_err(|e| TranscribeError::Internal(format!("Call limiter closed: {}", e)))?;
            ctx.model.transcribe(section, &ctx.prompt).await
        };

        match result {
            Ok(raw) => {
                if let Some(ref cb) = ctx.config.progress_callback {
                    cb.on_section_complete(section.page_num, section.index, section_count);
                }
                return Ok(SectionText {
                    text: normalize_markdown(&raw),
                    attempts: attempt,
                });
            }
            Err(e) if e.retryable && attempt <= max_retries => {
                let backoff = backoff_delay(ctx.config.retry_backoff_ms, attempt);
                warn!(
                    "Page {} section {}: attempt {} failed, retrying in {}ms: {}",
                    section.page_num, section.index, attempt, backoff, e
                );
                sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => {
                warn!(
                    "Page {} section {}: giving up after {} attempt(s): {}",
                    section.page_num, section.index, attempt, e
                );
                return Err(TranscribeError::ModelCall {
                    page: section.page_num,
                    section: section.index,
                    attempts: attempt,
                    source: e,
                });
            }
        }
    }
}

/// Delay before the retry that follows failed attempt number `attempt` (1-based).
fn backoff_delay(base_ms: u64, attempt: u32) -> u64 {
    base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

/// `## Page N` followed by the non-empty section texts, normalised once more.
pub fn assemble_page(page_num: usize, section_texts: &[String]) -> String {
    let body = section_texts
        .iter()
        .filter(|t| !t.trim().is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n\n");
    normalize_markdown(&format!("## Page {}\n\n{}", page_num, body))
}
