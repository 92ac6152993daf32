//! Integration tests for the transcription pipeline over synthetic pages.
//!
//! Pages are solid-colour bitmaps. The scripted model decodes the JPEG it
//! receives, looks at the centre pixel and answers with the text assigned
//! to that colour, so each test controls exactly what every section says
//! and when it answers. No pdfium and no network are involved.

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use pdf_transcribe::{
    EncodedSection, ErrorKind, ModelError, Prompt, TranscribeError, Transcriber,
    TranscriptionConfig, TranscriptionProgressCallback, VisionModel,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Colour {
    Red,
    Green,
    Blue,
}

impl Colour {
    fn rgb(self) -> Rgb<u8> {
        match self {
            Colour::Red => Rgb([230, 20, 20]),
            Colour::Green => Rgb([20, 230, 20]),
            Colour::Blue => Rgb([20, 20, 230]),
        }
    }
}

fn colour_of(section: &EncodedSection) -> Colour {
    let img = image::load_from_memory(&section.bytes)
        .expect("section must be a decodable image")
        .to_rgb8();
    let [r, g, b] = img.get_pixel(img.width() / 2, img.height() / 2).0;
    if r >= g && r >= b {
        Colour::Red
    } else if g >= b {
        Colour::Green
    } else {
        Colour::Blue
    }
}

/// A page painted in horizontal bands of `(rows, colour)`.
fn banded_page(width: u32, bands: &[(u32, Colour)]) -> DynamicImage {
    let height = bands.iter().map(|(rows, _)| rows).sum();
    let img = RgbImage::from_fn(width, height, |_, y| {
        let mut top = 0;
        for &(rows, colour) in bands {
            if y < top + rows {
                return colour.rgb();
            }
            top += rows;
        }
        Rgb([0, 0, 0])
    });
    DynamicImage::ImageRgb8(img)
}

/// Page 1: one green section. Page 2: a red section and a short blue one.
fn two_pages() -> Vec<DynamicImage> {
    vec![
        banded_page(300, &[(150, Colour::Green)]),
        banded_page(300, &[(200, Colour::Red), (50, Colour::Blue)]),
    ]
}

fn config(concurrency: usize) -> TranscriptionConfig {
    TranscriptionConfig::builder()
        .max_section_height(200)
        .concurrency(concurrency)
        .retry_backoff_ms(1)
        .build()
        .expect("valid config")
}

/// Answers per colour, optionally delayed or failing.
#[derive(Default)]
struct ScriptedModel {
    answers: HashMap<Colour, String>,
    delays: HashMap<Colour, Duration>,
    /// Per colour: how many calls fail, and whether the failure is retryable.
    failures: Mutex<HashMap<Colour, (usize, bool)>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedModel {
    fn new() -> Self {
        let answers = [
            (Colour::Green, "```markdown\nIntro paragraph.\n```"),
            (Colour::Red, "Top half.\\n"),
            (Colour::Blue, "Bottom half.\n\n\n"),
        ];
        Self {
            answers: answers
                .into_iter()
                .map(|(c, a)| (c, a.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    fn answer(mut self, colour: Colour, text: &str) -> Self {
        self.answers.insert(colour, text.to_string());
        self
    }

    fn delay(mut self, colour: Colour, ms: u64) -> Self {
        self.delays.insert(colour, Duration::from_millis(ms));
        self
    }

    fn fail(self, colour: Colour, times: usize, retryable: bool) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(colour, (times, retryable));
        self
    }
}

#[async_trait]
impl VisionModel for ScriptedModel {
    async fn transcribe(
        &self,
        section: &EncodedSection,
        _prompt: &Prompt,
    ) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let colour = colour_of(section);
        if let Some(delay) = self.delays.get(&colour) {
            tokio::time::sleep(*delay).await;
        }

        let failure = {
            let mut failures = self.failures.lock().unwrap();
            match failures.get_mut(&colour) {
                Some((remaining, retryable)) if *remaining > 0 => {
                    *remaining -= 1;
                    Some(*retryable)
                }
                _ => None,
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match failure {
            Some(true) => Err(ModelError::new("503 Service Unavailable")),
            Some(false) => Err(ModelError::permanent("401 Unauthorized")),
            None => Ok(self.answers[&colour].clone()),
        }
    }
}

fn transcriber(model: ScriptedModel, config: TranscriptionConfig) -> (Transcriber, Arc<ScriptedModel>) {
    let model = Arc::new(model);
    (Transcriber::new(model.clone(), config), model)
}

const EXPECTED: &str = "## Page 1\n\nIntro paragraph.\n\n## Page 2\n\nTop half.\n\nBottom half.";

// ── Ordering and assembly ────────────────────────────────────────────────────

#[tokio::test]
async fn two_pages_assemble_in_order() {
    let (t, model) = transcriber(ScriptedModel::new(), config(8));
    let output = t.transcribe_pages(two_pages()).await.expect("transcription");

    assert_eq!(output.markdown, EXPECTED);
    assert!(!output.markdown.contains("\n\n\n"));
    assert_eq!(output.pages.len(), 2);
    assert_eq!(output.pages[0].section_count, 1);
    assert_eq!(output.pages[1].section_count, 2);
    assert_eq!(output.stats.total_pages, 2);
    assert_eq!(output.stats.total_sections, 3);
    assert_eq!(output.stats.model_calls, 3);
    assert_eq!(output.stats.retries, 0);
    assert_eq!(model.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn order_does_not_depend_on_latency() {
    // Page 1 answers last, and page 2's bottom section before its top one.
    let model = ScriptedModel::new()
        .delay(Colour::Green, 60)
        .delay(Colour::Red, 30)
        .delay(Colour::Blue, 1);
    let (t, _) = transcriber(model, config(8));
    let output = t.transcribe_pages(two_pages()).await.unwrap();
    assert_eq!(output.markdown, EXPECTED);
}

#[tokio::test]
async fn empty_section_answers_are_dropped() {
    let model = ScriptedModel::new().answer(Colour::Blue, "  \n\n ");
    let (t, _) = transcriber(model, config(8));
    let output = t.transcribe_pages(two_pages()).await.unwrap();
    assert_eq!(
        output.markdown,
        "## Page 1\n\nIntro paragraph.\n\n## Page 2\n\nTop half."
    );
}

#[tokio::test]
async fn tall_page_becomes_bounded_sections() {
    // 300 x 4500 with sections of at most 2000 rows → 2000, 2000, 500.
    let page = banded_page(
        300,
        &[(2000, Colour::Red), (2000, Colour::Green), (500, Colour::Blue)],
    );
    let cfg = TranscriptionConfig::builder().build().unwrap();
    let (t, _) = transcriber(ScriptedModel::new(), cfg);
    let output = t.transcribe_pages(vec![page]).await.unwrap();

    assert_eq!(output.pages[0].section_count, 3);
    assert_eq!(
        output.markdown,
        "## Page 1\n\nTop half.\n\nIntro paragraph.\n\nBottom half."
    );
}

// ── Failure policy ───────────────────────────────────────────────────────────

#[tokio::test]
async fn one_failed_section_fails_the_document() {
    let model = ScriptedModel::new().fail(Colour::Blue, usize::MAX, false);
    let (t, model) = transcriber(model, config(8));
    let err = t.transcribe_pages(two_pages()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RemoteCall);
    match err {
        TranscribeError::ModelCall {
            page,
            section,
            attempts,
            ref source,
        } => {
            assert_eq!((page, section, attempts), (2, 1, 1));
            assert!(!source.retryable);
        }
        other => panic!("expected ModelCall, got {other:?}"),
    }
    // Every launched call still ran to completion.
    assert_eq!(model.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn lowest_failing_page_is_reported() {
    let model = ScriptedModel::new()
        .fail(Colour::Green, usize::MAX, false)
        .fail(Colour::Blue, usize::MAX, false);
    let (t, _) = transcriber(model, config(8));
    let err = t.transcribe_pages(two_pages()).await.unwrap_err();
    assert!(
        matches!(err, TranscribeError::ModelCall { page: 1, section: 0, .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let model = ScriptedModel::new().fail(Colour::Red, 2, true);
    let (t, model) = transcriber(model, config(8));
    let output = t.transcribe_pages(two_pages()).await.unwrap();

    assert_eq!(output.markdown, EXPECTED);
    assert_eq!(output.stats.model_calls, 5);
    assert_eq!(output.stats.retries, 2);
    assert_eq!(model.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn retries_are_bounded() {
    let cfg = TranscriptionConfig::builder()
        .max_section_height(200)
        .max_retries(1)
        .retry_backoff_ms(1)
        .build()
        .unwrap();
    let model = ScriptedModel::new().fail(Colour::Red, usize::MAX, true);
    let (t, _) = transcriber(model, cfg);
    let err = t.transcribe_pages(two_pages()).await.unwrap_err();
    assert!(
        matches!(err, TranscribeError::ModelCall { page: 2, section: 0, attempts: 2, .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn permanent_failures_are_not_retried() {
    let model = ScriptedModel::new().fail(Colour::Green, 1, false);
    let (t, model) = transcriber(model, config(8));
    assert!(t.transcribe_pages(two_pages()).await.is_err());
    assert_eq!(model.calls.load(Ordering::SeqCst), 3);
}

// ── Concurrency bound ────────────────────────────────────────────────────────

#[tokio::test]
async fn in_flight_calls_respect_concurrency() {
    let model = ScriptedModel::new()
        .delay(Colour::Green, 20)
        .delay(Colour::Red, 20)
        .delay(Colour::Blue, 20);
    let (t, model) = transcriber(model, config(2));
    let pages: Vec<_> = (0..6)
        .map(|_| banded_page(100, &[(200, Colour::Red), (200, Colour::Green)]))
        .collect();

    let output = t.transcribe_pages(pages).await.unwrap();
    assert_eq!(output.stats.total_sections, 12);
    assert_eq!(model.calls.load(Ordering::SeqCst), 12);
    let max = model.max_in_flight.load(Ordering::SeqCst);
    assert!((1..=2).contains(&max), "max in flight was {max}");
}

// ── Progress events ──────────────────────────────────────────────────────────

#[derive(Default)]
struct EventLog(Mutex<Vec<String>>);

impl TranscriptionProgressCallback for EventLog {
    fn on_document_start(&self, total: usize) {
        self.0.lock().unwrap().push(format!("doc {total}"));
    }
    fn on_page_start(&self, page: usize, _total: usize, sections: usize) {
        self.0.lock().unwrap().push(format!("start {page}/{sections}"));
    }
    fn on_section_complete(&self, page: usize, section: usize, _sections: usize) {
        self.0.lock().unwrap().push(format!("section {page}.{section}"));
    }
    fn on_page_complete(&self, page: usize, _total: usize, _len: usize) {
        self.0.lock().unwrap().push(format!("done {page}"));
    }
    fn on_page_error(&self, page: usize, _total: usize, _error: String) {
        self.0.lock().unwrap().push(format!("error {page}"));
    }
    fn on_document_complete(&self, total: usize, ok: usize) {
        self.0.lock().unwrap().push(format!("end {ok}/{total}"));
    }
}

#[tokio::test]
async fn progress_events_cover_every_page_and_section() {
    let log = Arc::new(EventLog::default());
    let cfg = TranscriptionConfig::builder()
        .max_section_height(200)
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let (t, _) = transcriber(ScriptedModel::new(), cfg);
    t.transcribe_pages(two_pages()).await.unwrap();

    let mut events = log.0.lock().unwrap().clone();
    assert_eq!(events.first().map(String::as_str), Some("doc 2"));
    assert_eq!(events.last().map(String::as_str), Some("end 2/2"));
    events.sort();
    assert_eq!(
        events,
        vec![
            "doc 2",
            "done 1",
            "done 2",
            "end 2/2",
            "section 1.0",
            "section 2.0",
            "section 2.1",
            "start 1/1",
            "start 2/2",
        ]
    );
}

#[tokio::test]
async fn progress_reports_failed_page() {
    let log = Arc::new(EventLog::default());
    let cfg = TranscriptionConfig::builder()
        .max_section_height(200)
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let (t, _) = transcriber(ScriptedModel::new().fail(Colour::Blue, usize::MAX, false), cfg);
    assert!(t.transcribe_pages(two_pages()).await.is_err());

    let events = log.0.lock().unwrap().clone();
    assert!(events.contains(&"done 1".to_string()));
    assert!(events.contains(&"error 2".to_string()));
    assert_eq!(events.last().map(String::as_str), Some("end 1/2"));
}

// ── Preconditions ────────────────────────────────────────────────────────────

#[tokio::test]
async fn non_pdf_name_is_a_validation_error() {
    let (t, model) = transcriber(ScriptedModel::new(), config(8));
    let err = t
        .transcribe("notes.txt", b"%PDF-1.4\n".to_vec())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.is_client_error());
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn payload_without_pdf_header_is_a_decode_error() {
    let (t, model) = transcriber(ScriptedModel::new(), config(8));
    let err = t
        .transcribe("report.PDF", b"this is not a pdf".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, TranscribeError::NotAPdf { .. }), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::Decode);
    assert!(!err.is_client_error());
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}
