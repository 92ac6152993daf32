//! Configuration types for PDF transcription.
//!
//! All pipeline behaviour is controlled through [`TranscriptionConfig`], built
//! via its [`TranscriptionConfigBuilder`]. One struct holds every knob, so a
//! config can be shared across tasks and logged in full, and two runs can be
//! compared field by field.

use crate::error::TranscribeError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Configuration for a PDF transcription.
///
/// Built via [`TranscriptionConfig::builder()`] or using
/// [`TranscriptionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_transcribe::TranscriptionConfig;
///
/// let config = TranscriptionConfig::builder()
///     .dpi(100)
///     .max_section_height(2000)
///     .concurrency(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_image_width, 600);
/// ```
#[derive(Clone)]
pub struct TranscriptionConfig {
    /// Rendering resolution used when rasterising each PDF page. Default: 100.
    ///
    /// At 100 DPI a US-Letter page becomes 850 × 1100 px, which is already
    /// larger than the 600 × 800 box every section is fitted into before it
    /// is sent. Higher values mostly cost render time.
    pub dpi: u32,

    /// Maximum height of one section in pixels. Default: 2000.
    ///
    /// Pages taller than this (long receipts, scrolled web captures, posters)
    /// are cut into horizontal slices so that the downscale to the bounding
    /// box does not shrink the text beyond legibility.
    pub max_section_height: u32,

    /// Width of the bounding box each section is fitted into. Default: 600.
    pub max_image_width: u32,

    /// Height of the bounding box each section is fitted into. Default: 800.
    pub max_image_height: u32,

    /// JPEG quality used for the transport encoding. Range 1–100. Default: 75.
    pub jpeg_quality: u8,

    /// Maximum number of model calls in flight at once. Default: 8.
    ///
    /// The bound applies across pages *and* sections and is shared by every
    /// request served by the same [`crate::Transcriber`]. Size it to the
    /// provider's rate limit.
    pub concurrency: usize,

    /// LLM model identifier, e.g. "pixtral-12b-2409", "gpt-4.1-nano".
    /// If None, a provider-specific default is used.
    pub model: Option<String>,

    /// LLM provider name (e.g. "mistral", "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the completion. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per section. Default: 4000.
    ///
    /// Truncated responses are accepted as they are.
    pub max_tokens: usize,

    /// Extra attempts per section after a retryable model failure. Default: 2.
    ///
    /// Set to 0 for strict single-shot behaviour.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom system instruction. If None, uses [`crate::prompts::SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Custom user instruction. If None, uses [`crate::prompts::USER_PROMPT`].
    pub user_prompt: Option<String>,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            dpi: 100,
            max_section_height: 2000,
            max_image_width: 600,
            max_image_height: 800,
            jpeg_quality: 75,
            concurrency: 8,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4000,
            max_retries: 2,
            retry_backoff_ms: 500,
            system_prompt: None,
            user_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for TranscriptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscriptionConfig")
            .field("dpi", &self.dpi)
            .field("max_section_height", &self.max_section_height)
            .field(
                "bounding_box",
                &(self.max_image_width, self.max_image_height),
            )
            .field("jpeg_quality", &self.jpeg_quality)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .field("user_prompt", &self.user_prompt)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl TranscriptionConfig {
    /// Create a new builder for `TranscriptionConfig`.
    pub fn builder() -> TranscriptionConfigBuilder {
        TranscriptionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`TranscriptionConfig`].
#[derive(Debug)]
pub struct TranscriptionConfigBuilder {
    config: TranscriptionConfig,
}

impl TranscriptionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(50, 400);
        self
    }

    pub fn max_section_height(mut self, px: u32) -> Self {
        self.config.max_section_height = px;
        self
    }

    pub fn bounding_box(mut self, width: u32, height: u32) -> Self {
        self.config.max_image_width = width;
        self.config.max_image_height = height;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn user_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.user_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<TranscriptionConfig, TranscribeError> {
        let c = &self.config;
        if c.max_section_height == 0 {
            return Err(TranscribeError::InvalidConfig(
                "Section height must be ≥ 1 px".into(),
            ));
        }
        if c.max_image_width == 0 || c.max_image_height == 0 {
            return Err(TranscribeError::InvalidConfig(format!(
                "Bounding box must be at least 1×1 px, got {}×{}",
                c.max_image_width, c.max_image_height
            )));
        }
        if c.jpeg_quality == 0 || c.jpeg_quality > 100 {
            return Err(TranscribeError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        if c.concurrency == 0 {
            return Err(TranscribeError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(TranscribeError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
