//! Model client adapter: one encoded section in, raw transcript out.
//!
//! The pipeline talks to the vision model only through [`VisionModel`], so
//! tests and embedders can substitute a scripted model without a network.
//! [`LlmVisionModel`] is the production implementation on top of an
//! `edgequake_llm` provider.
//!
//! A call is a single attempt. Retry and backoff belong to the page pipeline
//! ([`crate::pipeline::page`]), which sees every section of the page and
//! owns the concurrency permits.

use crate::config::TranscriptionConfig;
use crate::error::{ModelError, TranscribeError};
use crate::pipeline::encode::EncodedSection;
use crate::prompts::Prompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Default model when a provider is named without one.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-nano";
/// Default model for the Mistral provider.
pub const DEFAULT_MISTRAL_MODEL: &str = "pixtral-12b-2409";

/// A vision-capable model: accepts an image and instructions, returns text.
///
/// Implementations must be safe for concurrent, unsynchronised use: the
/// pipeline calls `transcribe` from many tasks at once through one shared
/// instance.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Issue exactly one request for `section`.
    async fn transcribe(&self, section: &EncodedSection, prompt: &Prompt)
        -> Result<String, ModelError>;
}

/// [`VisionModel`] backed by an `edgequake_llm` chat provider.
pub struct LlmVisionModel {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmVisionModel {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &TranscriptionConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }

    /// Resolve a provider from `config` and the environment, then wrap it.
    pub fn from_config(config: &TranscriptionConfig) -> Result<Self, TranscribeError> {
        Ok(Self::new(resolve_provider(config)?, config))
    }
}

#[async_trait]
impl VisionModel for LlmVisionModel {
    async fn transcribe(
        &self,
        section: &EncodedSection,
        prompt: &Prompt,
    ) -> Result<String, ModelError> {
        let start = Instant::now();
        let image = ImageData::new(section.to_base64(), section.mime_type).with_detail("high");
        let messages = vec![
            ChatMessage::system(prompt.system.as_str()),
            ChatMessage::user_with_images(prompt.user.as_str(), vec![image]),
        ];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| classify_failure(e.to_string()))?;

        debug!(
            "Page {} section {}: {} input tokens, {} output tokens, {:?}",
            section.page_num,
            section.index,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

/// Authentication and request-shape failures fail the same way every time.
fn classify_failure(message: String) -> ModelError {
    const PERMANENT: [&str; 6] = [
        "401",
        "403",
        "unauthorized",
        "invalid api key",
        "authentication",
        "model not found",
    ];
    let lower = message.to_lowercase();
    if PERMANENT.iter().any(|p| lower.contains(p)) {
        ModelError::permanent(message)
    } else {
        ModelError::new(message)
    }
}

fn build_options(config: &TranscriptionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn default_model_for(provider: &str) -> &'static str {
    if provider.eq_ignore_ascii_case("mistral") {
        DEFAULT_MISTRAL_MODEL
    } else {
        DEFAULT_OPENAI_MODEL
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, TranscribeError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        TranscribeError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model` or the
///    provider's default model. The factory reads the matching API key.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **`MISTRAL_API_KEY`**: Mistral with `pixtral-12b-2409`.
/// 5. **`OPENAI_API_KEY`**: OpenAI with `gpt-4.1-nano`.
/// 6. **Full auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_provider(
    config: &TranscriptionConfig,
) -> Result<Arc<dyn LLMProvider>, TranscribeError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(default_model_for(name));
        return create_vision_provider(name, model);
    }

    if let (Some(prov), Some(model)) = (
        non_empty_env("EDGEQUAKE_LLM_PROVIDER"),
        non_empty_env("EDGEQUAKE_MODEL"),
    ) {
        return create_vision_provider(&prov, &model);
    }

    for (provider, key) in [("mistral", "MISTRAL_API_KEY"), ("openai", "OPENAI_API_KEY")] {
        if non_empty_env(key).is_some() {
            let model = config.model.as_deref().unwrap_or(default_model_for(provider));
            return create_vision_provider(provider, model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| TranscribeError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision model provider could be auto-detected from environment.\n\
                Set MISTRAL_API_KEY or OPENAI_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
