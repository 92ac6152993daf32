//! HTTP service binary: `POST /transcribe/pdf`, `GET /health`.
//!
//! Configuration comes from the environment (and a `.env` file, if present):
//! `PDF_TRANSCRIBE_ADDR`, `PDF_TRANSCRIBE_WORKERS`,
//! `PDF_TRANSCRIBE_MAX_UPLOAD_MB`, plus the provider variables read by the
//! library (`MISTRAL_API_KEY`, `OPENAI_API_KEY`, `PDF_TRANSCRIBE_PROVIDER`, …).

use anyhow::{Context, Result};
use pdf_transcribe::server::{self, transcription_config_from_lookup, AppState, ServerConfig};
use pdf_transcribe::Transcriber;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("Failed to load .env");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let server_config = ServerConfig::from_env().context("Invalid server configuration")?;

    let mut runtime = tokio::runtime::Builder::new_multi_thread();
    runtime.enable_all();
    if let Some(workers) = server_config.workers {
        runtime.worker_threads(workers);
    }
    let runtime = runtime.build().context("Failed to start tokio runtime")?;

    runtime.block_on(run(server_config))
}

async fn run(server_config: ServerConfig) -> Result<()> {
    let config = transcription_config_from_lookup(|key| std::env::var(key).ok())
        .context("Invalid transcription configuration")?;
    tracing::info!("Transcription config: {:?}", config);

    let transcriber =
        Transcriber::from_config(config).context("Failed to set up the vision model")?;

    server::serve(&server_config, AppState::new(transcriber))
        .await
        .with_context(|| format!("Server on {} failed", server_config.addr))
}
