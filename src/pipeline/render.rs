//! PDF rasterisation: render every page to a `DynamicImage` via pdfium.
//!
//! `pdfium-render` wraps the pdfium C++ library, whose calls block and are
//! serialised internally (`thread_safe` feature). The whole document is
//! therefore rendered inside one `tokio::task::spawn_blocking` call, keeping
//! the async workers free for in-flight model requests of other documents.
//!
//! ## Library binding
//!
//! `PDFIUM_LIB_PATH` may name a pdfium shared library (or the directory
//! containing it). Without it, the platform's system library is bound.

use crate::error::TranscribeError;
use crate::pipeline::split::PageImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable naming an explicit pdfium library location.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Rasterise all pages of `bytes` at `dpi`, in page order.
pub async fn render_pdf(bytes: Vec<u8>, dpi: u32) -> Result<Vec<PageImage>, TranscribeError> {
    tokio::task::spawn_blocking(move || render_pdf_blocking(&bytes, dpi))
        .await
        .map_err(|e| TranscribeError::Internal(format!("Render task panicked: {}", e)))?
}

fn bind_pdfium() -> Result<Pdfium, TranscribeError> {
    let bindings = match std::env::var(PDFIUM_LIB_PATH_ENV) {
        Ok(path) if !path.is_empty() => {
            let path = Path::new(&path);
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(path)
            } else {
                path.to_path_buf()
            };
            Pdfium::bind_to_library(&lib)
                .map_err(|e| TranscribeError::PdfiumBindingFailed(format!("{}: {:?}", lib.display(), e)))?
        }
        _ => Pdfium::bind_to_system_library()
            .map_err(|e| TranscribeError::PdfiumBindingFailed(format!("system library: {:?}", e)))?,
    };
    Ok(Pdfium::new(bindings))
}

fn load_error(e: PdfiumError) -> TranscribeError {
    let detail = format!("{:?}", e);
    if detail.contains("Password") || detail.contains("password") {
        TranscribeError::PasswordRequired
    } else {
        TranscribeError::CorruptPdf { detail }
    }
}

fn render_pdf_blocking(bytes: &[u8], dpi: u32) -> Result<Vec<PageImage>, TranscribeError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(load_error)?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);

    let mut images = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let page_num = idx + 1;
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            TranscribeError::RasterisationFailed {
                page: page_num,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            page_num,
            image.width(),
            image.height()
        );
        images.push(PageImage { page_num, image });
    }

    Ok(images)
}
