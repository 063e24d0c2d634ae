//! Rasterisation: PDF pages and photos → landscape PNG pages for OCR.
//!
//! Only used on the fallback path. When the OCR backend rejects a native
//! PDF, every page is rendered with pdfium and resubmitted as an image.
//! Photos always go through [`prepare_image`].
//!
//! ## Threading
//!
//! pdfium keeps thread-local state and is CPU-bound; running it on the
//! blocking pool keeps the tokio workers free.
//!
//! ## Orientation
//!
//! The certificate's family table is printed landscape. Scans and phone
//! photos frequently arrive portrait, so any page taller than it is wide is
//! rotated 90° clockwise before OCR.

use crate::error::CertError;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Rotate portrait images to landscape; landscape and square pass through.
pub fn to_landscape(img: DynamicImage) -> DynamicImage {
    if img.height() > img.width() {
        img.rotate90()
    } else {
        img
    }
}

/// Encode as lossless PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Decode a JPEG/PNG upload, fix its orientation and re-encode as PNG.
pub fn prepare_image(name: &str, bytes: &[u8]) -> Result<Vec<u8>, CertError> {
    let fail = |e: image::ImageError| CertError::ImageDecodeFailed {
        name: name.to_string(),
        detail: e.to_string(),
    };
    let img = image::load_from_memory(bytes).map_err(fail)?;
    let fixed = to_landscape(img);
    debug!("Prepared {} → {}x{} px", name, fixed.width(), fixed.height());
    encode_png(&fixed).map_err(fail)
}

/// Turns a PDF into one PNG per page for the OCR fallback.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Landscape PNG bytes for every page, in page order.
    async fn rasterize(&self, pdf: Vec<u8>, dpi: u32) -> Result<Vec<Vec<u8>>, CertError>;
}

/// pdfium-backed [`PageRasterizer`], bound at first use.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    /// Directory containing libpdfium; `None` tries `./` then the system library.
    pub lib_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new(lib_path: Option<PathBuf>) -> Self {
        Self { lib_path }
    }
}

#[async_trait]
impl PageRasterizer for PdfiumRasterizer {
    async fn rasterize(&self, pdf: Vec<u8>, dpi: u32) -> Result<Vec<Vec<u8>>, CertError> {
        rasterize_pdf(pdf, dpi, self.lib_path.clone()).await
    }
}

/// Render every page of a PDF to landscape PNG bytes, in page order.
pub async fn rasterize_pdf(
    bytes: Vec<u8>,
    dpi: u32,
    pdfium_lib_path: Option<PathBuf>,
) -> Result<Vec<Vec<u8>>, CertError> {
    tokio::task::spawn_blocking(move || {
        rasterize_pdf_blocking(&bytes, dpi, pdfium_lib_path.as_deref())
    })
    .await
    .map_err(|e| CertError::Internal(format!("Render task panicked: {}", e)))?
}

fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, CertError> {
    let bindings = match lib_path {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| CertError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

fn rasterize_pdf_blocking(
    bytes: &[u8],
    dpi: u32,
    lib_path: Option<&Path>,
) -> Result<Vec<Vec<u8>>, CertError> {
    let pdfium = bind_pdfium(lib_path)?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| CertError::RasterisationFailed {
            page: 0,
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    info!("Rasterising {} pages at {} DPI", pages.len(), dpi);

    let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);

    let mut results = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            CertError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            }
        })?;
        let image = to_landscape(bitmap.as_image());
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        let png = encode_png(&image).map_err(|e| CertError::RasterisationFailed {
            page: idx + 1,
            detail: format!("PNG encoding failed: {}", e),
        })?;
        results.push(png);
    }

    Ok(results)
}
