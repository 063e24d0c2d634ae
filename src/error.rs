//! Error types for the famcert library.
//!
//! Everything fatal is a [`CertError`]. Missing certificate structure (no
//! family table, no stamp, no municipal header) is *not* an error: the
//! extractors degrade to empty strings and empty collections, and the
//! renderer accepts an empty certificate.
//!
//! In a batch the first `CertError` aborts the remaining files.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the famcert library.
#[derive(Debug, Error)]
pub enum CertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Certificate file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Extension or content is not one of PDF / JPEG / PNG.
    #[error("Unsupported file '{path}': {reason}\nAccepted formats: .pdf, .jpg, .jpeg, .png")]
    UnsupportedFormat { path: PathBuf, reason: String },

    // ── Access gate ───────────────────────────────────────────────────────
    /// No shared password has been configured, so nobody may proceed.
    #[error("No application password configured.\nSet APP_PASSWORD before running.")]
    AuthNotConfigured,

    /// The supplied password does not match the shared password.
    #[error("Wrong password")]
    AuthenticationFailed,

    // ── OCR errors ────────────────────────────────────────────────────────
    /// The OCR backend refused the document encoding (e.g. multi-page PDF).
    ///
    /// Triggers the rasterise-and-resubmit fallback for PDFs; fatal otherwise.
    #[error("OCR backend does not support this document: {detail}")]
    OcrUnsupportedDocument { detail: String },

    /// Any other OCR backend failure.
    #[error("OCR request failed: {detail}")]
    OcrFailed { detail: String },

    /// A saved OCR response could not be parsed.
    #[error("Invalid OCR response JSON: {0}")]
    InvalidOcrResponse(#[from] serde_json::Error),

    // ── Rasterisation errors ──────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Scanned PDFs the OCR backend rejects are rasterised with pdfium.\n\
  • Put libpdfium next to the binary, or\n\
  • Set PDFIUM_LIB_PATH=/path/to/dir/containing/libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    /// pdfium could not open or render the PDF.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// JPEG/PNG input could not be decoded or re-encoded.
    #[error("Image processing failed for '{name}': {detail}")]
    ImageDecodeFailed { name: String, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The document renderer failed to build the output file.
    #[error("Failed to render document: {0}")]
    RenderFailed(String),

    /// Building the batch ZIP archive failed.
    #[error("Failed to build archive: {0}")]
    ArchiveFailed(String),

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Strict mode: at least one extracted value had no Italian mapping.
    #[error("{} untranslated term(s) in '{file}': {}", terms.len(), terms.join(", "))]
    UntranslatedTerms { file: String, terms: Vec<String> },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
