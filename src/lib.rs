//! # famcert
//!
//! Translate scanned Albanian family certificates ("Certifikatë Familjare")
//! into Italian DOCX documents ready for a sworn translator's signature.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / JPEG / PNG
//!  │
//!  ├─ 1. Input      sniff the upload (extension + magic bytes)
//!  ├─ 2. OCR        AWS Textract AnalyzeDocument (TABLES + FORMS);
//!  │                multi-page PDFs fall back to per-page PNGs via pdfium
//!  ├─ 3. Extract    family table, issue date, municipality, e-seal footer
//!  ├─ 4. Translate  relation / marital status / citizenship → Italian
//!  └─ 5. Render     A4 landscape DOCX; several inputs → one zip
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use famcert::{convert_file, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // AWS credentials come from the default chain unless set in `config.ocr`
//!     let config = ConversionConfig::default();
//!     let output = convert_file("certifikata.pdf", &config).await?;
//!     for record in output.certificate.populated_records() {
//!         println!("{}: {}", record.full_name, record.relation);
//!     }
//!     std::fs::write("certificato.docx", &output.document)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Offline use
//!
//! Any [`OcrBackend`] can be injected through
//! [`ConversionConfigBuilder::ocr_backend`], and [`blocks_from_json`] reads a
//! saved Textract response, so extraction and rendering run without AWS.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `famcert` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, OcrConfig, TranslatorAttestation};
pub use convert::{
    archive_entry_name, archive_name, authenticate, build_archive, convert_batch,
    convert_document, convert_file, convert_sync, convert_uploads, single_output_name,
    write_output,
};
pub use error::CertError;
pub use model::{
    Block, BlockType, Certificate, CertificateMetadata, FamilyRecord, TranslatedField,
    UntranslatedTerm,
};
pub use output::{BatchOutput, ConversionOutput, ConversionStats};
pub use pipeline::docx::{DocumentRenderer, DocxRenderer};
pub use pipeline::extract::{
    extract_certificate, extract_comune_sezione, extract_family_table, extract_issue_date,
    extract_seal_footer, TableLayout,
};
pub use pipeline::input::{InputDocument, InputKind};
pub use pipeline::ocr::{blocks_from_json, OcrBackend, TextractBackend};
pub use pipeline::rasterize::{PageRasterizer, PdfiumRasterizer};
pub use pipeline::translate::{
    normalize, translate_citizenship, translate_marital_status, translate_relation,
};
pub use progress::{BatchProgressCallback, NoopProgressCallback};
