//! Pipeline stages for certificate conversion.
//!
//! Each submodule implements one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ ocr ──▶ extract ──▶ docx
//!            │         │
//!       rasterize   translate
//!      (fallback)
//! ```
//!
//! 1. [`input`]: read the upload, check extension against magic bytes
//! 2. [`ocr`]: send bytes to the OCR backend; the only stage with
//!    network I/O
//! 3. [`rasterize`]: PDF pages to landscape PNGs, used when the backend
//!    rejects a native PDF and for image uploads
//! 4. [`extract`]: locate the family table and the header/footer text in
//!    the block list
//! 5. [`translate`]: Albanian table values to Italian, gender-aware
//! 6. [`docx`]: lay the certificate out as an Italian document

pub mod docx;
pub mod extract;
pub mod input;
pub mod ocr;
pub mod rasterize;
pub mod translate;
