//! Results returned by the conversion entry points.

use crate::model::Certificate;
use serde::{Deserialize, Serialize};

/// One converted certificate.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// Name of the uploaded file, as given.
    pub file_name: String,

    /// Everything extracted from the OCR blocks, already translated.
    pub certificate: Certificate,

    /// Rendered document bytes.
    #[serde(skip)]
    pub document: Vec<u8>,

    pub stats: ConversionStats,
}

/// Counters and timings for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Blocks returned by the OCR backend, across all requests.
    pub blocks: usize,
    /// Family rows with at least one non-empty field.
    pub records: usize,
    /// Table values left in Albanian.
    pub untranslated: usize,
    /// OCR requests sent (more than one only on the rasterised fallback).
    pub ocr_requests: usize,
    /// The PDF was rejected natively and resubmitted as page images.
    pub rasterised: bool,
    pub ocr_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// The downloadable result of a batch.
///
/// One input yields its document directly; several inputs are bundled into
/// a zip archive with one entry per input.
#[derive(Debug, Clone)]
pub struct BatchOutput {
    /// Suggested download name.
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    /// Per-file results, in input order.
    pub files: Vec<ConversionOutput>,
}

impl BatchOutput {
    pub fn is_archive(&self) -> bool {
        self.files.len() > 1
    }

    /// Sum of the per-file counters; durations add up too.
    pub fn total_stats(&self) -> ConversionStats {
        self.files
            .iter()
            .fold(ConversionStats::default(), |mut acc, f| {
                acc.blocks += f.stats.blocks;
                acc.records += f.stats.records;
                acc.untranslated += f.stats.untranslated;
                acc.ocr_requests += f.stats.ocr_requests;
                acc.rasterised |= f.stats.rasterised;
                acc.ocr_duration_ms += f.stats.ocr_duration_ms;
                acc.total_duration_ms += f.stats.total_duration_ms;
                acc
            })
    }
}
