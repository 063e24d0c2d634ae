//! Conversion entry points.
//!
//! A file goes through OCR, extraction and rendering before the next one
//! starts. The first failure stops the batch; nothing partial is returned.

use crate::config::ConversionConfig;
use crate::error::CertError;
use crate::output::{BatchOutput, ConversionOutput, ConversionStats};
use crate::pipeline::docx::{DocumentRenderer, DocxRenderer};
use crate::pipeline::extract::extract_certificate;
use crate::pipeline::input::{load_input, InputDocument};
use crate::pipeline::ocr::{analyze_document, OcrBackend, TextractBackend};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// MIME type of a multi-file download.
pub const ZIP_MIME: &str = "application/zip";

/// Check a session's password against the shared one.
///
/// An unset or empty shared password admits nobody.
pub fn authenticate(supplied: &str, expected: Option<&str>) -> Result<(), CertError> {
    let expected = match expected {
        Some(p) if !p.is_empty() => p,
        _ => return Err(CertError::AuthNotConfigured),
    };
    if supplied.as_bytes() == expected.as_bytes() {
        Ok(())
    } else {
        warn!("Rejected a session with the wrong password");
        Err(CertError::AuthenticationFailed)
    }
}

// ── Output naming ────────────────────────────────────────────────────────

/// `Certificato_di_Famiglia_{dd-mm-YYYY}.{ext}`, the name of a lone document.
pub fn single_output_name(date: NaiveDate, extension: &str) -> String {
    format!(
        "Certificato_di_Famiglia_{}.{}",
        date.format("%d-%m-%Y"),
        extension
    )
}

/// `{stem}_{dd-mm-YYYY}.{ext}`, the name of one entry inside the archive.
pub fn archive_entry_name(stem: &str, date: NaiveDate, extension: &str) -> String {
    format!("{}_{}.{}", stem, date.format("%d-%m-%Y"), extension)
}

/// `certificati_tradotti_{YYYY-mm-dd}.zip`.
pub fn archive_name(date: NaiveDate) -> String {
    format!("certificati_tradotti_{}.zip", date.format("%Y-%m-%d"))
}

/// Bundle named documents into a deflated zip archive.
///
/// Repeated names get a `_2`, `_3`, … suffix before the extension so every
/// input keeps its own entry.
pub fn build_archive<'a, I>(entries: I) -> Result<Vec<u8>, CertError>
where
    I: IntoIterator<Item = (String, &'a [u8])>,
{
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut seen = HashSet::new();

    for (name, bytes) in entries {
        let name = unique_name(&mut seen, name);
        zip.start_file(name.as_str(), options)
            .map_err(|e| CertError::ArchiveFailed(format!("{name}: {e}")))?;
        zip.write_all(bytes)
            .map_err(|e| CertError::ArchiveFailed(format!("{name}: {e}")))?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| CertError::ArchiveFailed(e.to_string()))?;
    Ok(cursor.into_inner())
}

fn unique_name(seen: &mut HashSet<String>, name: String) -> String {
    if seen.insert(name.clone()) {
        return name;
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((s, e)) => (s.to_string(), format!(".{e}")),
        None => (name.clone(), String::new()),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{stem}_{n}{ext}");
        if seen.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

// ── Single document ──────────────────────────────────────────────────────

/// Convert one in-memory certificate.
///
/// # Errors
/// OCR failures other than the handled PDF rejection, render failures, and
/// [`CertError::UntranslatedTerms`] in strict mode. A scan without a family
/// table is not an error; it yields a certificate with no records.
pub async fn convert_document(
    input: &InputDocument,
    config: &ConversionConfig,
    issued_on: NaiveDate,
) -> Result<ConversionOutput, CertError> {
    let backend = resolve_backend(config).await;
    let renderer = resolve_renderer(config)?;
    convert_with(input, backend.as_ref(), renderer.as_ref(), config, issued_on).await
}

/// Load a certificate from disk and convert it, dated today.
pub async fn convert_file(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, CertError> {
    let input = load_input(path.as_ref()).await?;
    convert_document(&input, config, today()).await
}

/// Synchronous wrapper around [`convert_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, CertError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_file(path, config))
}

async fn convert_with(
    input: &InputDocument,
    backend: &dyn OcrBackend,
    renderer: &dyn DocumentRenderer,
    config: &ConversionConfig,
    issued_on: NaiveDate,
) -> Result<ConversionOutput, CertError> {
    let total_start = Instant::now();
    info!("Converting {}", input.name);

    // ── Step 1: OCR ──────────────────────────────────────────────────────
    let ocr_start = Instant::now();
    let ocr = analyze_document(backend, input, config).await?;
    let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;

    // ── Step 2: Extract + translate ──────────────────────────────────────
    let certificate = extract_certificate(&ocr.blocks, &config.layout);
    let records = certificate.populated_records().count();
    debug!(
        "{}: {} records, issue date {:?}, comune {:?}",
        input.name, records, certificate.metadata.issue_date, certificate.metadata.comune
    );

    if !certificate.untranslated.is_empty() {
        warn!(
            "{}: {} value(s) left untranslated",
            input.name,
            certificate.untranslated.len()
        );
        if config.strict_translation {
            return Err(CertError::UntranslatedTerms {
                file: input.name.clone(),
                terms: certificate
                    .untranslated
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            });
        }
    }

    // ── Step 3: Render ───────────────────────────────────────────────────
    let document = renderer.render(&certificate, issued_on)?;

    let stats = ConversionStats {
        blocks: ocr.blocks.len(),
        records,
        untranslated: certificate.untranslated.len(),
        ocr_requests: ocr.requests,
        rasterised: ocr.rasterised,
        ocr_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "{}: done, {} records, {}ms total",
        input.name, records, stats.total_duration_ms
    );

    Ok(ConversionOutput {
        file_name: input.name.clone(),
        certificate,
        document,
        stats,
    })
}

// ── Batches ──────────────────────────────────────────────────────────────

/// Convert several certificates from disk into one download.
///
/// Files are read lazily, so a missing third file fails only after the
/// first two were converted.
pub async fn convert_batch(
    paths: &[PathBuf],
    config: &ConversionConfig,
) -> Result<BatchOutput, CertError> {
    let issued_on = today();
    run_batch(paths.len(), config, issued_on, |i| async move {
        load_input(&paths[i]).await
    })
    .await
}

/// Convert certificates already in memory into one download.
pub async fn convert_uploads(
    uploads: &[InputDocument],
    config: &ConversionConfig,
    issued_on: NaiveDate,
) -> Result<BatchOutput, CertError> {
    run_batch(uploads.len(), config, issued_on, |i| async move {
        Ok(uploads[i].clone())
    })
    .await
}

async fn run_batch<F, Fut>(
    total: usize,
    config: &ConversionConfig,
    issued_on: NaiveDate,
    mut next_input: F,
) -> Result<BatchOutput, CertError>
where
    F: FnMut(usize) -> Fut,
    Fut: std::future::Future<Output = Result<InputDocument, CertError>>,
{
    if total == 0 {
        return Err(CertError::InvalidConfig("No input files given".into()));
    }

    let backend = resolve_backend(config).await;
    let renderer = resolve_renderer(config)?;
    let cb = config.progress_callback.as_ref();

    if let Some(cb) = cb {
        cb.on_batch_start(total);
    }
    info!("Starting batch of {} file(s)", total);

    let mut files = Vec::with_capacity(total);
    let mut stems = Vec::with_capacity(total);
    for i in 0..total {
        let result = async {
            let input = next_input(i).await?;
            if let Some(cb) = cb {
                cb.on_file_start(i + 1, total, &input.name);
            }
            let out =
                convert_with(&input, backend.as_ref(), renderer.as_ref(), config, issued_on)
                    .await?;
            Ok::<_, CertError>((input.stem().to_string(), out))
        }
        .await;

        match result {
            Ok((stem, out)) => {
                if let Some(cb) = cb {
                    cb.on_file_complete(i + 1, total, out.stats.records);
                }
                stems.push(stem);
                files.push(out);
            }
            Err(e) => {
                if let Some(cb) = cb {
                    cb.on_file_error(i + 1, total, &e.to_string());
                }
                return Err(e);
            }
        }
    }

    let ext = renderer.extension();
    let output = if files.len() == 1 {
        BatchOutput {
            file_name: single_output_name(issued_on, ext),
            mime_type: renderer.mime_type().to_string(),
            bytes: files[0].document.clone(),
            files,
        }
    } else {
        let bytes = build_archive(stems.iter().zip(&files).map(|(stem, f)| {
            (
                archive_entry_name(stem, issued_on, ext),
                f.document.as_slice(),
            )
        }))?;
        BatchOutput {
            file_name: archive_name(issued_on),
            mime_type: ZIP_MIME.to_string(),
            bytes,
            files,
        }
    };

    if let Some(cb) = cb {
        cb.on_batch_complete(total);
    }
    info!("Batch complete: {}", output.file_name);
    Ok(output)
}

// ── Output file ──────────────────────────────────────────────────────────

/// Write bytes to `path` atomically (temp file + rename).
pub async fn write_output(path: impl AsRef<Path>, bytes: &[u8]) -> Result<(), CertError> {
    let path = path.as_ref();
    let fail = |e| CertError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    tokio::fs::write(&tmp_path, bytes).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)?;
    debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// The injected backend, or a Textract client built from `config.ocr`.
async fn resolve_backend(config: &ConversionConfig) -> Arc<dyn OcrBackend> {
    if let Some(ref backend) = config.ocr_backend {
        return Arc::clone(backend);
    }
    Arc::new(TextractBackend::from_config(&config.ocr).await)
}

fn resolve_renderer(config: &ConversionConfig) -> Result<Arc<dyn DocumentRenderer>, CertError> {
    if let Some(ref renderer) = config.renderer {
        return Ok(Arc::clone(renderer));
    }
    Ok(Arc::new(DocxRenderer::from_config(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn password_gate() {
        assert!(authenticate("s3same", Some("s3same")).is_ok());
        assert!(matches!(
            authenticate("guess", Some("s3same")),
            Err(CertError::AuthenticationFailed)
        ));
        assert!(matches!(
            authenticate("anything", None),
            Err(CertError::AuthNotConfigured)
        ));
        assert!(matches!(
            authenticate("", Some("")),
            Err(CertError::AuthNotConfigured)
        ));
    }

    #[test]
    fn output_names() {
        let date = d(2024, 3, 7);
        assert_eq!(
            single_output_name(date, "docx"),
            "Certificato_di_Famiglia_07-03-2024.docx"
        );
        assert_eq!(
            archive_entry_name("scan_01", date, "docx"),
            "scan_01_07-03-2024.docx"
        );
        assert_eq!(archive_name(date), "certificati_tradotti_2024-03-07.zip");
    }

    #[test]
    fn archive_keeps_every_entry() {
        let a: &[u8] = b"first";
        let b: &[u8] = b"second";
        let bytes = build_archive(vec![
            ("x_01-01-2024.docx".to_string(), a),
            ("x_01-01-2024.docx".to_string(), b),
        ])
        .unwrap();

        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(zip.len(), 2);
        let mut second = String::new();
        zip.by_name("x_01-01-2024_2.docx")
            .unwrap()
            .read_to_string(&mut second)
            .unwrap();
        assert_eq!(second, "second");
    }

    #[tokio::test]
    async fn write_output_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.docx");
        write_output(&path, b"PK").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"PK");
        assert!(!dir.path().join("nested").join("out.docx.tmp").exists());
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let err = convert_uploads(&[], &ConversionConfig::default(), d(2024, 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, CertError::InvalidConfig(_)));
    }
}
