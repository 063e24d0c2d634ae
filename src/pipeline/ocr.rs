//! OCR boundary: turn document bytes into a flat [`Block`] list.
//!
//! The backend is a black box behind [`OcrBackend`]. [`TextractBackend`]
//! talks to AWS Textract; tests and offline replays plug in anything that
//! returns blocks.
//!
//! ## Fallback
//!
//! Textract's synchronous `AnalyzeDocument` accepts single-page PDFs only and
//! rejects the rest with `UnsupportedDocumentException`. That one error, and
//! only that one, triggers the fallback in [`analyze_document`]: rasterise
//! every page through the configured [`PageRasterizer`] and submit each as a
//! PNG. Any other failure propagates.

use crate::config::{ConversionConfig, OcrConfig};
use crate::error::CertError;
use crate::model::{Block, BlockType, Relationship, RelationshipType};
use crate::pipeline::input::{InputDocument, InputKind};
use crate::pipeline::rasterize::{self, PageRasterizer, PdfiumRasterizer};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_textract::config::{Credentials, Region};
use aws_sdk_textract::error::DisplayErrorContext;
use aws_sdk_textract::primitives::Blob;
use aws_sdk_textract::types as tx;
use aws_sdk_textract::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Anything that can lay out a document as OCR blocks.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// Analyse one document (PDF or PNG bytes) and return its blocks.
    ///
    /// Must return [`CertError::OcrUnsupportedDocument`] when the backend
    /// refuses the encoding, so the caller can fall back to page images.
    async fn analyze(&self, bytes: &[u8]) -> Result<Vec<Block>, CertError>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "ocr"
    }
}

/// How a document was read.
#[derive(Debug, Clone)]
pub struct OcrResult {
    pub blocks: Vec<Block>,
    /// Number of backend calls made.
    pub requests: usize,
    /// True when the PDF had to be rasterised first.
    pub rasterised: bool,
}

/// Run OCR on an uploaded certificate, rasterising on rejection.
pub async fn analyze_document(
    backend: &dyn OcrBackend,
    input: &InputDocument,
    config: &ConversionConfig,
) -> Result<OcrResult, CertError> {
    match input.kind {
        InputKind::Pdf => match backend.analyze(&input.bytes).await {
            Ok(blocks) => {
                debug!("{}: {} blocks from native PDF", input.name, blocks.len());
                Ok(OcrResult {
                    blocks,
                    requests: 1,
                    rasterised: false,
                })
            }
            Err(CertError::OcrUnsupportedDocument { detail }) => {
                warn!(
                    "{}: {} rejected the PDF ({}); retrying page by page as images",
                    input.name,
                    backend.name(),
                    detail
                );
                let pages = match config.rasterizer {
                    Some(ref r) => r.rasterize(input.bytes.clone(), config.dpi).await?,
                    None => {
                        PdfiumRasterizer::new(config.pdfium_lib_path.clone())
                            .rasterize(input.bytes.clone(), config.dpi)
                            .await?
                    }
                };
                let mut blocks = Vec::new();
                for (idx, png) in pages.iter().enumerate() {
                    let page_blocks = backend.analyze(png).await?;
                    blocks.extend(stamp_page(page_blocks, idx as u32 + 1));
                }
                info!(
                    "{}: {} blocks from {} rasterised pages",
                    input.name,
                    blocks.len(),
                    pages.len()
                );
                Ok(OcrResult {
                    blocks,
                    requests: 1 + pages.len(),
                    rasterised: true,
                })
            }
            Err(e) => Err(e),
        },
        InputKind::Jpeg | InputKind::Png => {
            let png = rasterize::prepare_image(&input.name, &input.bytes)?;
            let blocks = stamp_page(backend.analyze(&png).await?, 1);
            debug!("{}: {} blocks from image", input.name, blocks.len());
            Ok(OcrResult {
                blocks,
                requests: 1,
                rasterised: false,
            })
        }
    }
}

/// Tag every block with the page it came from; image submissions come back
/// without page numbers.
fn stamp_page(mut blocks: Vec<Block>, page: u32) -> Vec<Block> {
    for b in &mut blocks {
        b.page = Some(page);
    }
    blocks
}

// ── Saved responses ──────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum SavedResponse {
    Wrapped {
        #[serde(rename = "Blocks")]
        blocks: Vec<Block>,
    },
    Bare(Vec<Block>),
}

/// Parse a saved OCR response: `{"Blocks": [...]}` or a bare block array.
pub fn blocks_from_json(json: &str) -> Result<Vec<Block>, CertError> {
    Ok(match serde_json::from_str::<SavedResponse>(json)? {
        SavedResponse::Wrapped { blocks } | SavedResponse::Bare(blocks) => blocks,
    })
}

// ── AWS Textract ─────────────────────────────────────────────────────────

/// AWS Textract `AnalyzeDocument` with TABLES and FORMS features.
#[derive(Debug, Clone)]
pub struct TextractBackend {
    client: Client,
}

impl TextractBackend {
    /// Build a client from explicit settings.
    ///
    /// Uses the given key pair when both halves are set, otherwise the
    /// default AWS credential chain (environment, profile, instance role).
    pub async fn from_config(config: &OcrConfig) -> Self {
        let region = Region::new(config.region.clone());
        let client = match (&config.access_key_id, &config.secret_access_key) {
            (Some(key), Some(secret)) => {
                let credentials = Credentials::new(key, secret, None, None, "famcert");
                let mut builder = aws_sdk_textract::Config::builder()
                    .credentials_provider(credentials)
                    .region(region)
                    .behavior_version_latest();
                if let Some(ref endpoint) = config.endpoint_url {
                    builder = builder.endpoint_url(endpoint);
                }
                Client::from_conf(builder.build())
            }
            _ => {
                let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region);
                if let Some(ref endpoint) = config.endpoint_url {
                    loader = loader.endpoint_url(endpoint);
                }
                Client::new(&loader.load().await)
            }
        };
        info!("Textract client ready (region {})", config.region);
        Self { client }
    }

    /// Wrap an already configured client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OcrBackend for TextractBackend {
    async fn analyze(&self, bytes: &[u8]) -> Result<Vec<Block>, CertError> {
        let document = tx::Document::builder()
            .bytes(Blob::new(bytes.to_vec()))
            .build();

        let output = self
            .client
            .analyze_document()
            .document(document)
            .feature_types(tx::FeatureType::Tables)
            .feature_types(tx::FeatureType::Forms)
            .send()
            .await
            .map_err(|e| {
                let service = e.into_service_error();
                let detail = DisplayErrorContext(&service).to_string();
                if service.is_unsupported_document_exception() {
                    CertError::OcrUnsupportedDocument { detail }
                } else {
                    CertError::OcrFailed { detail }
                }
            })?;

        Ok(output.blocks().iter().map(convert_block).collect())
    }

    fn name(&self) -> &str {
        "textract"
    }
}

fn convert_block(b: &tx::Block) -> Block {
    let block_type = match b.block_type() {
        Some(tx::BlockType::Line) => BlockType::Line,
        Some(tx::BlockType::Word) => BlockType::Word,
        Some(tx::BlockType::Table) => BlockType::Table,
        Some(tx::BlockType::Cell) => BlockType::Cell,
        _ => BlockType::Other,
    };
    let index = |v: Option<i32>| v.and_then(|n| u32::try_from(n).ok());

    Block {
        block_type,
        id: b.id().unwrap_or_default().to_string(),
        text: b.text().map(str::to_string),
        page: index(b.page()),
        row_index: index(b.row_index()),
        column_index: index(b.column_index()),
        relationships: b
            .relationships()
            .iter()
            .map(|r| Relationship {
                kind: match r.r#type() {
                    Some(tx::RelationshipType::Child) => RelationshipType::Child,
                    _ => RelationshipType::Other,
                },
                ids: r.ids().to_vec(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct Rejecting {
        calls: AtomicUsize,
        error: fn() -> CertError,
    }

    #[async_trait]
    impl OcrBackend for Rejecting {
        async fn analyze(&self, _bytes: &[u8]) -> Result<Vec<Block>, CertError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err((self.error)())
        }
    }

    struct OneLine;

    #[async_trait]
    impl OcrBackend for OneLine {
        async fn analyze(&self, _bytes: &[u8]) -> Result<Vec<Block>, CertError> {
            Ok(vec![Block {
                block_type: BlockType::Line,
                id: "l1".into(),
                text: Some("12.03.2021".into()),
                page: None,
                row_index: None,
                column_index: None,
                relationships: vec![],
            }])
        }
    }

    /// Rejects the first submission as unsupported, then answers one LINE
    /// per call and remembers what it was sent.
    #[derive(Default)]
    struct RejectsNativePdf {
        seen: Mutex<Vec<Vec<u8>>>,
        fail_on_call: Option<usize>,
    }

    #[async_trait]
    impl OcrBackend for RejectsNativePdf {
        async fn analyze(&self, bytes: &[u8]) -> Result<Vec<Block>, CertError> {
            let call = {
                let mut seen = self.seen.lock().unwrap();
                seen.push(bytes.to_vec());
                seen.len()
            };
            if call == 1 {
                return Err(CertError::OcrUnsupportedDocument {
                    detail: "UnsupportedDocumentException".into(),
                });
            }
            if Some(call) == self.fail_on_call {
                return Err(CertError::OcrFailed {
                    detail: "throttled".into(),
                });
            }
            Ok(vec![Block {
                block_type: BlockType::Line,
                id: format!("l{call}"),
                text: Some(format!("call {call}")),
                page: Some(1),
                row_index: None,
                column_index: None,
                relationships: vec![],
            }])
        }
    }

    /// Hands back `pages` fake PNGs tagged with their page number.
    struct FakePages {
        pages: u8,
        dpi_seen: AtomicUsize,
    }

    #[async_trait]
    impl PageRasterizer for FakePages {
        async fn rasterize(&self, pdf: Vec<u8>, dpi: u32) -> Result<Vec<Vec<u8>>, CertError> {
            assert!(pdf.starts_with(b"%PDF"));
            self.dpi_seen.store(dpi as usize, Ordering::SeqCst);
            Ok((1..=self.pages).map(|n| vec![0x89, b'P', b'N', b'G', n]).collect())
        }
    }

    fn fallback_config(pages: u8) -> (ConversionConfig, Arc<FakePages>) {
        let fake = Arc::new(FakePages {
            pages,
            dpi_seen: AtomicUsize::new(0),
        });
        let config = ConversionConfig::builder()
            .dpi(200)
            .rasterizer(fake.clone())
            .build()
            .unwrap();
        (config, fake)
    }

    #[tokio::test]
    async fn unsupported_pdf_is_resubmitted_page_by_page() {
        let (config, fake) = fallback_config(3);
        let backend = RejectsNativePdf::default();
        let input = InputDocument::from_bytes("c.pdf", b"%PDF-1.4".to_vec()).unwrap();

        let result = analyze_document(&backend, &input, &config).await.unwrap();

        assert!(result.rasterised);
        assert_eq!(result.requests, 4);
        assert_eq!(fake.dpi_seen.load(Ordering::SeqCst), 200);
        let pages: Vec<_> = result.blocks.iter().map(|b| b.page).collect();
        assert_eq!(pages, vec![Some(1), Some(2), Some(3)]);

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0], b"%PDF-1.4");
        let tags: Vec<u8> = seen[1..].iter().map(|png| png[4]).collect();
        assert_eq!(tags, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn page_failure_stops_the_fallback() {
        let (config, _) = fallback_config(3);
        let backend = RejectsNativePdf {
            fail_on_call: Some(3),
            ..Default::default()
        };
        let input = InputDocument::from_bytes("c.pdf", b"%PDF-1.4".to_vec()).unwrap();

        let err = analyze_document(&backend, &input, &config).await.unwrap_err();

        assert!(matches!(err, CertError::OcrFailed { .. }));
        // native attempt, page 1, page 2; page 3 is never sent
        assert_eq!(backend.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn image_upload_is_stamped_page_one() {
        let img = image::DynamicImage::new_rgb8(6, 3);
        let png = rasterize::encode_png(&img).unwrap();
        let input = InputDocument::from_bytes("photo.png", png).unwrap();

        let result = analyze_document(&OneLine, &input, &ConversionConfig::default())
            .await
            .unwrap();

        assert_eq!(result.requests, 1);
        assert!(!result.rasterised);
        assert_eq!(result.blocks[0].page, Some(1));
    }

    #[test]
    fn saved_response_both_shapes() {
        let wrapped = r#"{"DocumentMetadata": {"Pages": 1},
            "Blocks": [{"BlockType": "LINE", "Id": "a", "Text": "x", "Page": 1}]}"#;
        let bare = r#"[{"BlockType": "WORD", "Id": "b", "Text": "y"}]"#;
        assert_eq!(blocks_from_json(wrapped).unwrap()[0].text(), "x");
        assert_eq!(blocks_from_json(bare).unwrap()[0].block_type, BlockType::Word);
        assert!(matches!(
            blocks_from_json("{"),
            Err(CertError::InvalidOcrResponse(_))
        ));
    }

    #[test]
    fn stamp_page_overwrites() {
        let blocks = stamp_page(
            vec![Block {
                block_type: BlockType::Word,
                id: "w".into(),
                text: None,
                page: Some(1),
                row_index: None,
                column_index: None,
                relationships: vec![],
            }],
            3,
        );
        assert_eq!(blocks[0].page, Some(3));
    }

    #[tokio::test]
    async fn other_backend_errors_do_not_trigger_fallback() {
        let backend = Rejecting {
            calls: AtomicUsize::new(0),
            error: || CertError::OcrFailed {
                detail: "throttled".into(),
            },
        };
        let input = InputDocument::from_bytes("c.pdf", b"%PDF-1.4".to_vec()).unwrap();
        let err = analyze_document(&backend, &input, &ConversionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CertError::OcrFailed { .. }));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn native_pdf_blocks_keep_their_pages() {
        let input = InputDocument::from_bytes("c.pdf", b"%PDF-1.4".to_vec()).unwrap();
        let result = analyze_document(&OneLine, &input, &ConversionConfig::default())
            .await
            .unwrap();
        assert_eq!(result.requests, 1);
        assert!(!result.rasterised);
        assert_eq!(result.blocks[0].page, None);
    }
}
