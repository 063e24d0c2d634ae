//! Configuration for certificate conversion.
//!
//! All behaviour is controlled through [`ConversionConfig`], built via its
//! [`ConversionConfigBuilder`]. Collaborators with process-wide setup cost
//! (the OCR client, the renderer) are injected here once and shared by every
//! file of a batch; the pipeline itself holds no global state.

use crate::convert::authenticate;
use crate::error::CertError;
use crate::pipeline::docx::DocumentRenderer;
use crate::pipeline::extract::TableLayout;
use crate::pipeline::ocr::OcrBackend;
use crate::pipeline::rasterize::PageRasterizer;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-2";

/// Environment variable holding the shared password.
pub const APP_PASSWORD_ENV: &str = "APP_PASSWORD";

/// Configuration for converting one or more certificates.
///
/// # Example
/// ```rust
/// use famcert::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .dpi(300)
///     .strict_translation(true)
///     .build()
///     .unwrap();
/// assert!(config.strict_translation);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Rasterisation DPI for the PDF fallback path. Range: 72–600. Default: 300.
    ///
    /// Scans are small print in a dense table; below ~200 DPI Textract starts
    /// merging adjacent cells.
    pub dpi: u32,

    /// OCR client settings, used when no backend is injected.
    pub ocr: OcrConfig,

    /// Pre-constructed OCR backend. Takes precedence over `ocr`.
    pub ocr_backend: Option<Arc<dyn OcrBackend>>,

    /// Pre-constructed renderer. Defaults to the DOCX renderer.
    pub renderer: Option<Arc<dyn DocumentRenderer>>,

    /// Page rasteriser for the fallback path. Defaults to pdfium at
    /// `pdfium_lib_path`.
    pub rasterizer: Option<Arc<dyn PageRasterizer>>,

    /// Column positions of the source family table.
    pub layout: TableLayout,

    /// Fail a file when any table value has no Italian mapping. Default: false.
    pub strict_translation: bool,

    /// Sworn-translator block appended to the document. Default: none.
    pub attestation: Option<TranslatorAttestation>,

    /// Flag image placed in the document header.
    pub flag_image: Option<PathBuf>,

    /// Directory containing libpdfium. Falls back to `./` then the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Shared password every session must present. `None` locks everyone out.
    pub app_password: Option<String>,

    /// Optional per-file progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            ocr: OcrConfig::default(),
            ocr_backend: None,
            renderer: None,
            rasterizer: None,
            layout: TableLayout::default(),
            strict_translation: false,
            attestation: None,
            flag_image: None,
            pdfium_lib_path: None,
            app_password: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("dpi", &self.dpi)
            .field("ocr", &self.ocr)
            .field("ocr_backend", &self.ocr_backend.as_ref().map(|b| b.name().to_string()))
            .field("renderer", &self.renderer.as_ref().map(|_| "<dyn DocumentRenderer>"))
            .field("rasterizer", &self.rasterizer.as_ref().map(|_| "<dyn PageRasterizer>"))
            .field("layout", &self.layout)
            .field("strict_translation", &self.strict_translation)
            .field("attestation", &self.attestation)
            .field("flag_image", &self.flag_image)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("app_password", &self.app_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Admit a session presenting `supplied`, or refuse it.
    ///
    /// Checks against [`app_password`](Self::app_password) only; with none
    /// configured every session is refused.
    pub fn authorize(&self, supplied: &str) -> Result<(), CertError> {
        authenticate(supplied, self.app_password.as_deref())
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn ocr(mut self, ocr: OcrConfig) -> Self {
        self.config.ocr = ocr;
        self
    }

    pub fn ocr_backend(mut self, backend: Arc<dyn OcrBackend>) -> Self {
        self.config.ocr_backend = Some(backend);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn DocumentRenderer>) -> Self {
        self.config.renderer = Some(renderer);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn layout(mut self, layout: TableLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn strict_translation(mut self, v: bool) -> Self {
        self.config.strict_translation = v;
        self
    }

    pub fn attestation(mut self, attestation: TranslatorAttestation) -> Self {
        self.config.attestation = Some(attestation);
        self
    }

    pub fn flag_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.flag_image = Some(path.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn app_password(mut self, password: impl Into<String>) -> Self {
        self.config.app_password = Some(password.into());
        self
    }

    /// Read the shared password from [`APP_PASSWORD_ENV`]; unset leaves it `None`.
    pub fn app_password_from_env(mut self) -> Self {
        self.config.app_password = std::env::var(APP_PASSWORD_ENV).ok();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, CertError> {
        let c = &self.config;
        if c.ocr.region.trim().is_empty() {
            return Err(CertError::InvalidConfig("OCR region must not be empty".into()));
        }
        if c.ocr.access_key_id.is_some() != c.ocr.secret_access_key.is_some() {
            return Err(CertError::InvalidConfig(
                "Set both the access key id and the secret access key, or neither".into(),
            ));
        }
        let l = &c.layout;
        if l.first_data_row > l.last_data_row {
            return Err(CertError::InvalidConfig(format!(
                "Table layout data rows are reversed ({}..={})",
                l.first_data_row, l.last_data_row
            )));
        }
        if let Some(ref a) = c.attestation {
            if a.name.trim().is_empty() {
                return Err(CertError::InvalidConfig("Translator name must not be empty".into()));
            }
        }
        Ok(self.config)
    }
}

/// Settings for the AWS Textract client.
#[derive(Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// AWS region. Default: [`DEFAULT_REGION`].
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Custom endpoint, e.g. a local Textract mock.
    pub endpoint_url: Option<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            access_key_id: None,
            secret_access_key: None,
            endpoint_url: None,
        }
    }
}

impl fmt::Debug for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfig")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

/// The sworn translator who signs the Italian document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatorAttestation {
    pub name: String,
    /// Ministry of Justice certificate number.
    pub certificate_number: String,
    /// Date of that certificate, as printed (e.g. `31.07.2024`).
    pub certificate_date: String,
    /// Use feminine agreement ("traduttrice ... certificata").
    #[serde(default)]
    pub feminine: bool,
}
