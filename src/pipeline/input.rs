//! Input loading: read an uploaded certificate and classify it.
//!
//! The extension decides the kind (PDF vs. image), then the magic bytes must
//! agree. Checking both up front gives a readable error instead of an opaque
//! OCR-backend rejection further down the pipeline.

use crate::error::CertError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Accepted upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    Jpeg,
    Png,
}

impl InputKind {
    /// Classify by file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(InputKind::Pdf),
            "jpg" | "jpeg" => Some(InputKind::Jpeg),
            "png" => Some(InputKind::Png),
            _ => None,
        }
    }

    fn magic_matches(self, bytes: &[u8]) -> bool {
        match self {
            InputKind::Pdf => bytes.starts_with(b"%PDF"),
            InputKind::Jpeg => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
            InputKind::Png => bytes.starts_with(&[0x89, b'P', b'N', b'G']),
        }
    }
}

/// An uploaded certificate held in memory.
#[derive(Debug, Clone)]
pub struct InputDocument {
    /// Original file name, used to name the rendered output.
    pub name: String,
    pub kind: InputKind,
    pub bytes: Vec<u8>,
}

impl InputDocument {
    /// Build from bytes already in memory, validating kind against content.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, CertError> {
        let name = name.into();
        let path = PathBuf::from(&name);
        let kind = InputKind::from_path(&path).ok_or_else(|| CertError::UnsupportedFormat {
            path: path.clone(),
            reason: "unknown extension".into(),
        })?;
        if !kind.magic_matches(&bytes) {
            let head: Vec<u8> = bytes.iter().take(4).copied().collect();
            return Err(CertError::UnsupportedFormat {
                path,
                reason: format!("content does not look like {kind:?} (first bytes: {head:?})"),
            });
        }
        Ok(Self { name, kind, bytes })
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}

/// Read and validate a certificate from disk.
pub async fn load_input(path: &Path) -> Result<InputDocument, CertError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => CertError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => CertError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => CertError::Internal(format!("reading {}: {e}", path.display())),
    })?;

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("certificate")
        .to_string();

    let doc = InputDocument::from_bytes(name, bytes).map_err(|e| match e {
        CertError::UnsupportedFormat { reason, .. } => CertError::UnsupportedFormat {
            path: path.to_path_buf(),
            reason,
        },
        other => other,
    })?;
    debug!("Loaded {} ({:?}, {} bytes)", doc.name, doc.kind, doc.bytes.len());
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension() {
        assert_eq!(InputKind::from_path(Path::new("a.PDF")), Some(InputKind::Pdf));
        assert_eq!(InputKind::from_path(Path::new("a.jpeg")), Some(InputKind::Jpeg));
        assert_eq!(InputKind::from_path(Path::new("a.JPG")), Some(InputKind::Jpeg));
        assert_eq!(InputKind::from_path(Path::new("a.png")), Some(InputKind::Png));
        assert_eq!(InputKind::from_path(Path::new("a.tiff")), None);
        assert_eq!(InputKind::from_path(Path::new("noext")), None);
    }

    #[test]
    fn magic_bytes_must_agree() {
        assert!(InputDocument::from_bytes("c.pdf", b"%PDF-1.7\n".to_vec()).is_ok());
        let err = InputDocument::from_bytes("c.pdf", b"\x89PNG....".to_vec()).unwrap_err();
        assert!(matches!(err, CertError::UnsupportedFormat { .. }));
        assert!(InputDocument::from_bytes("c.docx", b"PK\x03\x04".to_vec()).is_err());
    }

    #[test]
    fn stem_strips_extension() {
        let doc = InputDocument::from_bytes("Certifikata Rossi.pdf", b"%PDF".to_vec()).unwrap();
        assert_eq!(doc.stem(), "Certifikata Rossi");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = load_input(Path::new("/definitely/not/here.pdf")).await.unwrap_err();
        assert!(matches!(err, CertError::FileNotFound { .. }));
    }
}
