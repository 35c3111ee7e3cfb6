//! Upload validation: turn a user-selected file into a [`ProcessingRequest`].
//!
//! A `ProcessingRequest` can only be built through [`ProcessingRequest::new`]
//! or [`ProcessingRequest::from_path`], both of which check the file against
//! [`UploadConstraints`]. Wrong-type or oversized files are therefore rejected
//! before the controller ever sees them, and no network call is made for them.
//!
//! The content type is sniffed from the `%PDF` magic bytes rather than trusted
//! from the file name: a renamed `.docx` is still refused.

use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// The only content type the backend accepts.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Default upload limit (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Type and size limits an upload must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConstraints {
    /// MIME type the file must have. Default: `application/pdf`.
    pub accepted_type: String,
    /// Maximum file size in bytes. Default: 10 MiB.
    pub max_size_bytes: u64,
}

impl Default for UploadConstraints {
    fn default() -> Self {
        Self {
            accepted_type: PDF_CONTENT_TYPE.to_string(),
            max_size_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// A validated file, ready to be submitted.
#[derive(Clone)]
pub struct ProcessingRequest {
    file_name: String,
    bytes: Vec<u8>,
    content_type: &'static str,
}

impl std::fmt::Debug for ProcessingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingRequest")
            .field("file_name", &self.file_name)
            .field("size", &self.bytes.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

impl ProcessingRequest {
    /// Validate an in-memory file.
    pub fn new(
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        constraints: &UploadConstraints,
    ) -> Result<Self, ClientError> {
        let file_name = file_name.into();

        if bytes.is_empty() {
            return Err(ClientError::EmptyFile { name: file_name });
        }

        let detected = sniff_content_type(&bytes);
        if detected != constraints.accepted_type {
            return Err(ClientError::UnsupportedFileType {
                name: file_name,
                detected: detected.to_string(),
            });
        }

        let size = bytes.len() as u64;
        if size > constraints.max_size_bytes {
            return Err(ClientError::FileTooLarge {
                name: file_name,
                size,
                max: constraints.max_size_bytes,
            });
        }

        debug!("Accepted upload '{}' ({} bytes)", file_name, size);
        Ok(Self {
            file_name,
            bytes,
            content_type: detected,
        })
    }

    /// Read and validate a local file.
    ///
    /// The size limit is checked against file metadata before reading, so a
    /// multi-gigabyte file is refused without loading it.
    pub async fn from_path(
        path: impl AsRef<Path>,
        constraints: &UploadConstraints,
    ) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.pdf".to_string());

        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| map_io_error(path, e))?;
        if !meta.is_file() {
            return Err(ClientError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        if meta.len() > constraints.max_size_bytes {
            return Err(ClientError::FileTooLarge {
                name: file_name,
                size: meta.len(),
                max: constraints.max_size_bytes,
            });
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| map_io_error(path, e))?;
        Self::new(file_name, bytes, constraints)
    }

    /// Name sent as the multipart file name; the backend keys its cache on it.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Best-effort MIME detection from leading bytes.
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    match bytes {
        [b'%', b'P', b'D', b'F', ..] => PDF_CONTENT_TYPE,
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'P', b'K', 0x03, 0x04, ..] => "application/zip",
        _ if std::str::from_utf8(bytes).is_ok() => "text/plain",
        _ => "application/octet-stream",
    }
}

fn map_io_error(path: &Path, e: std::io::Error) -> ClientError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => ClientError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ClientError::FileNotFound {
            path: path.to_path_buf(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf_bytes() -> Vec<u8> {
        b"%PDF-1.7\n%minimal\n".to_vec()
    }

    #[test]
    fn accepts_pdf() {
        let req = ProcessingRequest::new("notes.pdf", pdf_bytes(), &UploadConstraints::default())
            .expect("pdf should be accepted");
        assert_eq!(req.file_name(), "notes.pdf");
        assert_eq!(req.content_type(), PDF_CONTENT_TYPE);
        assert_eq!(req.size(), pdf_bytes().len() as u64);
    }

    #[test]
    fn rejects_renamed_non_pdf() {
        let err = ProcessingRequest::new(
            "notes.pdf",
            b"PK\x03\x04docx".to_vec(),
            &UploadConstraints::default(),
        )
        .unwrap_err();
        match err {
            ClientError::UnsupportedFileType { detected, .. } => {
                assert_eq!(detected, "application/zip")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn rejects_oversized() {
        let constraints = UploadConstraints {
            max_size_bytes: 4,
            ..Default::default()
        };
        let err = ProcessingRequest::new("big.pdf", pdf_bytes(), &constraints).unwrap_err();
        assert!(matches!(err, ClientError::FileTooLarge { max: 4, .. }));
    }

    #[test]
    fn rejects_empty() {
        let err =
            ProcessingRequest::new("empty.pdf", Vec::new(), &UploadConstraints::default()).unwrap_err();
        assert!(matches!(err, ClientError::EmptyFile { .. }));
    }

    #[test]
    fn sniffing() {
        assert_eq!(sniff_content_type(b"%PDF-1.4"), PDF_CONTENT_TYPE);
        assert_eq!(sniff_content_type(b"\x89PNG\r\n"), "image/png");
        assert_eq!(sniff_content_type(b"hello"), "text/plain");
        assert_eq!(sniff_content_type(&[0xC3, 0x28, 0x00]), "application/octet-stream");
    }

    #[tokio::test]
    async fn from_path_missing_file() {
        let err = ProcessingRequest::from_path(
            "/definitely/not/here.pdf",
            &UploadConstraints::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClientError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lecture.pdf");
        std::fs::write(&path, pdf_bytes()).unwrap();

        let req = ProcessingRequest::from_path(&path, &UploadConstraints::default())
            .await
            .unwrap();
        assert_eq!(req.file_name(), "lecture.pdf");
        assert_eq!(req.bytes(), pdf_bytes().as_slice());
    }
}
