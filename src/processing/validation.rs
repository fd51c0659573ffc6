//! Upload admission policy.
//!
//! Every file passes three checks in order, stopping at the first failure:
//!
//! 1. size against the configured ceiling,
//! 2. filename extension against [`ALLOWED_FILE_TYPES`] (case-insensitive),
//! 3. MIME type sniffed from the first [`SNIFF_LEN`] bytes against the same table.
//!
//! Sniffing only looks at a prefix slice of the buffered upload, so the full content is still
//! intact for the storage write that follows.

use bytes::Bytes;
use std::path::Path;

use super::types::ValidationError;

/// Number of leading bytes inspected when sniffing the content type.
pub const SNIFF_LEN: usize = 2048;

/// Accepted `(extension, MIME type)` pairs.
pub const ALLOWED_FILE_TYPES: [(&str, &str); 5] = [
    (".pdf", "application/pdf"),
    (".tiff", "image/tiff"),
    (".png", "image/png"),
    (".jpeg", "image/jpeg"),
    (".jpg", "image/jpeg"),
];

/// A file received on `POST /upload`, buffered for the duration of the request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied filename.
    pub filename: String,
    /// Client-declared content type, if any.
    pub content_type: Option<String>,
    /// Full file content.
    pub data: Bytes,
}

impl UploadedFile {
    /// Size of the file in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Lower-cased extension including the leading dot, or an empty string.
    pub fn extension(&self) -> String {
        let lowered = self.filename.to_lowercase();
        Path::new(&lowered)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default()
    }

    /// Leading bytes used for content sniffing.
    pub fn header(&self) -> &[u8] {
        &self.data[..self.data.len().min(SNIFF_LEN)]
    }
}

/// A file that passed validation, paired with its sniffed MIME type.
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    /// The admitted file.
    pub file: UploadedFile,
    /// Content type derived from the file signature.
    pub mime_type: &'static str,
}

/// Applies the upload admission policy.
#[derive(Debug, Clone, Copy)]
pub struct FileValidator {
    max_file_size: usize,
}

impl FileValidator {
    /// Build a validator that rejects files larger than `max_file_size` bytes.
    pub const fn new(max_file_size: usize) -> Self {
        Self { max_file_size }
    }

    /// Largest admitted file size in bytes.
    pub const fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Check a single file, returning its sniffed MIME type when admitted.
    pub fn validate(&self, file: &UploadedFile) -> Result<&'static str, ValidationError> {
        if file.size() > self.max_file_size {
            return Err(ValidationError::SizeExceeded {
                limit: self.max_file_size,
            });
        }

        let extension = file.extension();
        if !ALLOWED_FILE_TYPES
            .iter()
            .any(|(allowed, _)| *allowed == extension)
        {
            return Err(ValidationError::ExtensionNotAllowed { extension });
        }

        let sniffed = sniff_mime_type(file.header());
        ALLOWED_FILE_TYPES
            .iter()
            .find(|(_, mime)| *mime == sniffed)
            .map(|(_, mime)| *mime)
            .ok_or_else(|| ValidationError::TypeNotAllowed {
                mime_type: sniffed.to_string(),
            })
    }

    /// Validate every file of a batch before any of them is accepted.
    ///
    /// The first failure rejects the whole batch.
    pub fn validate_batch(
        &self,
        files: Vec<UploadedFile>,
    ) -> Result<Vec<ValidatedUpload>, ValidationError> {
        files
            .into_iter()
            .map(|file| {
                let mime_type = self.validate(&file).inspect_err(|error| {
                    tracing::info!(filename = %file.filename, error = %error, "Upload rejected");
                })?;
                Ok(ValidatedUpload { file, mime_type })
            })
            .collect()
    }
}

/// Derive a MIME type from a file signature, ignoring any client-declared type.
pub fn sniff_mime_type(header: &[u8]) -> &'static str {
    if header.is_empty() {
        return "application/x-empty";
    }
    match infer::get(header) {
        Some(kind) => kind.mime_type(),
        None if std::str::from_utf8(header).is_ok() => "text/plain",
        None => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDF_HEADER: &[u8] = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n1 0 obj\n";
    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
    const JPEG_HEADER: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
    const TIFF_HEADER: &[u8] = &[b'I', b'I', 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00];

    fn file(name: &str, data: &[u8]) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            content_type: None,
            data: Bytes::copy_from_slice(data),
        }
    }

    #[test]
    fn admits_allowed_signatures() {
        let validator = FileValidator::new(1024);
        assert_eq!(validator.validate(&file("a.pdf", PDF_HEADER)), Ok("application/pdf"));
        assert_eq!(validator.validate(&file("b.png", PNG_HEADER)), Ok("image/png"));
        assert_eq!(validator.validate(&file("c.JPG", JPEG_HEADER)), Ok("image/jpeg"));
        assert_eq!(validator.validate(&file("d.tiff", TIFF_HEADER)), Ok("image/tiff"));
    }

    #[test]
    fn rejects_oversized_before_other_checks() {
        let validator = FileValidator::new(4);
        let error = validator
            .validate(&file("notes.txt", b"plain text"))
            .unwrap_err();
        assert_eq!(error, ValidationError::SizeExceeded { limit: 4 });
        assert!(error.to_string().contains("size exceeds the limit of 4 bytes"));
    }

    #[test]
    fn accepts_file_exactly_at_limit() {
        let validator = FileValidator::new(PDF_HEADER.len());
        assert!(validator.validate(&file("a.pdf", PDF_HEADER)).is_ok());
    }

    #[test]
    fn rejects_disallowed_extension_even_with_valid_content() {
        let validator = FileValidator::new(1024);
        let error = validator.validate(&file("scan.txt", PDF_HEADER)).unwrap_err();
        assert_eq!(
            error,
            ValidationError::ExtensionNotAllowed {
                extension: ".txt".into()
            }
        );
        assert_eq!(error.to_string(), "File type .txt not allowed.");
    }

    #[test]
    fn rejects_missing_extension() {
        let validator = FileValidator::new(1024);
        let error = validator.validate(&file("README", PDF_HEADER)).unwrap_err();
        assert_eq!(
            error,
            ValidationError::ExtensionNotAllowed {
                extension: String::new()
            }
        );
    }

    #[test]
    fn rejects_sniffed_type_mismatch() {
        let validator = FileValidator::new(1024);
        let error = validator
            .validate(&file("file1.pdf", b"Text content"))
            .unwrap_err();
        assert_eq!(error.to_string(), "File type text/plain is not allowed.");
    }

    #[test]
    fn batch_rejects_when_any_file_is_invalid() {
        let validator = FileValidator::new(1024);
        let files = vec![
            file("a.pdf", PDF_HEADER),
            file("invalid.txt", b"Invalid"),
            file("b.png", PNG_HEADER),
        ];
        let error = validator.validate_batch(files).unwrap_err();
        assert!(matches!(error, ValidationError::ExtensionNotAllowed { .. }));
    }

    #[test]
    fn batch_preserves_order_and_types() {
        let validator = FileValidator::new(1024);
        let admitted = validator
            .validate_batch(vec![file("a.pdf", PDF_HEADER), file("b.png", PNG_HEADER)])
            .expect("valid batch");
        let types: Vec<_> = admitted.iter().map(|upload| upload.mime_type).collect();
        assert_eq!(types, vec!["application/pdf", "image/png"]);
        assert_eq!(admitted[0].file.data.as_ref(), PDF_HEADER);
    }

    #[test]
    fn sniffing_only_reads_the_prefix() {
        let mut data = PDF_HEADER.to_vec();
        data.resize(SNIFF_LEN * 2, b' ');
        let upload = file("big.pdf", &data);
        assert_eq!(upload.header().len(), SNIFF_LEN);
        assert_eq!(upload.size(), SNIFF_LEN * 2);
    }

    #[test]
    fn sniff_falls_back_for_unknown_signatures() {
        assert_eq!(sniff_mime_type(b""), "application/x-empty");
        assert_eq!(sniff_mime_type(b"hello"), "text/plain");
        assert_eq!(sniff_mime_type(&[0xC3, 0x28, 0xA0]), "application/octet-stream");
    }
}
