//! Uploaded invoice images and the checks applied before extraction.

use std::path::Path;

use image::ImageFormat;

use crate::error::UploadError;

/// Extensions accepted by the uploader.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// A file as received from the user, before any checks.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub data: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
        }
    }

    /// Read an upload from disk, keeping only the file name.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self { filename, data })
    }
}

/// An image that passed the upload checks and can be sent to the model.
#[derive(Debug, Clone)]
pub struct InvoiceImage {
    data: Vec<u8>,
    format: ImageFormat,
}

impl InvoiceImage {
    /// Check an upload against the allow-list and size limit.
    ///
    /// The extension must be accepted and the content must sniff as JPEG or PNG.
    pub fn from_upload(upload: &Upload, max_bytes: usize) -> Result<Self, UploadError> {
        let extension = Path::new(&upload.filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(UploadError::UnsupportedFormat(upload.filename.clone()));
        }

        if upload.data.is_empty() {
            return Err(UploadError::Empty);
        }

        if upload.data.len() > max_bytes {
            return Err(UploadError::TooLarge {
                size: upload.data.len(),
                limit: max_bytes,
            });
        }

        let format = match image::guess_format(&upload.data) {
            Ok(format @ (ImageFormat::Jpeg | ImageFormat::Png)) => format,
            _ => return Err(UploadError::UnsupportedFormat(upload.filename.clone())),
        };

        Ok(Self {
            data: upload.data.clone(),
            format,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// MIME type for the sniffed format.
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}
