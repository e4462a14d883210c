//! Error types for the invex-core library.

use thiserror::Error;

/// Main error type for the invex library.
#[derive(Error, Debug)]
pub enum InvexError {
    /// Extraction call or response validation failed.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Uploaded file was rejected before extraction.
    #[error("upload error: {0}")]
    Upload(#[from] UploadError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors returned by an extraction backend.
///
/// `Validation` means the service answered but the answer does not match the
/// invoice schema. Every other variant means the call itself failed.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The response does not conform to the invoice schema.
    #[error("response does not match invoice schema: {0}")]
    Validation(String),

    /// Network, TLS or body read failure.
    #[error("request failed: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("service returned {status}: {body}")]
    Service { status: u16, body: String },

    /// The service answered without any usable content.
    #[error("empty response from model: {0}")]
    EmptyResponse(String),
}

impl ExtractionError {
    /// Whether this is a schema validation failure rather than a call failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, ExtractionError::Validation(_))
    }
}

impl From<reqwest::Error> for ExtractionError {
    fn from(err: reqwest::Error) -> Self {
        ExtractionError::Transport(err.to_string())
    }
}

/// Errors raised while checking an uploaded file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// Extension or content is not an accepted raster format.
    #[error("unsupported file type: {0} (accepted: jpg, jpeg, png)")]
    UnsupportedFormat(String),

    /// The file has no content.
    #[error("file is empty")]
    Empty,

    /// The file exceeds the configured size limit.
    #[error("file is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    /// The file could not be read from disk.
    #[error("could not read file: {0}")]
    Unreadable(String),
}

/// Result type for the invex library.
pub type Result<T> = std::result::Result<T, InvexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_is_distinct_from_transport() {
        assert!(ExtractionError::Validation("missing field `tax`".into()).is_validation());
        assert!(!ExtractionError::Transport("connection refused".into()).is_validation());
        assert!(
            !ExtractionError::Service {
                status: 401,
                body: "unauthorized".into()
            }
            .is_validation()
        );
    }

    #[test]
    fn test_error_messages() {
        let err = UploadError::TooLarge { size: 30, limit: 20 };
        assert_eq!(err.to_string(), "file is 30 bytes, limit is 20 bytes");

        let err: InvexError = ExtractionError::EmptyResponse("no candidates".into()).into();
        assert_eq!(
            err.to_string(),
            "extraction error: empty response from model: no candidates"
        );
    }
}
