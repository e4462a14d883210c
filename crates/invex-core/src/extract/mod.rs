//! Invoice extraction through an external multimodal model.

mod gemini;

pub use gemini::GeminiExtractor;

use async_trait::async_trait;

use crate::error::ExtractionError;
use crate::models::invoice::Invoice;
use crate::schema::SchemaDescriptor;
use crate::upload::InvoiceImage;

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Backend that turns one invoice image into a validated [`Invoice`].
///
/// Each call is independent: no retries, no caching.
#[async_trait]
pub trait InvoiceExtractor: Send + Sync {
    /// Submit the image and target schema, returning the validated invoice.
    async fn extract(&self, image: &InvoiceImage, schema: &SchemaDescriptor) -> Result<Invoice>;
}
