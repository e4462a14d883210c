//! Core library for invoice image extraction.
//!
//! This crate provides:
//! - Invoice, item and customer records plus the schema sent to the model
//! - Upload checks for accepted raster formats
//! - An extraction client trait with a Gemini backend
//! - Reshaping of a parsed batch into invoice, item and customer tables
//! - Per-user session state driving the batch parse flow

pub mod error;
pub mod extract;
pub mod models;
pub mod schema;
pub mod session;
pub mod tables;
pub mod upload;

pub use error::{ExtractionError, InvexError, Result, UploadError};
pub use extract::{GeminiExtractor, InvoiceExtractor};
pub use models::config::InvexConfig;
pub use models::invoice::{Customer, Invoice, Item, ParsedInvoice};
pub use schema::{SchemaDescriptor, validate_invoice};
pub use session::{BatchObserver, BatchReport, FileOutcome, Message, MessageLevel, NoopObserver, Session};
pub use tables::{CustomerRow, DerivedTables, InvoiceRow, ItemRow, TableRow, reshape};
pub use upload::{InvoiceImage, Upload};
