//! Invoice records returned by the extraction model.
//!
//! Field names match the JSON keys the model is asked to produce.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A complete invoice as read from one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Name of the issuing company.
    pub company_name: String,

    /// Address of the issuing company.
    pub company_address: String,

    /// Invoice number/identifier.
    pub invoice_number: String,

    /// Date of the invoice, verbatim from the document.
    #[serde(default)]
    pub invoice_date: Option<String>,

    /// Name and address to bill to.
    pub bill_to: String,

    /// Name and address to ship to.
    #[serde(default)]
    pub ship_to: Option<String>,

    /// Subtotal before tax.
    pub sub_total: Decimal,

    /// Tax amount.
    pub tax: Decimal,

    /// Total amount of the invoice.
    pub total_amount: Decimal,

    /// Payment due date, verbatim from the document.
    #[serde(default)]
    pub due_date: Option<String>,

    /// Line items on the invoice.
    pub items: Vec<Item>,

    /// Customer information.
    pub customer: Customer,
}

/// A single line item on the invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Item name.
    pub item_name: String,

    /// Quantity.
    pub quantity: i64,

    /// Unit price.
    pub unit_price: Decimal,

    /// Total price for this line.
    pub total_price: Decimal,

    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

/// The customer an invoice is addressed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,

    pub address: String,

    #[serde(default)]
    pub phone_number: Option<String>,

    #[serde(default)]
    pub email: Option<String>,
}

/// An invoice tagged with the file it was extracted from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedInvoice {
    pub invoice: Invoice,
    pub filename: String,
}

impl ParsedInvoice {
    pub fn new(invoice: Invoice, filename: impl Into<String>) -> Self {
        Self {
            invoice,
            filename: filename.into(),
        }
    }
}
