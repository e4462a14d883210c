//! Flattening of a parsed batch into invoice, item and customer tables.
//!
//! Each row type is a projection of the typed source records. Item and
//! customer rows carry the parent invoice number and filename as a
//! denormalized foreign key. Rows keep input order; nothing is sorted,
//! aggregated or deduplicated.

use std::io::Write;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::invoice::{Customer, Invoice, Item, ParsedInvoice};

/// A row type with a fixed column list.
pub trait TableRow {
    /// Column names, in display order.
    const COLUMNS: &'static [&'static str];

    /// Cell values rendered for display, one per column.
    fn cells(&self) -> Vec<String>;
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

/// One row of the invoices table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceRow {
    pub company_name: String,
    pub company_address: String,
    pub invoice_number: String,
    pub invoice_date: Option<String>,
    pub bill_to: String,
    pub ship_to: Option<String>,
    pub sub_total: Decimal,
    pub tax: Decimal,
    pub total_amount: Decimal,
    pub due_date: Option<String>,
    pub filename: String,
}

impl InvoiceRow {
    /// All invoice fields except items and customer, plus the filename.
    pub fn project(invoice: &Invoice, filename: &str) -> Self {
        Self {
            company_name: invoice.company_name.clone(),
            company_address: invoice.company_address.clone(),
            invoice_number: invoice.invoice_number.clone(),
            invoice_date: invoice.invoice_date.clone(),
            bill_to: invoice.bill_to.clone(),
            ship_to: invoice.ship_to.clone(),
            sub_total: invoice.sub_total,
            tax: invoice.tax,
            total_amount: invoice.total_amount,
            due_date: invoice.due_date.clone(),
            filename: filename.to_string(),
        }
    }
}

impl TableRow for InvoiceRow {
    const COLUMNS: &'static [&'static str] = &[
        "company_name",
        "company_address",
        "invoice_number",
        "invoice_date",
        "bill_to",
        "ship_to",
        "sub_total",
        "tax",
        "total_amount",
        "due_date",
        "filename",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.company_name.clone(),
            self.company_address.clone(),
            self.invoice_number.clone(),
            opt(&self.invoice_date),
            self.bill_to.clone(),
            opt(&self.ship_to),
            self.sub_total.to_string(),
            self.tax.to_string(),
            self.total_amount.to_string(),
            opt(&self.due_date),
            self.filename.clone(),
        ]
    }
}

/// One row of the items table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemRow {
    pub item_name: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub description: Option<String>,
    pub invoice_number: String,
    pub filename: String,
}

impl ItemRow {
    pub fn project(item: &Item, invoice_number: &str, filename: &str) -> Self {
        Self {
            item_name: item.item_name.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            total_price: item.total_price,
            description: item.description.clone(),
            invoice_number: invoice_number.to_string(),
            filename: filename.to_string(),
        }
    }
}

impl TableRow for ItemRow {
    const COLUMNS: &'static [&'static str] = &[
        "item_name",
        "quantity",
        "unit_price",
        "total_price",
        "description",
        "invoice_number",
        "filename",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.item_name.clone(),
            self.quantity.to_string(),
            self.unit_price.to_string(),
            self.total_price.to_string(),
            opt(&self.description),
            self.invoice_number.clone(),
            self.filename.clone(),
        ]
    }
}

/// One row of the customers table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRow {
    pub name: String,
    pub address: String,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub invoice_number: String,
    pub filename: String,
}

impl CustomerRow {
    pub fn project(customer: &Customer, invoice_number: &str, filename: &str) -> Self {
        Self {
            name: customer.name.clone(),
            address: customer.address.clone(),
            phone_number: customer.phone_number.clone(),
            email: customer.email.clone(),
            invoice_number: invoice_number.to_string(),
            filename: filename.to_string(),
        }
    }
}

impl TableRow for CustomerRow {
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "address",
        "phone_number",
        "email",
        "invoice_number",
        "filename",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.address.clone(),
            opt(&self.phone_number),
            opt(&self.email),
            self.invoice_number.clone(),
            self.filename.clone(),
        ]
    }
}

/// The three tables derived from one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedTables {
    pub invoices: Vec<InvoiceRow>,
    pub items: Vec<ItemRow>,
    pub customers: Vec<CustomerRow>,
}

impl DerivedTables {
    /// True when no invoice rows are present.
    pub fn is_empty(&self) -> bool {
        self.invoices.is_empty()
    }

    /// Row counts as (invoices, items, customers).
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.invoices.len(), self.items.len(), self.customers.len())
    }
}

/// Flatten a batch into the three derived tables.
pub fn reshape(batch: &[ParsedInvoice]) -> DerivedTables {
    let mut tables = DerivedTables::default();

    for parsed in batch {
        let invoice = &parsed.invoice;
        let filename = parsed.filename.as_str();

        tables.invoices.push(InvoiceRow::project(invoice, filename));
        tables.items.extend(
            invoice
                .items
                .iter()
                .map(|item| ItemRow::project(item, &invoice.invoice_number, filename)),
        );
        tables.customers.push(CustomerRow::project(
            &invoice.customer,
            &invoice.invoice_number,
            filename,
        ));
    }

    tables
}

/// Render rows as an aligned plain-text table.
pub fn render_text<R: TableRow>(rows: &[R]) -> String {
    let cells: Vec<Vec<String>> = rows.iter().map(|r| r.cells()).collect();

    let mut widths: Vec<usize> = R::COLUMNS.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_line = |values: Vec<&str>| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut output = String::new();
    output.push_str(&format_line(R::COLUMNS.to_vec()));
    output.push('\n');
    output.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    output.push('\n');

    for row in &cells {
        output.push_str(&format_line(row.iter().map(String::as_str).collect()));
        output.push('\n');
    }

    output
}

/// Write rows as CSV with a header line.
pub fn render_csv<R: TableRow, W: Write>(rows: &[R], writer: W) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    wtr.write_record(R::COLUMNS)?;
    for row in rows {
        wtr.write_record(row.cells())?;
    }

    wtr.flush()?;
    Ok(())
}
