//! Schema descriptor sent to the extraction model, and validation of its output.
//!
//! The descriptor mirrors the serde records in [`crate::models::invoice`]:
//! the model is told which fields exist and which are required, and the
//! answer is validated by deserializing into those records.

use serde_json::{Map, Value, json};

use crate::error::ExtractionError;
use crate::models::invoice::Invoice;

/// Primitive or nested kind of a schema field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Number,
    /// Nested object with its own fields.
    Object(Vec<FieldSpec>),
    /// List of objects sharing one set of fields.
    ObjectArray(Vec<FieldSpec>),
}

/// One field of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub description: &'static str,
}

impl FieldSpec {
    fn required(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
        }
    }

    fn optional(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
        }
    }
}

/// Typed description of the record shape the model must return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    pub name: &'static str,
    pub fields: Vec<FieldSpec>,
}

fn item_fields() -> Vec<FieldSpec> {
    use FieldKind::*;
    vec![
        FieldSpec::required("item_name", String, "The name of the item"),
        FieldSpec::required("quantity", Integer, "The quantity of the item"),
        FieldSpec::required("unit_price", Number, "The unit price of the item"),
        FieldSpec::required("total_price", Number, "The total price of the item"),
        FieldSpec::optional("description", String, "Description of the item"),
    ]
}

fn customer_fields() -> Vec<FieldSpec> {
    use FieldKind::*;
    vec![
        FieldSpec::required("name", String, "The name of the customer"),
        FieldSpec::required("address", String, "The address of the customer"),
        FieldSpec::optional("phone_number", String, "The phone number of the customer"),
        FieldSpec::optional("email", String, "The email of the customer"),
    ]
}

fn invoice_fields() -> Vec<FieldSpec> {
    use FieldKind::*;
    vec![
        FieldSpec::required("company_name", String, "The name of the company"),
        FieldSpec::required("company_address", String, "The address of the company"),
        FieldSpec::required("invoice_number", String, "The invoice number"),
        FieldSpec::optional("invoice_date", String, "The date of the invoice"),
        FieldSpec::required(
            "bill_to",
            String,
            "The name of the person and address to bill to",
        ),
        FieldSpec::optional(
            "ship_to",
            String,
            "The name of the person and address to ship to",
        ),
        FieldSpec::required("sub_total", Number, "The subtotal amount of the invoice"),
        FieldSpec::required("tax", Number, "The tax amount"),
        FieldSpec::required("total_amount", Number, "The total amount of the invoice"),
        FieldSpec::optional("due_date", String, "Due date for payment"),
        FieldSpec::required(
            "items",
            ObjectArray(item_fields()),
            "List of items in the invoice",
        ),
        FieldSpec::required("customer", Object(customer_fields()), "Customer information"),
    ]
}

impl SchemaDescriptor {
    /// Descriptor for [`Invoice`].
    pub fn invoice() -> Self {
        Self {
            name: "Invoice",
            fields: invoice_fields(),
        }
    }

    /// Names of the required top-level fields, in declaration order.
    pub fn required_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect()
    }

    /// Render as the OpenAPI-style schema accepted by `generationConfig.responseSchema`.
    pub fn to_response_schema(&self) -> Value {
        render_object(&self.fields)
    }
}

fn render_object(fields: &[FieldSpec]) -> Value {
    let mut properties = Map::new();
    for field in fields {
        properties.insert(field.name.to_string(), render_field(field));
    }

    let required: Vec<&str> = fields.iter().filter(|f| f.required).map(|f| f.name).collect();
    let ordering: Vec<&str> = fields.iter().map(|f| f.name).collect();

    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": required,
        "propertyOrdering": ordering,
    })
}

fn render_field(field: &FieldSpec) -> Value {
    let mut value = match &field.kind {
        FieldKind::String => json!({ "type": "STRING" }),
        FieldKind::Integer => json!({ "type": "INTEGER" }),
        FieldKind::Number => json!({ "type": "NUMBER" }),
        FieldKind::Object(fields) => render_object(fields),
        FieldKind::ObjectArray(fields) => json!({
            "type": "ARRAY",
            "items": render_object(fields),
        }),
    };

    if let Some(obj) = value.as_object_mut() {
        obj.insert("description".to_string(), json!(field.description));
        if !field.required {
            obj.insert("nullable".to_string(), json!(true));
        }
    }

    value
}

/// Validate the model's text output against the invoice schema.
///
/// Markdown fences and text before the first JSON object are skipped. Only the
/// first complete object is read, so anything after it is ignored.
pub fn validate_invoice(raw: &str) -> Result<Invoice, ExtractionError> {
    let start = raw
        .find('{')
        .ok_or_else(|| ExtractionError::Validation("no JSON object in model output".into()))?;

    serde_json::Deserializer::from_str(&raw[start..])
        .into_iter::<Invoice>()
        .next()
        .ok_or_else(|| ExtractionError::Validation("no JSON object in model output".into()))?
        .map_err(|e| ExtractionError::Validation(e.to_string()))
}
