//! Schema command - show the record shape requested from the model.

use clap::Args;

use invex_core::schema::{FieldKind, FieldSpec, SchemaDescriptor};

/// Arguments for the schema command.
#[derive(Args)]
pub struct SchemaArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: SchemaFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum SchemaFormat {
    /// Response schema as sent to the model
    Json,
    /// Indented field list
    Text,
}

pub fn run(args: SchemaArgs) -> anyhow::Result<()> {
    let schema = SchemaDescriptor::invoice();

    match args.format {
        SchemaFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&schema.to_response_schema())?);
        }
        SchemaFormat::Text => {
            println!("{}", schema.name);
            print!("{}", format_fields(&schema.fields, 1));
        }
    }

    Ok(())
}

fn format_fields(fields: &[FieldSpec], depth: usize) -> String {
    let indent = "  ".repeat(depth);
    let mut output = String::new();

    for field in fields {
        let (kind, nested) = match &field.kind {
            FieldKind::String => ("string", None),
            FieldKind::Integer => ("integer", None),
            FieldKind::Number => ("number", None),
            FieldKind::Object(inner) => ("object", Some(inner)),
            FieldKind::ObjectArray(inner) => ("list", Some(inner)),
        };
        let marker = if field.required { "" } else { "?" };

        output.push_str(&format!(
            "{}{}{}: {}  # {}\n",
            indent, field.name, marker, kind, field.description
        ));

        if let Some(inner) = nested {
            output.push_str(&format_fields(inner, depth + 1));
        }
    }

    output
}
