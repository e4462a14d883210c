//! Parse command - run one batch from the terminal and print the derived tables.

use std::io;
use std::path::PathBuf;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use invex_core::tables::{TableRow, render_csv, render_text};
use invex_core::upload::ACCEPTED_EXTENSIONS;
use invex_core::{BatchObserver, DerivedTables, FileOutcome, GeminiExtractor, MessageLevel, Session};

use super::load_config;

/// Arguments for the parse command.
#[derive(Args)]
pub struct ParseArgs {
    /// Input image files or glob patterns
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Which derived table to print
    #[arg(short, long, value_enum, default_value = "all")]
    table: TableChoice,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Aligned text tables
    Table,
    /// JSON output
    Json,
    /// CSV output (single table only)
    Csv,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum TableChoice {
    All,
    Invoices,
    Items,
    Customers,
}

/// Drives the progress bar from batch events.
struct ProgressObserver {
    pb: ProgressBar,
}

impl BatchObserver for ProgressObserver {
    fn on_file_start(&mut self, _index: usize, _total: usize, filename: &str) {
        self.pb.set_message(format!("Processing file: {}", filename));
    }

    fn on_file_done(&mut self, outcome: &FileOutcome) {
        if let FileOutcome::Parsed { invoice_number, .. } = outcome {
            debug!("Parsed invoice {} from {}", invoice_number, outcome.filename());
        }
        self.pb.inc(1);
    }
}

pub async fn run(args: ParseArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    if args.format == OutputFormat::Csv && args.table == TableChoice::All {
        anyhow::bail!("CSV output needs a single table, e.g. --table items");
    }

    let files = expand_inputs(&args.inputs)?;
    if files.is_empty() {
        anyhow::bail!("No matching files found for: {}", args.inputs.join(" "));
    }

    let extractor = GeminiExtractor::from_env(&config.extraction)?;

    eprintln!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );
    let mut observer = ProgressObserver { pb: pb.clone() };

    let mut session = Session::new().with_max_image_bytes(config.extraction.max_image_bytes);
    let report = session
        .parse_paths(&extractor, &files, &mut observer)
        .await;
    pb.finish_and_clear();

    for message in report.messages() {
        match message.level {
            MessageLevel::Error => {
                eprintln!("{} {}", style("✗").red(), message.text);
            }
            MessageLevel::Success => {
                eprintln!("{} {}", style("✓").green(), message.text);
            }
        }
    }
    eprintln!(
        "   {} successful, {} failed in {}ms",
        style(report.success_count()).green(),
        style(report.failure_count()).red(),
        report.elapsed_ms
    );

    let Some(tables) = session.visible_tables() else {
        eprintln!("{} No invoices were parsed.", style("ℹ").blue());
        return Ok(());
    };

    match args.format {
        OutputFormat::Table => print!("{}", format_text(tables, args.table)),
        OutputFormat::Json => println!("{}", format_json(tables, args.table)?),
        OutputFormat::Csv => write_csv(tables, args.table, io::stdout().lock())?,
    }

    Ok(())
}

/// Expand glob patterns and keep literal paths as given.
///
/// Glob matches are filtered to accepted image extensions; literal paths
/// are passed through so that rejected files are reported by name.
fn expand_inputs(inputs: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if !input.contains(['*', '?', '[']) {
            files.push(PathBuf::from(input));
            continue;
        }

        let matches = glob(input)?.filter_map(|r| r.ok()).filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            ACCEPTED_EXTENSIONS.contains(&ext.to_lowercase().as_str())
        });
        files.extend(matches);
    }

    Ok(files)
}

fn section<R: TableRow>(title: &str, rows: &[R]) -> String {
    format!(
        "{}\n{}\n",
        style(title).bold().underlined(),
        render_text(rows)
    )
}

fn format_text(tables: &DerivedTables, choice: TableChoice) -> String {
    let mut output = String::new();

    if matches!(choice, TableChoice::All | TableChoice::Invoices) {
        output.push_str(&section("Parsed Invoices", &tables.invoices));
    }
    if matches!(choice, TableChoice::All | TableChoice::Items) {
        output.push_str(&section("Invoice Items", &tables.items));
    }
    if matches!(choice, TableChoice::All | TableChoice::Customers) {
        output.push_str(&section("Customers", &tables.customers));
    }

    output
}

fn format_json(tables: &DerivedTables, choice: TableChoice) -> anyhow::Result<String> {
    let json = match choice {
        TableChoice::All => serde_json::to_string_pretty(tables)?,
        TableChoice::Invoices => serde_json::to_string_pretty(&tables.invoices)?,
        TableChoice::Items => serde_json::to_string_pretty(&tables.items)?,
        TableChoice::Customers => serde_json::to_string_pretty(&tables.customers)?,
    };
    Ok(json)
}

fn write_csv<W: io::Write>(
    tables: &DerivedTables,
    choice: TableChoice,
    writer: W,
) -> anyhow::Result<()> {
    match choice {
        TableChoice::Invoices => render_csv(&tables.invoices, writer)?,
        TableChoice::Items => render_csv(&tables.items, writer)?,
        TableChoice::Customers => render_csv(&tables.customers, writer)?,
        TableChoice::All => anyhow::bail!("CSV output needs a single table"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use invex_core::{Invoice, ParsedInvoice, reshape};

    fn sample_tables() -> DerivedTables {
        let invoice: Invoice = serde_json::from_str(
            r#"{
                "company_name": "Acme", "company_address": "1 Main St",
                "invoice_number": "INV-7", "bill_to": "Bob",
                "sub_total": "10.00", "tax": "1.00", "total_amount": "11.00",
                "items": [
                    {"item_name": "Bolt", "quantity": 4, "unit_price": "2.50", "total_price": "10.00"}
                ],
                "customer": {"name": "Bob", "address": "2 Side St"}
            }"#,
        )
        .unwrap();
        reshape(&[ParsedInvoice::new(invoice, "scan.png")])
    }

    #[test]
    fn test_expand_inputs_keeps_literals() {
        let files = expand_inputs(&["a.png".to_string(), "notes.txt".to_string()]).unwrap();
        assert_eq!(files, vec![PathBuf::from("a.png"), PathBuf::from("notes.txt")]);
    }

    #[test]
    fn test_expand_inputs_filters_glob_matches() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.JPG", "c.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let pattern = format!("{}/*", dir.path().display());
        let mut files = expand_inputs(&[pattern]).unwrap();
        files.sort();

        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.JPG"]);
    }

    #[test]
    fn test_csv_single_table() {
        let tables = sample_tables();
        let mut out = Vec::new();
        write_csv(&tables, TableChoice::Customers, &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "name,address,phone_number,email,invoice_number,filename\n\
             Bob,2 Side St,,,INV-7,scan.png\n"
        );
        assert!(write_csv(&tables, TableChoice::All, Vec::new()).is_err());
    }

    #[test]
    fn test_json_selection() {
        let tables = sample_tables();
        let items: serde_json::Value =
            serde_json::from_str(&format_json(&tables, TableChoice::Items).unwrap()).unwrap();
        assert_eq!(items[0]["item_name"], "Bolt");
        assert_eq!(items[0]["invoice_number"], "INV-7");

        let all: serde_json::Value =
            serde_json::from_str(&format_json(&tables, TableChoice::All).unwrap()).unwrap();
        assert_eq!(all["customers"][0]["filename"], "scan.png");
    }

    #[test]
    fn test_text_selection() {
        let tables = sample_tables();
        let text = format_text(&tables, TableChoice::Items);
        assert!(text.contains("Invoice Items"));
        assert!(text.contains("Bolt"));
        assert!(!text.contains("Customers"));
    }
}
