//! Server-rendered HTML for the upload page.

use invex_core::tables::TableRow;
use invex_core::{MessageLevel, Session};

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 2rem auto; max-width: 1100px; color: #222; }
h1 { margin-bottom: 0.2rem; }
form { margin: 1rem 0; }
button { padding: 0.4rem 1rem; font-size: 1rem; }
.msg { padding: 0.5rem 0.8rem; margin: 0.4rem 0; border-radius: 4px; }
.msg.error { background: #fde2e1; color: #8a1c17; }
.msg.success { background: #e0f5e4; color: #1d5e2b; }
.meta { color: #666; font-size: 0.85rem; }
.tabs > input { display: none; }
.tabs > label { display: inline-block; padding: 0.4rem 1rem; cursor: pointer; border-bottom: 2px solid transparent; }
.tabs > input:checked + label { border-bottom-color: #d33; font-weight: bold; }
.panel { display: none; overflow-x: auto; }
#tab-invoices:checked ~ #panel-invoices,
#tab-items:checked ~ #panel-items,
#tab-customers:checked ~ #panel-customers { display: block; }
table { border-collapse: collapse; margin-top: 0.6rem; font-size: 0.9rem; }
th, td { border: 1px solid #ddd; padding: 0.3rem 0.6rem; text-align: left; }
th { background: #f4f4f4; }
"#;

const UPLOAD_FORM: &str = r#"<form action="/parse" method="post" enctype="multipart/form-data">
<p>Upload invoice images</p>
<input type="file" name="files" multiple accept=".jpg,.jpeg,.png">
<button type="submit">🎯 Parse Invoices</button>
</form>
<form action="/reset" method="post"><button type="submit">Clear</button></form>
"#;

/// Escape text for use inside HTML element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_table<R: TableRow>(rows: &[R]) -> String {
    let mut html = String::from("<table>\n<thead><tr>");
    for column in R::COLUMNS {
        html.push_str(&format!("<th>{}</th>", escape(column)));
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    for row in rows {
        html.push_str("<tr>");
        for cell in row.cells() {
            html.push_str(&format!("<td>{}</td>", escape(&cell)));
        }
        html.push_str("</tr>\n");
    }

    html.push_str("</tbody>\n</table>\n");
    html
}

fn render_messages(session: &Session) -> String {
    let Some(report) = session.last_report() else {
        return String::new();
    };

    let mut html = String::new();
    for message in report.messages() {
        let class = match message.level {
            MessageLevel::Error => "error",
            MessageLevel::Success => "success",
        };
        html.push_str(&format!(
            "<div class=\"msg {}\">{}</div>\n",
            class,
            escape(&message.text)
        ));
    }
    html.push_str(&format!(
        "<p class=\"meta\">Last run {} ({} ms)</p>\n",
        report.finished_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.elapsed_ms
    ));
    html
}

fn render_results(session: &Session) -> String {
    let Some(tables) = session.visible_tables() else {
        return String::new();
    };

    let panels = [
        ("invoices", "Parsed Invoices", render_table(&tables.invoices)),
        ("items", "Invoice Items", render_table(&tables.items)),
        ("customers", "Customers", render_table(&tables.customers)),
    ];

    let mut html = String::from("<div class=\"tabs\">\n");
    for (i, (id, title, _)) in panels.iter().enumerate() {
        let checked = if i == 0 { " checked" } else { "" };
        html.push_str(&format!(
            "<input type=\"radio\" name=\"tab\" id=\"tab-{id}\"{checked}><label for=\"tab-{id}\">{title}</label>\n"
        ));
    }
    for (id, title, table) in &panels {
        html.push_str(&format!(
            "<section class=\"panel\" id=\"panel-{id}\">\n<h2>{title}</h2>\n{table}</section>\n"
        ));
    }
    html.push_str("</div>\n");
    html
}

/// Render the full page for a session.
pub fn render(session: &Session) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Invoice Parsing</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <h1>Invoice Parsing</h1>\n{UPLOAD_FORM}{}{}</body>\n</html>\n",
        render_messages(session),
        render_results(session),
    )
}
