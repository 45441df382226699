// Renders ranked views. Exporters only serialize: ranks, times and deltas are
// taken as they come out of the ranking.

use lap_ranking::{RankedEntry, Scope};
use printpdf::{BuiltinFont, Mm, PdfDocument};
use serde_json::json;
use serde_json::Value as JSValue;
use snafu::prelude::*;

use crate::board::*;

// `position` is what `delete` expects: tied records share a rank but never
// a position.
pub const EXPORT_COLUMNS: [&str; 10] = [
    "position",
    "rank",
    "name",
    "class",
    "lap_number",
    "lap_time",
    "bonus_time",
    "penalty_time",
    "total_time",
    "delta",
];

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ExportFormat {
    Text,
    Csv,
    Html,
    Markdown,
    Json,
    Pdf,
}

impl ExportFormat {
    pub fn parse(s: &str) -> BoardResult<ExportFormat> {
        match s.trim().to_lowercase().as_str() {
            "text" | "txt" => Ok(ExportFormat::Text),
            "csv" => Ok(ExportFormat::Csv),
            "html" => Ok(ExportFormat::Html),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "json" => Ok(ExportFormat::Json),
            "pdf" => Ok(ExportFormat::Pdf),
            _ => UnknownFormatSnafu { format: s }.fail(),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Csv => "csv",
            ExportFormat::Html => "html",
            ExportFormat::Markdown => "md",
            ExportFormat::Json => "json",
            ExportFormat::Pdf => "pdf",
        }
    }
}

fn entry_cells(e: &RankedEntry) -> [String; 10] {
    [
        e.position.to_string(),
        e.rank.to_string(),
        e.record.name.clone(),
        e.record.class_name.clone(),
        e.record.lap_number.to_string(),
        e.record.lap_time.to_string(),
        e.record.bonus_time.to_string(),
        e.record.penalty_time.to_string(),
        e.record.total_time.to_string(),
        e.delta.to_string(),
    ]
}

fn heading(title: &str, scope: &Scope) -> String {
    match scope {
        Scope::All => title.to_string(),
        Scope::Class(c) => format!("{} (class {})", title, c),
    }
}

/// The bytes of the rendering. All the formats but PDF are UTF-8 text.
pub fn render(
    format: ExportFormat,
    title: &str,
    scope: &Scope,
    entries: &[RankedEntry],
) -> BoardResult<Vec<u8>> {
    match format {
        ExportFormat::Text => Ok(render_text(title, scope, entries).into_bytes()),
        ExportFormat::Csv => render_csv(entries).map(String::into_bytes),
        ExportFormat::Html => Ok(render_html(title, scope, entries).into_bytes()),
        ExportFormat::Markdown => Ok(render_markdown(title, scope, entries).into_bytes()),
        ExportFormat::Json => Ok(render_json(title, scope, entries).into_bytes()),
        ExportFormat::Pdf => render_pdf(title, scope, entries),
    }
}

fn text_lines(title: &str, scope: &Scope, entries: &[RankedEntry]) -> Vec<String> {
    let mut out = vec![heading(title, scope), String::new()];
    if entries.is_empty() {
        out.push("No records.".to_string());
        return out;
    }
    let rows: Vec<[String; 10]> = entries.iter().map(entry_cells).collect();
    let mut widths: Vec<usize> = EXPORT_COLUMNS.iter().map(|c| c.chars().count()).collect();
    for row in rows.iter() {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }
    let line = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths.iter())
            .map(|(c, w)| format!("{}{}", c, " ".repeat(w - c.chars().count())))
            .collect();
        padded.join("  ").trim_end().to_string()
    };
    out.push(line(EXPORT_COLUMNS.to_vec()));
    for row in rows.iter() {
        out.push(line(row.iter().map(|s| s.as_str()).collect()));
    }
    out
}

fn render_text(title: &str, scope: &Scope, entries: &[RankedEntry]) -> String {
    let mut out = String::new();
    for l in text_lines(title, scope, entries) {
        out.push_str(&l);
        out.push('\n');
    }
    out
}

const PDF_LINES_PER_PAGE: usize = 40;

// The text layout in a fixed-width font, on landscape A4 pages. The builtin
// fonts only cover Latin-1: other characters do not render.
fn render_pdf(title: &str, scope: &Scope, entries: &[RankedEntry]) -> BoardResult<Vec<u8>> {
    let lines = text_lines(title, scope, entries);
    let (doc, first_page, first_layer) =
        PdfDocument::new(heading(title, scope), Mm(297.0), Mm(210.0), "Layer 1".to_string());
    let font = match doc.add_builtin_font(BuiltinFont::Courier) {
        Ok(f) => f,
        Err(e) => whatever!("Error loading the PDF font: {:?}", e),
    };
    for (page_idx, chunk) in lines.chunks(PDF_LINES_PER_PAGE).enumerate() {
        let (page, layer) = if page_idx == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(Mm(297.0), Mm(210.0), "Layer 1".to_string())
        };
        let current = doc.get_page(page).get_layer(layer);
        let mut y = 195.0;
        for l in chunk {
            current.use_text(l.as_str(), 9.0, Mm(12.0), Mm(y), &font);
            y -= 4.5;
        }
    }
    match doc.save_to_bytes() {
        Ok(bytes) => Ok(bytes),
        Err(e) => whatever!("Error writing the PDF: {:?}", e),
    }
}

fn render_csv(entries: &[RankedEntry]) -> BoardResult<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(EXPORT_COLUMNS)
        .context(RenderingCsvSnafu {})?;
    for e in entries {
        wtr.write_record(entry_cells(e))
            .context(RenderingCsvSnafu {})?;
    }
    let data = wtr
        .into_inner()
        .map_err(|e| e.into_error())
        .context(RenderingSnafu {})?;
    String::from_utf8(data).whatever_context("The rendered CSV is not valid UTF-8")
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn render_html(title: &str, scope: &Scope, entries: &[RankedEntry]) -> String {
    let heading = escape_html(&heading(title, scope));
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!("<title>{}</title>\n</head>\n<body>\n", heading));
    out.push_str(&format!("<h1>{}</h1>\n<table border=\"1\">\n<thead>\n<tr>", heading));
    for c in EXPORT_COLUMNS {
        out.push_str(&format!("<th>{}</th>", c));
    }
    out.push_str("</tr>\n</thead>\n<tbody>\n");
    for e in entries {
        out.push_str("<tr>");
        for cell in entry_cells(e).iter() {
            out.push_str(&format!("<td>{}</td>", escape_html(cell)));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody>\n</table>\n</body>\n</html>\n");
    out
}

fn escape_markdown(s: &str) -> String {
    s.replace('\\', "\\\\").replace('|', "\\|")
}

fn render_markdown(title: &str, scope: &Scope, entries: &[RankedEntry]) -> String {
    let mut out = format!("# {}\n\n", escape_markdown(&heading(title, scope)));
    out.push_str(&format!("| {} |\n", EXPORT_COLUMNS.join(" | ")));
    out.push_str(&format!(
        "|{}\n",
        EXPORT_COLUMNS.iter().map(|_| "---|").collect::<String>()
    ));
    for e in entries {
        let cells: Vec<String> = entry_cells(e).iter().map(|c| escape_markdown(c)).collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out
}

fn render_json(title: &str, scope: &Scope, entries: &[RankedEntry]) -> String {
    let js_entries: Vec<JSValue> = entries
        .iter()
        .map(|e| {
            json!({
                "position": e.position,
                "rank": e.rank,
                "name": e.record.name,
                "class": e.record.class_name,
                "lapNumber": e.record.lap_number,
                "lapTime": e.record.lap_time.to_string(),
                "bonusTime": e.record.bonus_time.to_string(),
                "penaltyTime": e.record.penalty_time.to_string(),
                "totalTime": e.record.total_time.to_string(),
                "totalTimeMs": e.record.total_time.millis(),
                "delta": e.delta.to_string(),
            })
        })
        .collect();
    let js = json!({
        "title": title,
        "scope": scope.to_string(),
        "entries": js_entries,
    });
    // Serializing a Value cannot fail.
    format!("{:#}\n", js)
}
