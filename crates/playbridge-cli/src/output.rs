//! Output formatting for CLI

use console::style;
use playbridge_core::{SessionId, StreamItem};
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

/// Format output based on selected format
pub fn format_output<T: Serialize>(data: &T, format: &str) -> String {
    match OutputFormat::from(format) {
        OutputFormat::Json => {
            serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table | OutputFormat::Text => {
            serde_json::to_string(data).unwrap_or_else(|_| "{}".to_string())
        }
    }
}

/// One classified locator
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct ClassifyRow {
    pub locator: String,
    pub content_type: String,
    pub access: String,
}

pub fn print_classification(rows: &[ClassifyRow], format: &str) {
    match OutputFormat::from(format) {
        OutputFormat::Table => println!("{}", Table::new(rows)),
        OutputFormat::Json => println!("{}", format_output(&rows, "json")),
        OutputFormat::Text => {
            for row in rows {
                println!("{:<48} {:<18} {}", row.locator, row.content_type, row.access);
            }
        }
    }
}

/// Render one item of a session's event stream
pub fn format_stream_item(id: SessionId, item: &StreamItem, format: &str) -> String {
    let wire = item.to_wire();
    if OutputFormat::from(format) == OutputFormat::Json {
        return serde_json::json!({ "textureId": id.0, "item": wire }).to_string();
    }

    let label = match item {
        StreamItem::Event(event) => match event.name() {
            "error" => style(event.name()).red().bold(),
            "completed" => style(event.name()).green(),
            "initialized" => style(event.name()).cyan().bold(),
            name => style(name).dim(),
        },
        StreamItem::EndOfStream => style("endOfStream").yellow(),
    };
    format!("[{}] {:<16} {}", id, label, wire)
}
