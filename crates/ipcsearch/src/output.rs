use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use ipcsearch_proto::{PropertyValue, Variant};
use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One printed result.
pub struct Row {
    /// Absolute index in the full result set.
    pub index: u64,
    pub folder: bool,
    pub values: Vec<PropertyValue>,
}

/// Aggregates printed under the rows.
#[derive(Serialize)]
pub struct Totals {
    pub folders: Option<u64>,
    pub files: Option<u64>,
    pub total_size: Option<u64>,
    pub viewport_offset: u64,
    pub viewport_count: u64,
}

pub fn print_results(labels: &[String], rows: &[Row], totals: &Totals, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let items: Vec<Value> = rows
                .iter()
                .map(|row| {
                    let mut obj = Map::new();
                    obj.insert("index".into(), json!(row.index));
                    obj.insert("folder".into(), json!(row.folder));
                    for (label, value) in labels.iter().zip(&row.values) {
                        obj.insert(label.clone(), value_to_json(value));
                    }
                    Value::Object(obj)
                })
                .collect();
            let out = json!({
                "totals": totals,
                "items": items,
            });
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut header = vec!["#".to_string()];
            header.extend(labels.iter().map(|l| l.to_uppercase()));
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(header);
            for row in rows {
                let mut cells = vec![row.index.to_string()];
                cells.extend(row.values.iter().map(display_plain));
                table.add_row(cells);
            }
            println!("{table}");
            println!("{}", footer(totals));
        }
        OutputFormat::Pretty => {
            for row in rows {
                let kind = if row.folder { "folder" } else { "file" };
                let fields = labels
                    .iter()
                    .zip(&row.values)
                    .map(|(label, value)| format!("{label}={value}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("[{}] {kind} {fields}", row.index);
            }
            println!("{}", footer(totals));
        }
        OutputFormat::Raw => {
            for row in rows {
                let line = row
                    .values
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\t");
                println!("{line}");
            }
        }
    }
}

fn footer(totals: &Totals) -> String {
    let mut parts = Vec::new();
    if let Some(folders) = totals.folders {
        parts.push(format!("{folders} folders"));
    }
    if let Some(files) = totals.files {
        parts.push(format!("{files} files"));
    }
    if let Some(size) = totals.total_size {
        parts.push(format!("{size} bytes"));
    }
    if parts.is_empty() {
        format!("{} results", totals.viewport_count)
    } else {
        parts.join(", ")
    }
}

/// Display text with highlight markers removed.
fn display_plain(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Highlighted(text) => text.plain(),
        other => other.to_string(),
    }
}

pub fn value_to_json(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Empty | PropertyValue::Unknown => Value::Null,
        PropertyValue::Text(s) => json!(s),
        PropertyValue::Highlighted(h) => json!(h.as_str()),
        PropertyValue::Byte(v) => json!(v),
        PropertyValue::Word(v) => json!(v),
        PropertyValue::Dword(v) => json!(v),
        PropertyValue::Uint64(v) | PropertyValue::Size(v) => json!(v),
        PropertyValue::Uint128(v) => json!(v.to_string()),
        PropertyValue::Fixed(v) => json!(v.to_f64()),
        PropertyValue::Dimensions { width, height } => {
            json!({ "width": width, "height": height })
        }
        PropertyValue::Blob(_) => json!(value.to_string()),
        PropertyValue::Variant(v) => variant_to_json(v),
    }
}

fn variant_to_json(variant: &Variant) -> Value {
    match variant {
        Variant::Empty | Variant::Null => Value::Null,
        Variant::U8(v) => json!(v),
        Variant::I8(v) => json!(v),
        Variant::U16(v) => json!(v),
        Variant::I16(v) => json!(v),
        Variant::U32(v) => json!(v),
        Variant::I32(v) => json!(v),
        Variant::U64(v) => json!(v),
        Variant::I64(v) => json!(v),
        Variant::Real(v) | Variant::Currency(v) => json!(v.to_f64()),
        Variant::Bool(v) => json!(v),
        Variant::FileTime(v) => json!(v),
        Variant::Array(items) => Value::Array(items.iter().map(variant_to_json).collect()),
        other => json!(other.to_string()),
    }
}
