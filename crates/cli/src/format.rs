//! Human/json output formatting.
//!
//! Two modes:
//! - **Human** (default): aligned text for terminals
//! - **JSON** (`--json`): `serde_json::to_string_pretty`

use crate::pipeline::{IngestReport, QueryResult};
use annlink_core::{CollectionDescriptor, FieldType};
use serde::Serialize;

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

/// Format an error.
pub fn format_error(err: &dyn std::fmt::Display, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(&serde_json::json!({ "error": err.to_string() })),
        OutputMode::Human => format!("(error) {}", err),
    }
}

/// Format a one-line acknowledgement such as "Dropped collection".
pub fn format_ack(message: &str, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(&serde_json::json!({ "ok": true, "message": message })),
        OutputMode::Human => message.to_string(),
    }
}

/// Format an ingestion report.
pub fn format_ingest(report: &IngestReport, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(report),
        OutputMode::Human => {
            let mut out = format!(
                "Inserted {} of {} images ({} skipped)",
                report.inserted, report.submitted, report.skipped
            );
            out.push_str(&format!("\nCollection now holds {} entities", report.total));
            out
        }
    }
}

/// Format query results, one block per query image.
pub fn format_search(results: &[QueryResult], mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(results),
        OutputMode::Human => {
            if results.is_empty() {
                return "(no query images)".to_string();
            }
            let mut lines = Vec::new();
            for result in results {
                lines.push(format!("{}:", result.query.display()));
                if let Some(reason) = &result.skipped {
                    lines.push(format!("  (skipped: {})", reason));
                    continue;
                }
                if result.matches.is_empty() {
                    lines.push("  (no matches)".to_string());
                }
                for (rank, m) in result.matches.iter().enumerate() {
                    let target = match &m.path {
                        Some(path) => path.display().to_string(),
                        None => m.id.clone(),
                    };
                    lines.push(format!("  {}) {:.6}  {}", rank + 1, m.score, target));
                }
            }
            lines.join("\n")
        }
    }
}

fn field_type_name(field_type: &FieldType) -> String {
    match field_type {
        FieldType::Bool => "bool".to_string(),
        FieldType::Int64 => "int64".to_string(),
        FieldType::Float => "float".to_string(),
        FieldType::Double => "double".to_string(),
        FieldType::VarChar { max_length } => format!("varchar({})", max_length),
        FieldType::Json => "json".to_string(),
        FieldType::FloatVector { dim } => format!("float_vector({})", dim),
        FieldType::BinaryVector { dim } => format!("binary_vector({})", dim),
    }
}

/// Format a collection description.
pub fn format_info(descriptor: &CollectionDescriptor, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(descriptor),
        OutputMode::Human => {
            let mut lines = vec![format!("Collection \"{}\"", descriptor.name)];
            if let Some(rows) = descriptor.row_count {
                lines.push(format!("  entities: {}", rows));
            }
            if let Some(loaded) = descriptor.loaded {
                lines.push(format!("  loaded:   {}", loaded));
            }
            lines.push("  fields:".to_string());
            for field in &descriptor.fields {
                let marker = if field.is_primary { " (primary)" } else { "" };
                lines.push(format!(
                    "    {} {}{}",
                    field.name,
                    field_type_name(&field.field_type),
                    marker
                ));
            }
            if descriptor.indexes.is_empty() {
                lines.push("  indexes: (none)".to_string());
            } else {
                lines.push("  indexes:".to_string());
                for index in &descriptor.indexes {
                    let metric = index
                        .metric_type
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    lines.push(format!(
                        "    {} on {}: {} {}",
                        index.index_name, index.field_name, index.index_type, metric
                    ));
                }
            }
            lines.join("\n")
        }
    }
}
