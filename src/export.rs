use serde_json::Value;

pub const EXPORT_ROW_CAP: usize = 50_000;

pub fn clamp_text(value: &str, max_len: usize, trim: bool) -> String {
    let mut out = if trim {
        value.trim().to_string()
    } else {
        value.to_string()
    };
    out = out
        .chars()
        .filter(|ch| {
            let code = *ch as u32;
            code >= 32 && code != 127
        })
        .collect();
    if out.chars().count() > max_len {
        out = out.chars().take(max_len).collect();
    }
    out
}

pub fn sanitize_filename(value: &str) -> String {
    let mut out = String::new();
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "facilitydesk-export.csv".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn export_filename(value: &str) -> String {
    let safe = sanitize_filename(clamp_text(value, 255, true).as_str());
    if safe.to_lowercase().ends_with(".csv") {
        safe
    } else {
        format!("{safe}.csv")
    }
}

pub fn export_columns(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|entry| clamp_text(cell_text(Some(entry)).as_str(), 80, true))
                .filter(|entry| !entry.is_empty() && entry != "__rowId")
                .collect()
        })
        .unwrap_or_default()
}

/// Spreadsheet formula injection guard: cells starting with `=`, `+`, `-` or
/// `@` get a leading apostrophe.
fn neutralized(value: &str) -> String {
    let trimmed = value.trim_start();
    let dangerous = !trimmed.is_empty()
        && !trimmed.starts_with('\'')
        && matches!(
            trimmed.chars().next(),
            Some('=') | Some('+') | Some('-') | Some('@')
        );
    if dangerous {
        format!("'{value}")
    } else {
        value.to_string()
    }
}

fn escape_cell(value: &str) -> String {
    let safe = neutralized(value);
    if safe.contains(',') || safe.contains('"') || safe.contains('\n') || safe.contains('\r') {
        format!("\"{}\"", safe.replace('"', "\"\""))
    } else {
        safe
    }
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::Null) | None => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(boolean)) => boolean.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|entry| cell_text(Some(entry)))
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
    }
}

pub fn rows_to_csv(columns: &[String], rows: &[Value]) -> String {
    let mut lines: Vec<String> = Vec::new();
    if !columns.is_empty() {
        lines.push(
            columns
                .iter()
                .map(|col| escape_cell(col.as_str()))
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    for row in rows {
        let line = columns
            .iter()
            .map(|column| {
                let value = row.as_object().and_then(|obj| obj.get(column));
                escape_cell(cell_text(value).as_str())
            })
            .collect::<Vec<_>>()
            .join(",");
        lines.push(line);
    }
    lines.join("\n")
}
