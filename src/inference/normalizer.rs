//! Conversion of raw model output into a task record.
//!
//! Model output is untrusted: status is always forced to pending and the
//! provenance fields are overwritten with what the caller observed.

use serde_json::{Map, Value};

use crate::models::task::{NewTask, TaskSource, TaskStatus};
use crate::{AppError, Result};

/// Parse `raw_text` into a task attributed to `owner` via `source`.
///
/// - `Ok(Some(task))`: a task was identified.
/// - `Ok(None)`: well-formed output that names no task (`null`, `{}` or a
///   blank title). The message may be marked processed.
/// - `Err(AppError::Malformed)`: output is not task JSON. The message
///   must stay retry-eligible.
///
/// # Errors
///
/// Returns `AppError::Malformed` when `raw_text` is not a JSON object or
/// `null`.
pub fn normalize(raw_text: &str, owner: &str, source: TaskSource) -> Result<Option<NewTask>> {
    let value: Value = serde_json::from_str(strip_code_fence(raw_text))?;

    let fields = match value {
        Value::Object(fields) => fields,
        Value::Null => return Ok(None),
        other => {
            return Err(AppError::Malformed(format!(
                "expected a JSON object, got {}",
                kind(&other)
            )))
        }
    };

    let title = text_field(&fields, "title").unwrap_or_default();
    if title.trim().is_empty() {
        return Ok(None);
    }

    Ok(Some(NewTask {
        title: title.trim().to_owned(),
        description: text_field(&fields, "description").unwrap_or_default(),
        due_date: text_field(&fields, "due_date").filter(|d| !d.trim().is_empty()),
        status: TaskStatus::Pending,
        owner: Some(owner.to_owned()),
        source: Some(source),
    }))
}

/// Read a field as text. Strings pass through; structured values such as
/// a question list are kept as their JSON serialisation.
fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Strip a surrounding markdown code fence, if present.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop an info string such as `json` on the opening line.
    match inner.split_once('\n') {
        Some((info, body)) if !info.trim_start().starts_with('{') => body.trim(),
        _ => inner.trim(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
