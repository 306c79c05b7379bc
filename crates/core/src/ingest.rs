//! Turns the JSON produced by the analysis step into a [`Record`].

use serde_json::{Map, Value};

use crate::domain::Record;
use crate::error::InsightError;
use crate::ports::Result;
use crate::utils::{bullet_list, capture_timestamp};

/// Parses a pasted analysis, stamping it with the current local time
pub fn parse_analysis(input: &str) -> Result<Record> {
    parse_analysis_at(input, capture_timestamp())
}

/// Parses a pasted analysis with an explicit `collected_at` value.
///
/// Every key is optional and defaults to an empty string. Lists are
/// flattened into a "- " bulleted block. Anything other than a JSON
/// object is rejected.
pub fn parse_analysis_at(input: &str, collected_at: String) -> Result<Record> {
    let value: Value = serde_json::from_str(input)
        .map_err(|e| InsightError::MalformedInput(e.to_string()))?;

    let object = match value {
        Value::Object(map) => map,
        other => {
            return Err(InsightError::MalformedInput(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            )))
        }
    };

    let field = |key: &str| text_field(&object, key);

    Ok(Record {
        collected_at,
        published_at: field("published_at"),
        video_id: field("video_id"),
        title: field("title"),
        channel_name: field("channel_name"),
        main_topic: field("main_topic"),
        key_arguments: field("key_arguments"),
        evidence: field("evidence"),
        implications: field("implications"),
        validity_check: field("validity_check"),
        sentiment: field("sentiment"),
        full_summary: field("full_summary"),
        tags: field("tags"),
        url: field("url"),
    })
}

fn text_field(object: &Map<String, Value>, key: &str) -> String {
    object.get(key).map(value_to_text).unwrap_or_default()
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(value_to_text).collect();
            bullet_list(&items)
        }
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
