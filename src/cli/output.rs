//! Output formatting for CLI commands.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::cli::args::{NearbyArgs, OutputFormat};

/// Result of a `provision` run.
#[derive(Debug, Serialize)]
pub struct ProvisionResult {
    pub collections: Vec<String>,
}

/// Result of a search or cluster query.
#[derive(Debug, Serialize)]
pub struct RecordList<T: Serialize> {
    pub total: usize,
    pub records: Vec<T>,
}

/// Output a result in the selected format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &NearbyArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

fn output_json<T: Serialize>(result: &T, args: &NearbyArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{json}");
    Ok(())
}

fn output_human<T: Serialize>(message: &str, result: &T, args: &NearbyArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
    }

    let value = serde_json::to_value(result)?;
    match value.get("records").and_then(Value::as_array) {
        Some(records) => output_records_human(records),
        None => output_generic_human(&value),
    }
    Ok(())
}

fn output_records_human(records: &[Value]) {
    if records.is_empty() {
        println!("No posts found.");
        return;
    }

    for (i, record) in records.iter().enumerate() {
        println!();
        println!("Post {}: {}", i + 1, field(record, "id"));
        println!("─────────────");
        println!("user:     {}", field(record, "user"));
        if let Some(location) = record.get("location") {
            println!(
                "location: {}, {}",
                location.get("lat").map(format_value).unwrap_or_default(),
                location.get("lon").map(format_value).unwrap_or_default()
            );
        }
        println!("type:     {}", field(record, "type"));
        println!("face:     {}", field(record, "face"));
        let url = field(record, "url");
        if !url.is_empty() {
            println!("url:      {url}");
        }
        let message = field(record, "message");
        if !message.is_empty() {
            println!("message:  {message}");
        }
    }

    println!();
    println!("Total posts: {}", records.len());
}

fn output_generic_human(value: &Value) {
    match value {
        Value::Object(obj) => {
            for (key, val) in obj {
                println!("{key}: {}", format_value(val));
            }
        }
        other => println!("{}", format_value(other)),
    }
}

fn field(record: &Value, name: &str) -> String {
    record.get(name).map(format_value).unwrap_or_default()
}

/// Format a JSON value for human display.
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => value.to_string(),
        Value::Null => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&json!("post")), "post");
        assert_eq!(format_value(&json!(0.5)), "0.5");
        assert_eq!(format_value(&json!(["post", "user"])), "post, user");
        assert_eq!(format_value(&Value::Null), "");
    }

    #[test]
    fn test_record_field_lookup() {
        let record = json!({"id": "abc", "face": 0.9, "url": ""});
        assert_eq!(field(&record, "id"), "abc");
        assert_eq!(field(&record, "face"), "0.9");
        assert_eq!(field(&record, "missing"), "");
    }
}
