use chrono::{DateTime, SecondsFormat};
use serde_json::Value;

#[derive(Clone, Debug)]
pub struct Record {
    pub raw: Value,
}

impl Record {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// Column ids present in this record: one per top-level key, except
    /// objects, which contribute one id per child as `parent.child`.
    pub fn column_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        let Some(obj) = self.raw.as_object() else {
            return ids;
        };
        for (key, value) in obj {
            match value.as_object() {
                Some(children) if !children.is_empty() => {
                    for child in children.keys() {
                        ids.push(format!("{key}.{child}"));
                    }
                }
                _ => ids.push(key.clone()),
            }
        }
        ids
    }

    pub fn field_at(&self, id: &str) -> Option<&Value> {
        let mut current = &self.raw;
        for part in id.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    pub fn cell_text(&self, id: &str) -> String {
        match self.field_at(id) {
            Some(value) => display_value(id, value),
            None => String::new(),
        }
    }
}

fn display_value(id: &str, value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_i64() {
            Some(ts) if is_timestamp_id(id) => format_epoch(ts),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn is_timestamp_id(id: &str) -> bool {
    let leaf = id.rsplit('.').next().unwrap_or(id);
    leaf == "timestamp" || leaf.ends_with("_at") || (leaf.ends_with("At") && leaf.len() > 2)
}

/// Epoch seconds or milliseconds picked by magnitude; values too small to be
/// either pass through unformatted.
fn format_epoch(ts: i64) -> String {
    let dt = if ts.abs() >= 1_000_000_000_000 {
        DateTime::from_timestamp_millis(ts)
    } else if ts.abs() >= 1_000_000_000 {
        DateTime::from_timestamp(ts, 0)
    } else {
        None
    };
    match dt {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => ts.to_string(),
    }
}
