use std::{
    fs::File,
    io::{self, BufRead, BufReader, IsTerminal},
    path::PathBuf,
    sync::mpsc,
    thread,
};

use anyhow::{Context, Result};
use serde_json::{Value, json};

use crate::{args::Args, model::Record};

pub enum InputSource {
    Stdin,
    File(PathBuf),
    StdinPipe(File),
}

pub fn resolve_input_source(args: &Args) -> Result<InputSource> {
    if let Some(path) = args.file.clone() {
        Ok(InputSource::File(path))
    } else if io::stdin().is_terminal() {
        Ok(InputSource::Stdin)
    } else {
        let file = File::open("/dev/stdin").context("opening /dev/stdin")?;
        Ok(InputSource::StdinPipe(file))
    }
}

pub fn spawn_reader(input: InputSource, tx: mpsc::Sender<Record>) {
    thread::spawn(move || {
        let reader: Box<dyn BufRead + Send> = match input {
            InputSource::Stdin => Box::new(BufReader::new(io::stdin())),
            InputSource::File(path) => match File::open(&path) {
                Ok(file) => Box::new(BufReader::new(file)),
                Err(err) => {
                    let _ = tx.send(Record::new(json!({
                        "error": format!("failed to open {path:?}: {err}"),
                    })));
                    return;
                }
            },
            InputSource::StdinPipe(file) => Box::new(BufReader::new(file)),
        };

        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    if tx.send(parse_record_line(&line)).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    let _ = tx.send(Record::new(json!({ "error": err.to_string() })));
                }
            }
        }
    });
}

/// Every line becomes a record: objects as they are, other JSON values under
/// a "value" column, unparseable lines under a "text" column.
pub fn parse_record_line(line: &str) -> Record {
    match serde_json::from_str::<Value>(line) {
        Ok(value) if value.is_object() => Record::new(value),
        Ok(other) => Record::new(json!({ "value": other })),
        Err(_) => Record::new(json!({ "text": line })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_object_lines_become_records() {
        let record = parse_record_line(r#"{"_id": "a1", "_status": "queued"}"#);
        assert_eq!(
            record.field_at("_status").and_then(|v| v.as_str()),
            Some("queued")
        );
    }

    #[test]
    fn bare_json_values_are_wrapped() {
        let record = parse_record_line("42");
        assert_eq!(record.column_ids(), vec!["value"]);
        assert_eq!(record.cell_text("value"), "42");
    }

    #[test]
    fn non_json_lines_are_wrapped_as_text() {
        let record = parse_record_line("plain line");
        assert_eq!(
            record.field_at("text").and_then(|v| v.as_str()),
            Some("plain line")
        );
    }
}
