use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Interactive TUI table viewer for JSON record streams")]
pub struct Args {
    /// Optional file to read records from (defaults to stdin)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Table id keying the persisted column layout (defaults to the file
    /// stem, or "stdin")
    #[arg(short, long)]
    pub table: Option<String>,

    /// Column id that is always visible and cannot be hidden (repeatable)
    #[arg(long = "lock", value_name = "ID")]
    pub locked: Vec<String>,

    /// Default column layout as a comma-separated id list; ids not listed
    /// start hidden
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    pub columns: Option<Vec<String>>,

    /// Discard the persisted column layout for this table before starting
    #[arg(long)]
    pub reset_columns: bool,

    /// Path of the layout file (defaults to the user config directory)
    #[arg(long, value_name = "PATH")]
    pub state_file: Option<PathBuf>,

    /// Keep column layouts in memory only, never touching the layout file
    #[arg(long)]
    pub ephemeral: bool,

    /// Maximum number of records to keep in memory
    #[arg(long, default_value_t = 5000)]
    pub max_records: usize,

    /// Write logs to this file (logging is disabled otherwise)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// The id that keys this run's column layout in the store.
    pub fn resolve_table_id(&self) -> String {
        if let Some(table) = &self.table {
            return table.clone();
        }
        self.file
            .as_deref()
            .and_then(|path| path.file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "stdin".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_table_id_wins() {
        let args = Args::parse_from(["tabtui", "--file", "/tmp/jobs.ndjson", "--table", "custom"]);
        assert_eq!(args.resolve_table_id(), "custom");
    }

    #[test]
    fn table_id_falls_back_to_the_file_stem() {
        let args = Args::parse_from(["tabtui", "--file", "/var/data/jobs.ndjson"]);
        assert_eq!(args.resolve_table_id(), "jobs");
    }

    #[test]
    fn table_id_defaults_to_stdin() {
        let args = Args::parse_from(["tabtui"]);
        assert_eq!(args.resolve_table_id(), "stdin");
    }

    #[test]
    fn columns_parse_as_a_comma_separated_list() {
        let args = Args::parse_from(["tabtui", "--columns", "_id,_status,name"]);
        assert_eq!(
            args.columns,
            Some(vec![
                "_id".to_string(),
                "_status".to_string(),
                "name".to_string()
            ])
        );
    }

    #[test]
    fn lock_flag_repeats() {
        let args = Args::parse_from(["tabtui", "--lock", "_id", "--lock", "_status"]);
        assert_eq!(args.locked, vec!["_id", "_status"]);
    }
}
