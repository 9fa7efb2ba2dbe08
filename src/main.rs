use std::fs::File;
use std::io;
use std::sync::{Arc, mpsc};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{Level, debug, warn};
use tracing_subscriber::FmtSubscriber;

mod app;
mod args;
mod columns;
mod input;
mod model;
mod ui;

use app::{App, run_app};
use args::Args;
use columns::{ColumnManager, ColumnSpec, JsonFileStore, LayoutStore, MemoryStore};

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let table_id = args.resolve_table_id();
    let store = open_store(&args);
    let defaults: Option<Vec<ColumnSpec>> = args.columns.as_ref().map(|ids| {
        ids.iter()
            .map(|id| ColumnSpec::new(id.trim(), true))
            .collect()
    });
    let mut manager = ColumnManager::new(table_id.as_str(), store, args.locked.clone(), defaults)
        .with_on_change(|layout| debug!(columns = layout.len(), "column layout changed"));
    if args.reset_columns {
        manager.reset();
    }

    let input_source = input::resolve_input_source(&args)?;
    let (tx, rx) = mpsc::channel();
    input::spawn_reader(input_source, tx);

    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal")?;

    let mut app = App::new(args.max_records, manager);
    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("leaving alternate screen")?;
    terminal.show_cursor().ok();

    if let Err(err) = res {
        eprintln!("error: {err:?}");
    }

    Ok(())
}

/// Layouts go to a JSON file unless `--ephemeral` is set. An unreadable
/// file is left in place and replaced by an in-memory store for this run.
fn open_store(args: &Args) -> Box<dyn LayoutStore> {
    if args.ephemeral {
        return Box::new(MemoryStore::new());
    }
    let path = args
        .state_file
        .clone()
        .unwrap_or_else(JsonFileStore::default_path);
    match JsonFileStore::open(path) {
        Ok(store) => Box::new(store),
        Err(err) => {
            warn!(error = %err, "layout file unusable, falling back to in-memory layouts");
            Box::new(MemoryStore::new())
        }
    }
}

/// Logging is opt-in: stdout belongs to the TUI, so traces only go to
/// `--log-file` when given. LOG_LEVEL selects verbosity (default info).
fn init_logging(args: &Args) -> Result<()> {
    let Some(path) = &args.log_file else {
        return Ok(());
    };

    let level = match std::env::var("LOG_LEVEL")
        .unwrap_or_default()
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let file = File::create(path).with_context(|| format!("creating log file {path:?}"))?;
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("installing tracing subscriber")?;
    Ok(())
}
