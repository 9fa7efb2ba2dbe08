use std::{
    collections::HashMap,
    fs, io,
    path::PathBuf,
};

use anyhow::{Context, Result};

use super::ColumnSpec;

/// Keyed persistence for column layouts, one entry per table id.
pub trait LayoutStore {
    fn get(&self, table_id: &str) -> Option<Vec<ColumnSpec>>;
    fn set(&mut self, table_id: &str, layout: &[ColumnSpec]) -> Result<()>;
    fn delete(&mut self, table_id: &str) -> Result<()>;
}

impl<S: LayoutStore + ?Sized> LayoutStore for Box<S> {
    fn get(&self, table_id: &str) -> Option<Vec<ColumnSpec>> {
        (**self).get(table_id)
    }

    fn set(&mut self, table_id: &str, layout: &[ColumnSpec]) -> Result<()> {
        (**self).set(table_id, layout)
    }

    fn delete(&mut self, table_id: &str) -> Result<()> {
        (**self).delete(table_id)
    }
}

/// Layouts kept for the lifetime of the process only.
#[derive(Default)]
pub struct MemoryStore {
    layouts: HashMap<String, Vec<ColumnSpec>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LayoutStore for MemoryStore {
    fn get(&self, table_id: &str) -> Option<Vec<ColumnSpec>> {
        self.layouts.get(table_id).cloned()
    }

    fn set(&mut self, table_id: &str, layout: &[ColumnSpec]) -> Result<()> {
        self.layouts.insert(table_id.to_string(), layout.to_vec());
        Ok(())
    }

    fn delete(&mut self, table_id: &str) -> Result<()> {
        self.layouts.remove(table_id);
        Ok(())
    }
}

/// All table layouts in one JSON file, rewritten whole on every change.
pub struct JsonFileStore {
    path: PathBuf,
    layouts: HashMap<String, Vec<ColumnSpec>>,
}

impl JsonFileStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        let layouts = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("parsing layout file {}", path.display()))?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("reading layout file {}", path.display()));
            }
        };
        Ok(Self { path, layouts })
    }

    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("tabtui");
        path.push("layouts.json");
        path
    }

    fn write(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating layout directory {}", parent.display()))?;
        }
        let contents =
            serde_json::to_string_pretty(&self.layouts).context("serializing layouts")?;
        fs::write(&self.path, contents)
            .with_context(|| format!("writing layout file {}", self.path.display()))?;
        Ok(())
    }
}

impl LayoutStore for JsonFileStore {
    fn get(&self, table_id: &str) -> Option<Vec<ColumnSpec>> {
        self.layouts.get(table_id).cloned()
    }

    fn set(&mut self, table_id: &str, layout: &[ColumnSpec]) -> Result<()> {
        self.layouts.insert(table_id.to_string(), layout.to_vec());
        self.write()
    }

    fn delete(&mut self, table_id: &str) -> Result<()> {
        if self.layouts.remove(table_id).is_some() {
            self.write()?;
        }
        Ok(())
    }
}
