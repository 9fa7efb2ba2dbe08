use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub mod store;

pub use store::{JsonFileStore, LayoutStore, MemoryStore};

/// One column of a table layout. Position in the layout vec is display order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub id: String,
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
}

impl ColumnSpec {
    pub fn new(id: impl Into<String>, visible: bool) -> Self {
        Self {
            id: id.into(),
            visible,
            locked: false,
        }
    }
}

/// Argument to the layout mutations: either a replacement value or a
/// function of the current one.
pub enum Update<T> {
    Set(T),
    With(Box<dyn FnOnce(T) -> T>),
}

impl<T> Update<T> {
    pub fn with(f: impl FnOnce(T) -> T + 'static) -> Self {
        Update::With(Box::new(f))
    }

    fn apply(self, current: T) -> T {
        match self {
            Update::Set(value) => value,
            Update::With(f) => f(current),
        }
    }
}

/// Reconciles the columns a table actually has against the persisted layout
/// for its table id, and owns all layout mutations.
///
/// The layout is seeded from the store when present, else from the caller's
/// defaults, else from the ids reported through [`sync_columns`]. Ids named
/// in `locked` are always visible and cannot be hidden. Mutations update the
/// layout in memory first; persisting is best-effort and never fails the
/// operation.
///
/// [`sync_columns`]: ColumnManager::sync_columns
pub struct ColumnManager<S: LayoutStore> {
    table_id: String,
    store: S,
    locked: Vec<String>,
    defaults: Option<Vec<ColumnSpec>>,
    layout: Vec<ColumnSpec>,
    seen: Vec<String>,
    on_change: Option<Box<dyn FnMut(&[ColumnSpec])>>,
    store_error: Option<String>,
}

impl<S: LayoutStore> ColumnManager<S> {
    pub fn new(
        table_id: impl Into<String>,
        store: S,
        locked: Vec<String>,
        defaults: Option<Vec<ColumnSpec>>,
    ) -> Self {
        let mut manager = Self {
            table_id: table_id.into(),
            store,
            locked,
            defaults,
            layout: Vec::new(),
            seen: Vec::new(),
            on_change: None,
            store_error: None,
        };
        manager.layout = manager
            .store
            .get(&manager.table_id)
            .unwrap_or_else(|| manager.base_layout());
        manager.apply_lock_rules();
        manager
    }

    pub fn with_on_change(mut self, on_change: impl FnMut(&[ColumnSpec]) + 'static) -> Self {
        self.on_change = Some(Box::new(on_change));
        self
    }

    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    /// Full layout in display order, stale entries included.
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.layout
    }

    /// Derived visibility per column id. Locked columns always map to true.
    pub fn visibility(&self) -> HashMap<String, bool> {
        self.layout
            .iter()
            .map(|col| (col.id.clone(), col.locked || col.visible))
            .collect()
    }

    /// Column ids in display order, stale ids included.
    pub fn order(&self) -> Vec<String> {
        self.layout.iter().map(|col| col.id.clone()).collect()
    }

    /// What went wrong on the last store write, if anything.
    pub fn persistence_error(&self) -> Option<&str> {
        self.store_error.as_deref()
    }

    /// Reports the ids currently present in the data. Unknown ids are
    /// appended to the layout without disturbing existing entries; appended
    /// ids start visible unless the manager was built with defaults.
    /// Reporting the same ids again is a no-op.
    pub fn sync_columns(&mut self, ids: &[String]) {
        let mut changed = false;
        for id in ids {
            if !self.seen.contains(id) {
                self.seen.push(id.clone());
            }
            if !self.layout.iter().any(|col| &col.id == id) {
                self.layout.push(ColumnSpec {
                    id: id.clone(),
                    visible: self.defaults.is_none(),
                    locked: false,
                });
                changed = true;
            }
        }
        if changed {
            self.apply_lock_rules();
            self.commit();
        }
    }

    /// Resolves `update` against the current visibility map and writes the
    /// result onto matching entries. Ids absent from the resolved map keep
    /// their flag; locked columns stay visible whatever the map says.
    pub fn set_visibility(&mut self, update: Update<HashMap<String, bool>>) {
        let next = update.apply(self.visibility());
        for col in &mut self.layout {
            if let Some(&visible) = next.get(&col.id) {
                col.visible = visible;
            }
        }
        self.apply_lock_rules();
        self.commit();
    }

    /// Rebuilds the layout in the resolved order, carrying existing flags.
    /// Unknown ids are inserted visible; ids omitted from the order are kept
    /// after it in their prior relative order; duplicates are ignored.
    pub fn set_order(&mut self, update: Update<Vec<String>>) {
        let next = update.apply(self.order());
        let mut rebuilt: Vec<ColumnSpec> = Vec::with_capacity(self.layout.len());
        for id in next {
            if rebuilt.iter().any(|col| col.id == id) {
                continue;
            }
            match self.layout.iter().find(|col| col.id == id) {
                Some(col) => rebuilt.push(col.clone()),
                None => rebuilt.push(ColumnSpec::new(id, true)),
            }
        }
        for col in &self.layout {
            if !rebuilt.iter().any(|c| c.id == col.id) {
                rebuilt.push(col.clone());
            }
        }
        self.layout = rebuilt;
        self.apply_lock_rules();
        self.commit();
    }

    /// Discards the persisted layout and reseeds from the defaults, falling
    /// back to every id reported so far. The store entry stays absent until
    /// the next mutation.
    pub fn reset(&mut self) {
        match self.store.delete(&self.table_id) {
            Ok(()) => self.store_error = None,
            Err(err) => {
                warn!(table = %self.table_id, error = %err, "failed to delete stored column layout");
                self.store_error = Some(err.to_string());
            }
        }
        self.layout = self.base_layout();
        self.apply_lock_rules();
        self.notify();
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    fn base_layout(&self) -> Vec<ColumnSpec> {
        match &self.defaults {
            Some(defaults) => {
                let mut layout = defaults.clone();
                for id in &self.seen {
                    if !layout.iter().any(|col| &col.id == id) {
                        layout.push(ColumnSpec::new(id.clone(), false));
                    }
                }
                layout
            }
            None => self
                .seen
                .iter()
                .map(|id| ColumnSpec::new(id.clone(), true))
                .collect(),
        }
    }

    fn apply_lock_rules(&mut self) {
        for col in &mut self.layout {
            col.locked = self.locked.contains(&col.id);
            if col.locked {
                col.visible = true;
            }
        }
    }

    fn commit(&mut self) {
        match self.store.set(&self.table_id, &self.layout) {
            Ok(()) => self.store_error = None,
            Err(err) => {
                warn!(table = %self.table_id, error = %err, "failed to persist column layout");
                self.store_error = Some(err.to_string());
            }
        }
        self.notify();
    }

    fn notify(&mut self) {
        if let Some(on_change) = self.on_change.as_mut() {
            on_change(&self.layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::{cell::RefCell, rc::Rc};

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn manager(
        locked: &[&str],
        defaults: Option<Vec<ColumnSpec>>,
    ) -> ColumnManager<MemoryStore> {
        ColumnManager::new("jobs", MemoryStore::new(), ids(locked), defaults)
    }

    fn flags(manager: &ColumnManager<MemoryStore>, id: &str) -> (bool, bool) {
        let col = manager
            .columns()
            .iter()
            .find(|col| col.id == id)
            .unwrap_or_else(|| panic!("column {id} missing"));
        (col.visible, col.locked)
    }

    struct FailingStore;

    impl LayoutStore for FailingStore {
        fn get(&self, _table_id: &str) -> Option<Vec<ColumnSpec>> {
            None
        }

        fn set(&mut self, _table_id: &str, _layout: &[ColumnSpec]) -> anyhow::Result<()> {
            Err(anyhow!("disk full"))
        }

        fn delete(&mut self, _table_id: &str) -> anyhow::Result<()> {
            Err(anyhow!("disk full"))
        }
    }

    #[test]
    fn reported_columns_start_visible_without_defaults() {
        let mut manager = manager(&[], None);

        manager.sync_columns(&ids(&["_id", "_type"]));

        assert_eq!(manager.order(), ids(&["_id", "_type"]));
        assert_eq!(manager.visibility().get("_id"), Some(&true));
        assert_eq!(manager.visibility().get("_type"), Some(&true));
    }

    #[test]
    fn sync_is_idempotent() {
        let counter = Rc::new(RefCell::new(0usize));
        let seen = counter.clone();
        let mut manager = ColumnManager::new("jobs", MemoryStore::new(), Vec::new(), None)
            .with_on_change(move |_| *seen.borrow_mut() += 1);

        manager.sync_columns(&ids(&["_id", "_type"]));
        let snapshot = manager.columns().to_vec();
        manager.sync_columns(&ids(&["_id", "_type"]));

        assert_eq!(manager.columns(), snapshot.as_slice());
        assert_eq!(*counter.borrow(), 1, "second sync must not notify");
    }

    #[test]
    fn locked_columns_cannot_be_hidden() {
        // the jobs table end to end: nothing persisted, no defaults
        let mut manager = manager(&["_status"], None);
        manager.sync_columns(&ids(&["_id", "_type", "_status", "_createdAt"]));

        let visibility = manager.visibility();
        assert!(visibility.values().all(|&v| v), "everything starts visible");

        let mut next = HashMap::new();
        next.insert("_id".to_string(), false);
        next.insert("_status".to_string(), false);
        manager.set_visibility(Update::Set(next));

        let visibility = manager.visibility();
        assert_eq!(visibility.get("_id"), Some(&false));
        assert_eq!(visibility.get("_status"), Some(&true), "locked wins");
        assert_eq!(visibility.get("_type"), Some(&true));
        assert_eq!(visibility.get("_createdAt"), Some(&true));
    }

    #[test]
    fn set_order_reorders_and_keeps_flags() {
        let mut manager = manager(&[], None);
        manager.sync_columns(&ids(&["a", "b", "c"]));
        manager.set_visibility(Update::with(|mut vis: HashMap<String, bool>| {
            vis.insert("b".to_string(), false);
            vis
        }));

        manager.set_order(Update::Set(ids(&["c", "a", "b"])));

        assert_eq!(manager.order(), ids(&["c", "a", "b"]));
        assert_eq!(flags(&manager, "b"), (false, false));
        assert_eq!(flags(&manager, "c"), (true, false));
    }

    #[test]
    fn set_order_keeps_omitted_ids_and_inserts_unknown_ones() {
        let mut manager = manager(&[], None);
        manager.sync_columns(&ids(&["a", "b", "c"]));

        manager.set_order(Update::Set(ids(&["c", "x"])));

        assert_eq!(manager.order(), ids(&["c", "x", "a", "b"]));
        assert_eq!(flags(&manager, "x"), (true, false));
    }

    #[test]
    fn set_order_ignores_duplicate_ids() {
        let mut manager = manager(&[], None);
        manager.sync_columns(&ids(&["a", "b", "c"]));

        manager.set_order(Update::Set(ids(&["b", "b", "a"])));

        assert_eq!(manager.order(), ids(&["b", "a", "c"]));
    }

    #[test]
    fn set_visibility_merges_partial_map_and_keeps_order() {
        let mut manager = manager(&[], None);
        manager.sync_columns(&ids(&["a", "b", "c"]));

        let mut partial = HashMap::new();
        partial.insert("b".to_string(), false);
        manager.set_visibility(Update::Set(partial));

        assert_eq!(manager.order(), ids(&["a", "b", "c"]));
        assert_eq!(manager.visibility().get("a"), Some(&true));
        assert_eq!(manager.visibility().get("b"), Some(&false));
        assert_eq!(manager.visibility().get("c"), Some(&true));
    }

    #[test]
    fn update_with_sees_the_current_visibility_map() {
        let mut manager = manager(&[], None);
        manager.sync_columns(&ids(&["a", "b"]));

        manager.set_visibility(Update::with(|mut vis: HashMap<String, bool>| {
            for flag in vis.values_mut() {
                *flag = !*flag;
            }
            vis
        }));

        assert_eq!(manager.visibility().get("a"), Some(&false));
        assert_eq!(manager.visibility().get("b"), Some(&false));
    }

    #[test]
    fn stored_layout_wins_over_defaults() {
        let mut store = MemoryStore::new();
        store
            .set(
                "jobs",
                &[ColumnSpec::new("b", false), ColumnSpec::new("a", true)],
            )
            .unwrap();

        let manager = ColumnManager::new(
            "jobs",
            store,
            Vec::new(),
            Some(vec![ColumnSpec::new("a", true)]),
        );

        assert_eq!(manager.order(), ids(&["b", "a"]));
        assert_eq!(manager.visibility().get("b"), Some(&false));
    }

    #[test]
    fn stored_layout_gains_newly_reported_columns() {
        let mut store = MemoryStore::new();
        store
            .set(
                "jobs",
                &[ColumnSpec::new("a", true), ColumnSpec::new("b", false)],
            )
            .unwrap();

        let mut manager = ColumnManager::new("jobs", store, Vec::new(), None);
        manager.sync_columns(&ids(&["a", "b", "c"]));

        assert_eq!(manager.order(), ids(&["a", "b", "c"]));
        assert_eq!(flags(&manager, "a"), (true, false));
        assert_eq!(flags(&manager, "b"), (false, false));
        assert_eq!(flags(&manager, "c"), (true, false), "appends start visible");
    }

    #[test]
    fn defaults_keep_newly_reported_columns_hidden() {
        let defaults = vec![ColumnSpec::new("a", true), ColumnSpec::new("b", true)];
        let mut manager = manager(&[], Some(defaults));

        manager.sync_columns(&ids(&["a", "b", "c"]));

        assert_eq!(manager.order(), ids(&["a", "b", "c"]));
        assert_eq!(manager.visibility().get("c"), Some(&false));
    }

    #[test]
    fn lock_list_overrides_stored_flags_in_both_directions() {
        let mut store = MemoryStore::new();
        store
            .set(
                "jobs",
                &[
                    ColumnSpec {
                        id: "a".into(),
                        visible: false,
                        locked: false,
                    },
                    ColumnSpec {
                        id: "b".into(),
                        visible: true,
                        locked: true,
                    },
                ],
            )
            .unwrap();

        let manager = ColumnManager::new("jobs", store, ids(&["a"]), None);

        assert_eq!(flags(&manager, "a"), (true, true));
        assert_eq!(flags(&manager, "b"), (true, false));
    }

    #[test]
    fn seeding_does_not_write_to_the_store() {
        let defaults = vec![ColumnSpec::new("a", true)];
        let manager = manager(&[], Some(defaults));

        assert_eq!(manager.store().get("jobs"), None);
    }

    #[test]
    fn mutations_persist_the_full_layout() {
        let mut manager = manager(&[], None);
        manager.sync_columns(&ids(&["a", "b"]));

        manager.set_visibility(Update::with(|mut vis: HashMap<String, bool>| {
            vis.insert("a".to_string(), false);
            vis
        }));

        let stored = manager.store().get("jobs").unwrap();
        assert_eq!(stored, manager.columns().to_vec());
        assert!(!stored[0].visible);
    }

    #[test]
    fn reset_restores_defaults_and_clears_the_stored_entry() {
        let defaults = vec![ColumnSpec::new("a", true), ColumnSpec::new("b", false)];
        let mut manager = manager(&["a"], Some(defaults.clone()));
        manager.sync_columns(&ids(&["a", "b", "c"]));
        manager.set_order(Update::Set(ids(&["c", "b", "a"])));
        assert!(manager.store().get("jobs").is_some());

        manager.reset();

        assert_eq!(manager.order(), ids(&["a", "b", "c"]));
        assert_eq!(flags(&manager, "a"), (true, true));
        assert_eq!(flags(&manager, "b"), (false, false));
        assert_eq!(flags(&manager, "c"), (false, false), "extras stay hidden");
        assert_eq!(manager.store().get("jobs"), None);
    }

    #[test]
    fn reset_without_defaults_shows_every_reported_column() {
        let mut manager = manager(&[], None);
        manager.sync_columns(&ids(&["a", "b"]));
        manager.set_visibility(Update::with(|mut vis: HashMap<String, bool>| {
            vis.insert("a".to_string(), false);
            vis
        }));

        manager.reset();

        assert_eq!(manager.order(), ids(&["a", "b"]));
        assert_eq!(manager.visibility().get("a"), Some(&true));
        assert_eq!(manager.store().get("jobs"), None);
    }

    #[test]
    fn on_change_fires_once_per_mutation() {
        let counter = Rc::new(RefCell::new(0usize));
        let seen = counter.clone();
        let mut manager = ColumnManager::new("jobs", MemoryStore::new(), Vec::new(), None)
            .with_on_change(move |_| *seen.borrow_mut() += 1);

        manager.sync_columns(&ids(&["a", "b"]));
        manager.set_visibility(Update::Set(HashMap::new()));
        manager.set_order(Update::Set(ids(&["b", "a"])));
        manager.reset();

        assert_eq!(*counter.borrow(), 4);
    }

    #[test]
    fn failing_store_keeps_the_mutation_and_records_the_error() {
        let mut manager = ColumnManager::new("jobs", FailingStore, Vec::new(), None);
        manager.sync_columns(&ids(&["a", "b"]));
        assert!(manager.persistence_error().is_some());

        manager.set_visibility(Update::with(|mut vis: HashMap<String, bool>| {
            vis.insert("a".to_string(), false);
            vis
        }));

        assert_eq!(manager.visibility().get("a"), Some(&false));
        assert_eq!(manager.persistence_error(), Some("disk full"));
    }

    #[test]
    fn successful_write_clears_a_recorded_error() {
        let mut manager = manager(&[], None);
        manager.sync_columns(&ids(&["a"]));
        manager.store_error = Some("disk full".to_string());

        manager.set_visibility(Update::Set(HashMap::new()));

        assert_eq!(manager.persistence_error(), None);
    }
}
