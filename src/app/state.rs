use std::collections::HashMap;

use ratatui::widgets::{ListState, TableState};
use regex::Regex;

use crate::{
    columns::{ColumnManager, LayoutStore, Update},
    model::Record,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Focus {
    Table,
    Detail,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    FilterInput,
    ColumnSelect,
}

#[derive(Clone, Copy)]
enum SelectStrategy {
    PreserveOrFirst,
    Last,
}

pub struct App<S: LayoutStore> {
    pub records: Vec<Record>,
    pub filtered_indices: Vec<usize>,
    pub manager: ColumnManager<S>,
    pub discovered: Vec<String>,
    pub column_select_state: ListState,
    pub table_state: TableState,
    pub max_records: usize,
    pub last_table_height: usize,
    pub last_detail_height: usize,
    pub detail_scroll: u16,
    pub detail_total_lines: usize,
    pub detail_wrap: bool,
    pub focus: Focus,
    pub show_help: bool,
    pub zoom: Option<Focus>,
    pub autoscroll: bool,
    pub filter_query: String,
    pub filter_regex: Option<Regex>,
    pub filter_error: Option<String>,
    pub input_mode: InputMode,
    pub filter_buffer: String,
    pub force_redraw: bool,
    pub col_offset: usize,
}

impl<S: LayoutStore> App<S> {
    pub fn new(max_records: usize, manager: ColumnManager<S>) -> Self {
        let mut table_state = TableState::default();
        table_state.select(None);
        let mut column_select_state = ListState::default();
        column_select_state.select(Some(0));
        Self {
            records: Vec::new(),
            filtered_indices: Vec::new(),
            manager,
            discovered: Vec::new(),
            column_select_state,
            table_state,
            max_records,
            last_table_height: 0,
            last_detail_height: 0,
            detail_scroll: 0,
            detail_total_lines: 0,
            detail_wrap: true,
            focus: Focus::Table,
            show_help: false,
            zoom: None,
            autoscroll: true,
            filter_query: String::new(),
            filter_regex: None,
            filter_error: None,
            input_mode: InputMode::Normal,
            filter_buffer: String::new(),
            force_redraw: true,
            col_offset: 0,
        }
    }

    pub fn push(&mut self, record: Record) {
        if !self.records.is_empty() && self.records.len() >= self.max_records {
            self.records.remove(0);
            if let Some(sel) = self.table_state.selected() {
                self.table_state.select(Some(sel.saturating_sub(1)));
            }
            self.filtered_indices = self
                .filtered_indices
                .iter()
                .filter_map(|idx| idx.checked_sub(1))
                .collect();
        }
        self.discover(&record);
        let matches = self.matches_filter(&record);
        self.records.push(record);
        let new_idx = self.records.len() - 1;
        if self.autoscroll {
            self.rebuild_filtered(SelectStrategy::Last);
        } else if matches {
            self.filtered_indices.push(new_idx);
            if self.table_state.selected().is_none() {
                self.table_state
                    .select(Some(self.filtered_indices.len() - 1));
                self.detail_scroll = 0;
            }
        }
    }

    /// Column ids to render, in layout order: discovered and visible.
    pub fn visible_columns(&self) -> Vec<String> {
        let visibility = self.manager.visibility();
        self.manager
            .order()
            .into_iter()
            .filter(|id| self.discovered.contains(id))
            .filter(|id| visibility.get(id).copied().unwrap_or(false))
            .collect()
    }

    pub fn next(&mut self) {
        if self.filtered_indices.is_empty() {
            return;
        }
        let i = self.table_state.selected().unwrap_or(0);
        let next = (i + 1).min(self.filtered_indices.len() - 1);
        self.table_state.select(Some(next));
        self.detail_scroll = 0;
        self.force_redraw = true;
    }

    pub fn previous(&mut self) {
        if self.filtered_indices.is_empty() {
            return;
        }
        let i = self.table_state.selected().unwrap_or(0);
        let prev = i.saturating_sub(1);
        self.table_state.select(Some(prev));
        self.detail_scroll = 0;
        self.force_redraw = true;
    }

    pub fn page_down(&mut self) {
        if self.filtered_indices.is_empty() {
            return;
        }
        let half = (self.last_table_height.max(1) / 2).max(1);
        let i = self.table_state.selected().unwrap_or(0);
        let next = (i + half).min(self.filtered_indices.len() - 1);
        self.table_state.select(Some(next));
        self.detail_scroll = 0;
        self.force_redraw = true;
    }

    pub fn page_up(&mut self) {
        if self.filtered_indices.is_empty() {
            return;
        }
        let half = (self.last_table_height.max(1) / 2).max(1);
        let i = self.table_state.selected().unwrap_or(0);
        let prev = i.saturating_sub(half);
        self.table_state.select(Some(prev));
        self.detail_scroll = 0;
        self.force_redraw = true;
    }

    pub fn select_first(&mut self) {
        if self.filtered_indices.is_empty() {
            self.table_state.select(None);
        } else {
            self.table_state.select(Some(0));
        }
        self.detail_scroll = 0;
        self.force_redraw = true;
    }

    pub fn select_last(&mut self) {
        if self.filtered_indices.is_empty() {
            self.table_state.select(None);
        } else {
            self.table_state
                .select(Some(self.filtered_indices.len() - 1));
        }
        self.detail_scroll = 0;
        self.force_redraw = true;
    }

    pub fn current_record(&self) -> Option<Record> {
        let idx = self.table_state.selected()?;
        let record_idx = *self.filtered_indices.get(idx)?;
        self.records.get(record_idx).cloned()
    }

    pub fn detail_down(&mut self, lines: usize) {
        if self.detail_total_lines == 0 {
            return;
        }
        let max_offset = self
            .detail_total_lines
            .saturating_sub(self.last_detail_height.max(1));
        let new = (self.detail_scroll as usize + lines).min(max_offset);
        self.detail_scroll = new as u16;
    }

    pub fn detail_up(&mut self, lines: usize) {
        self.detail_scroll = self.detail_scroll.saturating_sub(lines as u16);
    }

    pub fn detail_top(&mut self) {
        self.detail_scroll = 0;
    }

    pub fn detail_bottom(&mut self) {
        if self.detail_total_lines == 0 {
            self.detail_scroll = 0;
            return;
        }
        let max_offset = self
            .detail_total_lines
            .saturating_sub(self.last_detail_height.max(1));
        self.detail_scroll = max_offset as u16;
    }

    pub fn scroll_columns_left(&mut self) {
        self.col_offset = self.col_offset.saturating_sub(1);
        self.force_redraw = true;
    }

    pub fn scroll_columns_right(&mut self) {
        self.col_offset = self.col_offset.saturating_add(1);
        self.force_redraw = true;
    }

    pub(crate) fn clamp_col_offset(&mut self, visible_count: usize) {
        if visible_count == 0 {
            self.col_offset = 0;
        } else {
            self.col_offset = self.col_offset.min(visible_count - 1);
        }
    }

    pub fn open_column_selector(&mut self) {
        self.input_mode = InputMode::ColumnSelect;
        if self.column_select_state.selected().is_none() && !self.manager.columns().is_empty() {
            self.column_select_state.select(Some(0));
        }
    }

    pub fn toggle_selected_column(&mut self) {
        let Some(idx) = self.column_select_state.selected() else {
            return;
        };
        let Some(col) = self.manager.columns().get(idx) else {
            return;
        };
        if col.locked {
            return;
        }
        let id = col.id.clone();
        self.manager
            .set_visibility(Update::with(move |mut vis: HashMap<String, bool>| {
                if let Some(flag) = vis.get_mut(&id) {
                    *flag = !*flag;
                }
                vis
            }));
        self.force_redraw = true;
    }

    pub fn move_column(&mut self, delta: isize) {
        let len = self.manager.columns().len();
        if len == 0 {
            return;
        }
        let Some(idx) = self.column_select_state.selected() else {
            return;
        };
        let new_idx = (idx as isize + delta).clamp(0, (len as isize) - 1) as usize;
        if new_idx == idx {
            return;
        }
        let mut order = self.manager.order();
        order.swap(idx, new_idx);
        self.manager.set_order(Update::Set(order));
        self.column_select_state.select(Some(new_idx));
        self.force_redraw = true;
    }

    pub fn reset_columns(&mut self) {
        self.manager.reset();
        let len = self.manager.columns().len();
        if self
            .column_select_state
            .selected()
            .map(|i| i >= len)
            .unwrap_or(true)
        {
            self.column_select_state.select(Some(0));
        }
        self.force_redraw = true;
    }

    pub fn apply_filter(&mut self, pattern: &str) {
        if pattern.is_empty() {
            self.filter_query.clear();
            self.filter_regex = None;
            self.filter_error = None;
            self.rebuild_filtered(SelectStrategy::PreserveOrFirst);
            return;
        }

        match Regex::new(pattern) {
            Ok(re) => {
                self.filter_query = pattern.to_string();
                self.filter_regex = Some(re);
                self.filter_error = None;
                self.rebuild_filtered(SelectStrategy::PreserveOrFirst);
            }
            Err(err) => {
                self.filter_error = Some(err.to_string());
            }
        }
    }

    pub fn toggle_autoscroll(&mut self) {
        self.autoscroll = !self.autoscroll;
        self.force_redraw = true;
        if self.autoscroll {
            self.select_last();
        }
    }

    fn discover(&mut self, record: &Record) {
        let mut added = false;
        for id in record.column_ids() {
            if !self.discovered.contains(&id) {
                self.discovered.push(id);
                added = true;
            }
        }
        if added {
            self.manager.sync_columns(&self.discovered);
        }
    }

    fn matches_filter(&self, record: &Record) -> bool {
        match &self.filter_regex {
            Some(re) => re.is_match(&record.raw.to_string()),
            None => true,
        }
    }

    fn selected_record_index(&self) -> Option<usize> {
        let idx = self.table_state.selected()?;
        self.filtered_indices.get(idx).copied()
    }

    fn rebuild_filtered(&mut self, strategy: SelectStrategy) {
        let prev_selected = self.selected_record_index();

        let mut filtered = Vec::with_capacity(self.records.len());
        for (idx, record) in self.records.iter().enumerate() {
            if self.matches_filter(record) {
                filtered.push(idx);
            }
        }
        self.filtered_indices = filtered;

        if self.filtered_indices.is_empty() {
            self.table_state.select(None);
            self.detail_scroll = 0;
            return;
        }

        match strategy {
            SelectStrategy::Last => {
                self.table_state
                    .select(Some(self.filtered_indices.len() - 1));
                self.detail_scroll = 0;
            }
            SelectStrategy::PreserveOrFirst => {
                let pos = prev_selected.and_then(|record_idx| {
                    self.filtered_indices
                        .iter()
                        .position(|&idx| idx == record_idx)
                });
                self.table_state.select(Some(pos.unwrap_or(0)));
                self.detail_scroll = 0;
            }
        }
    }
}
