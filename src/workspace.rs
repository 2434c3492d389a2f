//! Selection state of the consumer's view.
//!
//! Tracks which table is selected, which rows are selected, the view mode
//! and the row-listing parameters. Every change bumps a generation; a
//! [`ViewTicket`] taken before a fetch tells whether the view is still the
//! one the fetch was for when the result arrives.

use crate::models::{DEFAULT_PAGE_SIZE, RowKey, RowsQuery};
use std::collections::HashSet;
use tokio::sync::watch;
use tracing::debug;

/// What the view shows for the selected table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Table,
    Schema,
    Sql,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceState {
    pub table: Option<String>,
    pub selected_rows: HashSet<RowKey>,
    pub mode: ViewMode,
    pub rows_query: RowsQuery,
    pub generation: u64,
}

impl Default for WorkspaceState {
    fn default() -> Self {
        Self {
            table: None,
            selected_rows: HashSet::new(),
            mode: ViewMode::default(),
            rows_query: first_page(),
            generation: 0,
        }
    }
}

fn first_page() -> RowsQuery {
    RowsQuery::page(1, DEFAULT_PAGE_SIZE)
}

/// Marks the view a fetch was started for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewTicket {
    generation: u64,
    pub table: Option<String>,
    pub rows_query: RowsQuery,
}

#[derive(Debug)]
pub struct Workspace {
    state: watch::Sender<WorkspaceState>,
}

impl Workspace {
    pub fn new() -> Self {
        let (state, _) = watch::channel(WorkspaceState::default());
        Self { state }
    }

    pub fn state(&self) -> WorkspaceState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkspaceState> {
        self.state.subscribe()
    }

    pub fn selected_table(&self) -> Option<String> {
        self.state.borrow().table.clone()
    }

    fn update(&self, f: impl FnOnce(&mut WorkspaceState)) {
        self.state.send_modify(|state| {
            f(state);
            state.generation += 1;
        });
    }

    /// Select a table. Resets the row selection and pagination.
    pub fn select_table(&self, table: Option<&str>) {
        debug!(table = table.unwrap_or(""), "Table selected");
        self.update(|state| {
            state.table = table.map(String::from);
            state.selected_rows.clear();
            state.rows_query = first_page();
        });
    }

    pub fn set_mode(&self, mode: ViewMode) {
        self.update(|state| state.mode = mode);
    }

    pub fn set_rows_query(&self, query: RowsQuery) {
        self.update(|state| state.rows_query = query);
    }

    /// Toggle a row in the selection. Returns whether it is now selected.
    pub fn toggle_row(&self, key: RowKey) -> bool {
        let mut selected = false;
        self.update(|state| {
            if !state.selected_rows.remove(&key) {
                state.selected_rows.insert(key);
                selected = true;
            }
        });
        selected
    }

    pub fn clear_row_selection(&self) {
        self.update(|state| state.selected_rows.clear());
    }

    /// A table was dropped. Clears the selection if it was the selected one.
    pub fn table_dropped(&self, table: &str) -> bool {
        let affected = self.state.borrow().table.as_deref() == Some(table);
        if affected {
            debug!(table, "Selected table dropped, clearing selection");
            self.update(|state| {
                state.table = None;
                state.selected_rows.clear();
                state.rows_query = first_page();
            });
        }
        affected
    }

    /// A table was renamed. The selection follows it to the new name.
    pub fn table_renamed(&self, old: &str, new: &str) -> bool {
        let affected = self.state.borrow().table.as_deref() == Some(old);
        if affected {
            debug!(from = old, to = new, "Selected table renamed");
            self.update(|state| state.table = Some(new.to_string()));
        }
        affected
    }

    /// Reset everything, keeping the generation counting up.
    pub fn reset(&self) {
        self.update(|state| {
            let generation = state.generation;
            *state = WorkspaceState {
                generation,
                ..WorkspaceState::default()
            };
        });
    }

    /// Capture the current view.
    pub fn ticket(&self) -> ViewTicket {
        let state = self.state.borrow();
        ViewTicket {
            generation: state.generation,
            table: state.table.clone(),
            rows_query: state.rows_query.clone(),
        }
    }

    /// Whether the view is unchanged since the ticket was taken.
    pub fn is_current(&self, ticket: &ViewTicket) -> bool {
        self.state.borrow().generation == ticket.generation
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}
