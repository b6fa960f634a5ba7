#![forbid(unsafe_code)]

//! The view engine one tabular page drives.
//!
//! [`ViewEngine`] owns the live working view (user filters, sorting,
//! grouping, paging, column sizes), the active scope, and the selected saved
//! view. It composes filters for row evaluation, reports drift against the
//! selected view, arbitrates column resizes, and persists itself through a
//! [`StateRegistry`].
//!
//! # Persistence
//!
//! The working view is stored under `view::<page_id>`. The scope is
//! environmental and never persisted; neither is the search term. With
//! `autosave` on, every successful mutation persists the working view; a
//! storage failure is logged on `tabula.engine` and the mutation still
//! succeeds.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use tabula_core::{
    ColumnCatalog, ColumnFilter, Drift, FilterLayers, FilterSpec, Row, RowModel, RowQuery,
    SavedView, SortKey, ViewSnapshot, compose, decompose_with_overrides, dedupe_tier, drift,
    evaluate,
};
use tabula_layout::{ColumnSizeArbiter, SizeMap};

use crate::config::EngineConfig;
use crate::error::{Result, ViewError};
use crate::routines::{SavedViewRepository, StoredViewRepository};
use crate::state_persistence::{
    MemoryStorage, StateKey, StateRegistry, Stateful, StorageBackend, StorageResult,
};

/// The user's active data perimeter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeSelection {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub filters: Vec<ColumnFilter>,
}

impl ScopeSelection {
    #[must_use]
    pub fn new(id: impl Into<String>, filters: Vec<ColumnFilter>) -> Self {
        Self {
            id: id.into(),
            label: String::new(),
            filters,
        }
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Input for "save as new view".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveViewRequest {
    pub name: String,
    pub description: Option<String>,
    /// Bind the view to the active scope.
    pub scope_fixed: bool,
}

impl SaveViewRequest {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn scope_fixed(mut self, scope_fixed: bool) -> Self {
        self.scope_fixed = scope_fixed;
        self
    }
}

/// Persisted form of [`WorkingView`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkingViewState {
    pub user_filters: Vec<ColumnFilter>,
    pub routine_filters: Vec<ColumnFilter>,
    pub sorting: Vec<SortKey>,
    pub group_by: Option<String>,
    pub page_size: usize,
    pub page_index: usize,
    pub selected_view: Option<String>,
    pub column_sizes: SizeMap,
}

/// The live, editable configuration of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingView {
    page_id: String,
    state: WorkingViewState,
}

impl WorkingView {
    #[must_use]
    pub fn new(page_id: impl Into<String>, page_size: usize) -> Self {
        Self {
            page_id: page_id.into(),
            state: WorkingViewState {
                page_size,
                ..WorkingViewState::default()
            },
        }
    }

    #[must_use]
    pub fn state(&self) -> &WorkingViewState {
        &self.state
    }
}

impl Stateful for WorkingView {
    type State = WorkingViewState;

    fn state_key(&self) -> StateKey {
        StateKey::new("view", self.page_id.as_str())
    }

    fn save_state(&self) -> WorkingViewState {
        self.state.clone()
    }

    fn restore_state(&mut self, state: WorkingViewState) {
        self.state = state;
    }
}

/// Next state of one column in a sort toggle cycle.
fn next_sort(current: Option<&SortKey>, column_id: &str) -> Option<SortKey> {
    match current {
        None => Some(SortKey::asc(column_id)),
        Some(key) if !key.descending => Some(SortKey::desc(column_id)),
        Some(_) => None,
    }
}

/// View-state engine for one page.
#[derive(Debug)]
pub struct ViewEngine<R, S> {
    config: EngineConfig,
    catalog: ColumnCatalog,
    repository: R,
    registry: StateRegistry<S>,
    working: WorkingView,
    scope: Option<ScopeSelection>,
    selected: Option<SavedView>,
    search: String,
    arbiter: ColumnSizeArbiter,
    computed_sizes: SizeMap,
}

impl ViewEngine<StoredViewRepository<MemoryStorage>, MemoryStorage> {
    /// Engine backed entirely by process memory.
    #[must_use]
    pub fn in_memory(config: EngineConfig, catalog: ColumnCatalog) -> Self {
        let routines = StateRegistry::new(MemoryStorage::new())
            .with_prefix(config.storage_prefix.as_str());
        let repository = StoredViewRepository::open(routines, config.page_id.as_str());
        Self::new(config, catalog, repository, MemoryStorage::new())
    }
}

impl<R: SavedViewRepository, S: StorageBackend> ViewEngine<R, S> {
    /// Build an engine and restore the persisted working view for
    /// `config.page_id`.
    pub fn new(config: EngineConfig, catalog: ColumnCatalog, repository: R, backend: S) -> Self {
        for problem in config.validate() {
            tracing::warn!(target: "tabula.engine", problem = %problem, "invalid engine config");
        }

        let registry =
            StateRegistry::new(backend).with_prefix(config.storage_prefix.as_str());
        let mut working = WorkingView::new(config.page_id.as_str(), config.default_page_size);
        let restored = registry.restore(&mut working);

        if !config.allows_page_size(working.state.page_size) {
            working.state.page_size = config.default_page_size;
        }

        let selected = working
            .state
            .selected_view
            .as_deref()
            .and_then(|id| repository.get(id));
        if selected.is_none() {
            working.state.selected_view = None;
            working.state.routine_filters.clear();
        }

        let arbiter = ColumnSizeArbiter::with_sizes(working.state.column_sizes.clone());

        tracing::debug!(
            target: "tabula.engine",
            page_id = %config.page_id,
            restored,
            selected = ?working.state.selected_view,
            user_filters = working.state.user_filters.len(),
            "view engine ready"
        );

        Self {
            config,
            catalog,
            repository,
            registry,
            working,
            scope: None,
            selected,
            search: String::new(),
            arbiter,
            computed_sizes: SizeMap::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn repository(&self) -> &R {
        &self.repository
    }

    #[must_use]
    pub fn registry(&self) -> &StateRegistry<S> {
        &self.registry
    }

    #[must_use]
    pub fn working_view(&self) -> &WorkingView {
        &self.working
    }

    // ── Filters ─────────────────────────────────────────────────────────

    fn scope_filters(&self) -> &[ColumnFilter] {
        self.scope
            .as_ref()
            .map(|s| s.filters.as_slice())
            .unwrap_or_default()
    }

    fn check_filterable(&self, column_id: &str) -> Result<()> {
        let column = self
            .catalog
            .get(column_id)
            .ok_or_else(|| ViewError::unknown_column(column_id))?;
        if !column.filterable {
            return Err(ViewError::NotFilterable {
                column_id: column_id.to_string(),
            });
        }
        Ok(())
    }

    fn check_known(&self, column_id: &str) -> Result<()> {
        if self.catalog.contains(column_id) {
            Ok(())
        } else {
            Err(ViewError::unknown_column(column_id))
        }
    }

    /// Filters applied to rows: user tier over scope tier.
    #[must_use]
    pub fn effective_filters(&self) -> Vec<ColumnFilter> {
        compose(self.scope_filters(), &self.working.state.user_filters)
    }

    /// All three tiers, for provenance display.
    #[must_use]
    pub fn filter_layers(&self) -> FilterLayers {
        FilterLayers {
            scope: self.scope_filters().to_vec(),
            routine: self.working.state.routine_filters.clone(),
            user: self.working.state.user_filters.clone(),
        }
    }

    #[must_use]
    pub fn user_filters(&self) -> &[ColumnFilter] {
        &self.working.state.user_filters
    }

    /// Set or replace the user filter on one column.
    pub fn set_user_filter(&mut self, column_id: &str, spec: FilterSpec) -> Result<()> {
        self.check_filterable(column_id)?;
        let filter = ColumnFilter::new(column_id, spec);
        let user = &mut self.working.state.user_filters;
        match user.iter_mut().find(|f| f.column_id == column_id) {
            Some(existing) => *existing = filter,
            None => user.push(filter),
        }
        tracing::debug!(target: "tabula.engine", column_id = %column_id, "user filter set");
        self.working.state.page_index = 0;
        self.autosave();
        Ok(())
    }

    /// Drop the user filter on one column; a scope filter on it shows through.
    ///
    /// Returns whether a filter was removed.
    pub fn clear_user_filter(&mut self, column_id: &str) -> bool {
        let user = &mut self.working.state.user_filters;
        let before = user.len();
        user.retain(|f| f.column_id != column_id);
        let removed = user.len() != before;
        if removed {
            tracing::debug!(target: "tabula.engine", column_id = %column_id, "user filter cleared");
            self.working.state.page_index = 0;
            self.autosave();
        }
        removed
    }

    pub fn clear_user_filters(&mut self) {
        if self.working.state.user_filters.is_empty() {
            return;
        }
        self.working.state.user_filters.clear();
        self.working.state.page_index = 0;
        self.autosave();
    }

    /// Accept a whole effective set edited through the grid.
    ///
    /// Scope columns left at their scope value are not promoted into the user
    /// tier; scope columns the grid changed become user overrides.
    pub fn apply_grid_filters(&mut self, effective: &[ColumnFilter]) -> Result<()> {
        let user = dedupe_tier(&decompose_with_overrides(effective, self.scope_filters()));
        for filter in &user {
            self.check_filterable(&filter.column_id)?;
        }
        tracing::debug!(
            target: "tabula.engine",
            effective = effective.len(),
            user = user.len(),
            "grid filters applied"
        );
        self.working.state.user_filters = user;
        self.working.state.page_index = 0;
        self.autosave();
        Ok(())
    }

    #[must_use]
    pub fn scope(&self) -> Option<&ScopeSelection> {
        self.scope.as_ref()
    }

    /// Replace the scope tier. User filters are left untouched.
    pub fn set_scope(&mut self, scope: Option<ScopeSelection>) {
        tracing::debug!(
            target: "tabula.engine",
            scope = ?scope.as_ref().map(|s| s.id.as_str()),
            filters = scope.as_ref().map_or(0, |s| s.filters.len()),
            "scope changed"
        );
        self.scope = scope;
        self.working.state.page_index = 0;
        self.autosave();
    }

    // ── Sorting, grouping, paging, search ──────────────────────────────

    #[must_use]
    pub fn sorting(&self) -> &[SortKey] {
        &self.working.state.sorting
    }

    pub fn set_sorting(&mut self, sorting: Vec<SortKey>) -> Result<()> {
        for key in &sorting {
            self.check_known(&key.column_id)?;
        }
        self.working.state.sorting = sorting;
        self.autosave();
        Ok(())
    }

    /// Cycle one column through ascending, descending, and unsorted.
    ///
    /// With `additive` the other sort keys are kept (multi-sort); otherwise
    /// the column becomes the only key. Returns the column's new key.
    pub fn toggle_sort(&mut self, column_id: &str, additive: bool) -> Result<Option<SortKey>> {
        self.check_known(column_id)?;
        let sorting = &mut self.working.state.sorting;
        let position = sorting.iter().position(|k| k.column_id == column_id);
        let next = next_sort(position.map(|i| &sorting[i]), column_id);

        if additive {
            match (position, next.clone()) {
                (Some(i), Some(key)) => sorting[i] = key,
                (Some(i), None) => {
                    sorting.remove(i);
                }
                (None, Some(key)) => sorting.push(key),
                (None, None) => {}
            }
        } else {
            *sorting = next.iter().cloned().collect();
        }

        tracing::debug!(
            target: "tabula.engine",
            column_id = %column_id,
            descending = ?next.as_ref().map(|k| k.descending),
            keys = self.working.state.sorting.len(),
            "sort toggled"
        );
        self.autosave();
        Ok(next)
    }

    #[must_use]
    pub fn group_by(&self) -> Option<&str> {
        self.working.state.group_by.as_deref()
    }

    pub fn set_group_by(&mut self, column_id: Option<String>) -> Result<()> {
        if let Some(id) = &column_id {
            self.check_known(id)?;
        }
        self.working.state.group_by = column_id;
        self.autosave();
        Ok(())
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.working.state.page_size
    }

    pub fn set_page_size(&mut self, size: usize) -> Result<()> {
        if !self.config.allows_page_size(size) {
            return Err(ViewError::InvalidPageSize {
                size,
                options: self.config.page_size_options.clone(),
            });
        }
        self.working.state.page_size = size;
        self.working.state.page_index = 0;
        self.autosave();
        Ok(())
    }

    /// Requested page; [`Self::evaluate`] clamps it to the last page.
    #[must_use]
    pub fn page_index(&self) -> usize {
        self.working.state.page_index
    }

    pub fn set_page(&mut self, index: usize) {
        self.working.state.page_index = index;
        self.autosave();
    }

    #[must_use]
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Set the global search term. The host debounces keystrokes.
    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
        self.working.state.page_index = 0;
        self.autosave();
    }

    // ── Drift ───────────────────────────────────────────────────────────

    #[must_use]
    pub fn snapshot(&self) -> ViewSnapshot {
        let state = &self.working.state;
        ViewSnapshot {
            sorting: state.sorting.clone(),
            filters: state.user_filters.clone(),
            group_by: state.group_by.clone(),
            page_size: state.page_size,
        }
    }

    #[must_use]
    pub fn drift(&self) -> Drift {
        drift(&self.snapshot(), self.selected.as_ref())
    }

    /// Whether the live view differs from the selected saved view.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.drift().any()
    }

    // ── Saved views ─────────────────────────────────────────────────────

    #[must_use]
    pub fn saved_views(&self) -> Vec<SavedView> {
        self.repository.list()
    }

    #[must_use]
    pub fn selected_view(&self) -> Option<&SavedView> {
        self.selected.as_ref()
    }

    fn adopt(&mut self, view: SavedView) {
        let state = &mut self.working.state;
        state.user_filters = view.filters.clone();
        state.routine_filters = view.filters.clone();
        state.sorting = view.sorting.clone();
        state.group_by = view.group_by.clone();
        if self.config.allows_page_size(view.page_size) {
            state.page_size = view.page_size;
        }
        state.page_index = 0;
        state.selected_view = Some(view.id.clone());
        self.selected = Some(view);
    }

    /// Copy a saved view into the working view.
    pub fn select_saved_view(&mut self, id: &str) -> Result<()> {
        let view = self
            .repository
            .get(id)
            .ok_or_else(|| ViewError::not_found(id))?;
        tracing::debug!(
            target: "tabula.engine",
            view_id = %view.id,
            name = %view.name,
            "saved view selected"
        );
        self.adopt(view);
        self.autosave();
        Ok(())
    }

    /// Forget the selection; the working view keeps its current state.
    pub fn deselect_view(&mut self) {
        if self.selected.take().is_some() {
            self.working.state.selected_view = None;
            self.working.state.routine_filters.clear();
            tracing::debug!(target: "tabula.engine", "saved view deselected");
            self.autosave();
        }
    }

    /// Save the live view as a new saved view and select it.
    pub fn save_current_as_view(&mut self, request: SaveViewRequest) -> Result<SavedView> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ViewError::MissingName);
        }
        let scope_id = if request.scope_fixed {
            Some(
                self.scope
                    .as_ref()
                    .map(|s| s.id.clone())
                    .filter(|id| !id.is_empty())
                    .ok_or(ViewError::MissingScope)?,
            )
        } else {
            None
        };

        let mut view = SavedView::from_snapshot(name, &self.snapshot(), Utc::now());
        view.description = request.description.filter(|d| !d.trim().is_empty());
        view.scope_fixed = request.scope_fixed;
        view.scope_id = scope_id;

        let created = self.repository.create(view)?;
        tracing::debug!(
            target: "tabula.engine",
            view_id = %created.id,
            name = %created.name,
            "saved view created"
        );
        self.adopt(created.clone());
        self.autosave();
        Ok(created)
    }

    /// Write the live view into the selected saved view.
    pub fn update_selected_view(&mut self) -> Result<SavedView> {
        let mut view = self.selected.clone().ok_or(ViewError::NoSelection)?;
        view.sync_from(&self.snapshot(), Utc::now());
        let updated = self.repository.update(view)?;
        tracing::debug!(target: "tabula.engine", view_id = %updated.id, "saved view updated");
        self.working.state.routine_filters = updated.filters.clone();
        self.selected = Some(updated.clone());
        self.autosave();
        Ok(updated)
    }

    /// Delete a saved view, deselecting it if selected.
    pub fn delete_view(&mut self, id: &str) -> Result<bool> {
        let deleted = self.repository.delete(id)?;
        if deleted {
            tracing::debug!(target: "tabula.engine", view_id = %id, "saved view deleted");
            if self.selected.as_ref().is_some_and(|v| v.id == id) {
                self.deselect_view();
            }
        }
        Ok(deleted)
    }

    // ── Column sizes ────────────────────────────────────────────────────

    #[must_use]
    pub fn column_sizes(&self) -> &SizeMap {
        self.arbiter.sizes()
    }

    #[must_use]
    pub fn is_resizing(&self) -> bool {
        self.arbiter.is_resizing()
    }

    /// Widths the layout currently renders, used for columns without an
    /// explicit size when a gesture begins.
    pub fn set_computed_sizes(&mut self, sizes: SizeMap) {
        self.computed_sizes = sizes;
    }

    pub fn resize_begin(&mut self, column_id: &str) -> Result<()> {
        self.arbiter
            .begin(column_id, &self.computed_sizes, &self.catalog)?;
        Ok(())
    }

    /// Apply the cumulative pointer delta since `resize_begin`.
    pub fn resize_move(&mut self, pointer_delta_x: f64) -> Result<SizeMap> {
        Ok(self.arbiter.on_move(pointer_delta_x)?)
    }

    pub fn resize_end(&mut self) -> bool {
        let ended = self.arbiter.end();
        if ended {
            self.autosave();
        }
        ended
    }

    pub fn resize_cancel(&mut self) -> bool {
        self.arbiter.cancel()
    }

    /// Drop one column's explicit width so its default applies again.
    pub fn reset_column_size(&mut self, column_id: &str) -> Result<Option<f64>> {
        let previous = self.arbiter.reset_column(column_id)?;
        if previous.is_some() {
            self.autosave();
        }
        Ok(previous)
    }

    // ── Rows ────────────────────────────────────────────────────────────

    /// Run filters, search, sorting, grouping, and paging over `rows`.
    #[must_use]
    pub fn evaluate(&self, rows: &[Row]) -> RowModel {
        let filters = self.effective_filters();
        let search_columns = self.catalog.searchable_ids();
        let state = &self.working.state;
        let query = RowQuery {
            filters: &filters,
            search: Some(self.search.as_str()),
            search_columns: &search_columns,
            search_min_chars: self.config.search_min_chars,
            sorting: &state.sorting,
            group_by: state.group_by.as_deref(),
            page_index: state.page_index,
            page_size: state.page_size,
        };
        evaluate(rows, &query)
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Write the working view to storage.
    pub fn persist(&mut self) -> StorageResult<()> {
        self.working
            .state
            .column_sizes
            .clone_from(self.arbiter.sizes());
        self.registry.persist(&self.working)
    }

    fn autosave(&mut self) {
        if !self.config.autosave {
            return;
        }
        if let Err(err) = self.persist() {
            tracing::warn!(
                target: "tabula.engine",
                page_id = %self.config.page_id,
                backend = self.registry.backend().name(),
                error = %err,
                "autosave failed"
            );
        }
    }
}
