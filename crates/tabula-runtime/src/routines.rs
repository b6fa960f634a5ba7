//! Saved-view ("routine") storage.
//!
//! [`SavedViewRepository`] is the CRUD surface the engine talks to.
//! [`StoredViewRepository`] implements it over a [`StateRegistry`], keeping
//! one `{nextId, views}` record per page. Every mutation is a single write of
//! that record, so a failed write leaves the stored record untouched.
//!
//! # Invariants
//!
//! 1. Ids are `view-<n>` with `n` strictly increasing per page; a deleted id
//!    is never handed out again while the record survives.
//! 2. A corrupt or unreadable record loads as an empty list.
//! 3. Every stored view passes [`validate_view`].

use serde::{Deserialize, Serialize};
use tabula_core::SavedView;

use crate::error::{Result, ViewError};
use crate::state_persistence::{StateKey, StateRegistry, StorageBackend};

/// CRUD over saved views for one page.
pub trait SavedViewRepository {
    /// All views, in creation order.
    fn list(&self) -> Vec<SavedView>;

    fn get(&self, id: &str) -> Option<SavedView>;

    /// Store a new view and assign its id. Any id on the input is ignored.
    fn create(&mut self, view: SavedView) -> Result<SavedView>;

    /// Replace the stored view with the same id.
    fn update(&mut self, view: SavedView) -> Result<SavedView>;

    /// Remove a view. Returns whether it existed.
    fn delete(&mut self, id: &str) -> Result<bool>;
}

/// Checks shared by every repository.
pub fn validate_view(view: &SavedView) -> Result<()> {
    if view.name.trim().is_empty() {
        return Err(ViewError::MissingName);
    }
    if view.scope_fixed && view.scope_id.as_deref().is_none_or(str::is_empty) {
        return Err(ViewError::MissingScope);
    }
    Ok(())
}

const ROUTINES_NAMESPACE: &str = "routines";

/// Persisted form of one page's saved views.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RoutineRecord {
    next_id: u64,
    views: Vec<SavedView>,
}

/// Borrowed twin of [`RoutineRecord`] for writes.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RoutineRecordRef<'a> {
    next_id: u64,
    views: &'a [SavedView],
}

fn id_number(id: &str) -> Option<u64> {
    id.strip_prefix("view-")?.parse().ok()
}

/// [`SavedViewRepository`] persisted through a [`StateRegistry`].
#[derive(Debug)]
pub struct StoredViewRepository<S> {
    registry: StateRegistry<S>,
    page_id: String,
    views: Vec<SavedView>,
    next_id: u64,
}

impl<S: StorageBackend> StoredViewRepository<S> {
    /// Load the views stored for `page_id`.
    pub fn open(registry: StateRegistry<S>, page_id: impl Into<String>) -> Self {
        let page_id = page_id.into();
        let RoutineRecord { next_id, views } = registry
            .load(&StateKey::new(ROUTINES_NAMESPACE, page_id.as_str()))
            .unwrap_or_default();
        let after_existing = views
            .iter()
            .filter_map(|v| id_number(&v.id))
            .max()
            .map_or(1, |n| n + 1);
        tracing::debug!(
            target: "tabula.persist",
            page_id = %page_id,
            views = views.len(),
            "saved views loaded"
        );
        Self {
            registry,
            page_id,
            views,
            next_id: next_id.max(after_existing),
        }
    }

    #[must_use]
    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    #[must_use]
    pub fn registry(&self) -> &StateRegistry<S> {
        &self.registry
    }

    fn flush(&mut self) -> Result<()> {
        let record = RoutineRecordRef {
            next_id: self.next_id,
            views: &self.views,
        };
        self.registry
            .save(&StateKey::new(ROUTINES_NAMESPACE, self.page_id.as_str()), &record)?;
        Ok(())
    }
}

impl<S: StorageBackend> SavedViewRepository for StoredViewRepository<S> {
    fn list(&self) -> Vec<SavedView> {
        self.views.clone()
    }

    fn get(&self, id: &str) -> Option<SavedView> {
        self.views.iter().find(|v| v.id == id).cloned()
    }

    fn create(&mut self, mut view: SavedView) -> Result<SavedView> {
        validate_view(&view)?;
        view.id = format!("view-{}", self.next_id);
        self.next_id += 1;
        self.views.push(view.clone());
        if let Err(err) = self.flush() {
            self.views.pop();
            self.next_id -= 1;
            return Err(err);
        }
        Ok(view)
    }

    fn update(&mut self, view: SavedView) -> Result<SavedView> {
        validate_view(&view)?;
        let slot = self
            .views
            .iter_mut()
            .find(|v| v.id == view.id)
            .ok_or_else(|| ViewError::not_found(view.id.as_str()))?;
        let previous = std::mem::replace(slot, view.clone());
        if let Err(err) = self.flush() {
            if let Some(slot) = self.views.iter_mut().find(|v| v.id == previous.id) {
                *slot = previous;
            }
            return Err(err);
        }
        Ok(view)
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        let Some(index) = self.views.iter().position(|v| v.id == id) else {
            return Ok(false);
        };
        let removed = self.views.remove(index);
        if let Err(err) = self.flush() {
            self.views.insert(index, removed);
            return Err(err);
        }
        Ok(true)
    }
}
