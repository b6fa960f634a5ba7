#![forbid(unsafe_code)]

//! Column resize arbitration.
//!
//! A resize gesture runs `begin → move* → end`. At `begin` the arbiter records
//! the width of every other resizable column; each `move` emits a size map
//! made of those pinned widths verbatim plus the new width of the target.
//!
//! # Invariants
//!
//! 1. Only the target column's width changes during a gesture; every other
//!    column keeps, bit for bit, the width recorded at `begin`.
//! 2. The pinned snapshot is taken once per gesture and never recomputed from
//!    live layout mid-drag.
//! 3. At most one session is active; a new gesture requires ending the
//!    previous one.
//! 4. The target width always lies within its (normalized) bounds.
//!
//! # Failure Modes
//!
//! - Bounds with `min > max` are swapped rather than rejected.
//! - Non-finite pointer deltas count as zero.
//! - Entries for columns no longer in the catalog are dropped from the
//!   emitted map.

use std::collections::BTreeMap;

use tabula_core::{ColumnCatalog, ColumnDef};
use thiserror::Error;

/// Column id → pixel width.
pub type SizeMap = BTreeMap<String, f64>;

/// Errors from resize gesture handling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResizeError {
    #[error("a resize of column {column_id} is already in progress")]
    SessionActive { column_id: String },

    #[error("no resize is in progress")]
    NoSession,

    #[error("unknown column: {column_id}")]
    UnknownColumn { column_id: String },

    #[error("column is not resizable: {column_id}")]
    NotResizable { column_id: String },
}

/// Normalized `[min, max]` width bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnBounds {
    min: f64,
    max: f64,
}

impl ColumnBounds {
    /// Build bounds, swapping inverted limits and replacing non-finite ones.
    #[must_use]
    pub fn new(min: f64, max: f64) -> Self {
        let min = if min.is_finite() { min.max(0.0) } else { 0.0 };
        let max = if max.is_finite() { max.max(0.0) } else { f64::MAX };
        if min > max {
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }

    /// Bounds declared by a catalog column.
    #[must_use]
    pub fn of(column: &ColumnDef) -> Self {
        Self::new(column.min_size, column.max_size)
    }

    #[must_use]
    pub const fn min(&self) -> f64 {
        self.min
    }

    #[must_use]
    pub const fn max(&self) -> f64 {
        self.max
    }

    /// Clamp a width into bounds; `NaN` maps to the minimum.
    #[must_use]
    pub fn clamp(&self, width: f64) -> f64 {
        if width.is_nan() {
            self.min
        } else {
            width.clamp(self.min, self.max)
        }
    }
}

/// Width of `column` before a gesture: explicit entry, then layout-computed
/// size, then the catalog default.
fn recorded_width(column: &ColumnDef, explicit: &SizeMap, computed: &SizeMap) -> f64 {
    explicit
        .get(&column.id)
        .or_else(|| computed.get(&column.id))
        .copied()
        .filter(|w| w.is_finite())
        .unwrap_or(column.default_size)
}

/// One drag gesture on one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeSession {
    column_id: String,
    start_size: f64,
    bounds: ColumnBounds,
    pinned: SizeMap,
    /// Explicit sizes at `begin`, restored on cancel.
    initial: SizeMap,
}

impl ResizeSession {
    /// Start a gesture on `column_id`.
    ///
    /// `explicit` holds the sizes recorded so far; `computed` holds the sizes
    /// the layout currently renders for columns without an explicit entry.
    pub fn begin(
        column_id: &str,
        explicit: &SizeMap,
        computed: &SizeMap,
        catalog: &ColumnCatalog,
    ) -> Result<Self, ResizeError> {
        let target = catalog
            .get(column_id)
            .ok_or_else(|| ResizeError::UnknownColumn {
                column_id: column_id.to_string(),
            })?;
        if !target.resizable {
            return Err(ResizeError::NotResizable {
                column_id: column_id.to_string(),
            });
        }

        let bounds = ColumnBounds::of(target);
        let start_size = bounds.clamp(recorded_width(target, explicit, computed));
        let pinned = catalog
            .iter()
            .filter(|c| c.resizable && c.id != column_id)
            .map(|c| (c.id.clone(), recorded_width(c, explicit, computed)))
            .collect();

        Ok(Self {
            column_id: column_id.to_string(),
            start_size,
            bounds,
            pinned,
            initial: explicit.clone(),
        })
    }

    #[must_use]
    pub fn column_id(&self) -> &str {
        &self.column_id
    }

    #[must_use]
    pub const fn start_size(&self) -> f64 {
        self.start_size
    }

    #[must_use]
    pub const fn bounds(&self) -> ColumnBounds {
        self.bounds
    }

    /// Widths of the other columns, fixed for the whole gesture.
    #[must_use]
    pub fn pinned(&self) -> &SizeMap {
        &self.pinned
    }

    /// Width of the target after a cumulative pointer delta.
    #[must_use]
    pub fn target_size(&self, pointer_delta_x: f64) -> f64 {
        let delta = if pointer_delta_x.is_finite() {
            pointer_delta_x
        } else {
            0.0
        };
        self.bounds.clamp(self.start_size + delta)
    }

    /// Size map after a cumulative pointer delta since `begin`.
    #[must_use]
    pub fn on_move(&self, pointer_delta_x: f64) -> SizeMap {
        let mut sizes = self.pinned.clone();
        sizes.insert(self.column_id.clone(), self.target_size(pointer_delta_x));
        sizes
    }
}

/// Owns the recorded column sizes and at most one active gesture.
#[derive(Debug, Clone, Default)]
pub struct ColumnSizeArbiter {
    sizes: SizeMap,
    session: Option<ResizeSession>,
}

impl ColumnSizeArbiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from previously recorded sizes.
    #[must_use]
    pub fn with_sizes(sizes: SizeMap) -> Self {
        Self {
            sizes,
            session: None,
        }
    }

    /// Current explicit sizes (last emitted map).
    #[must_use]
    pub fn sizes(&self) -> &SizeMap {
        &self.sizes
    }

    #[must_use]
    pub fn session(&self) -> Option<&ResizeSession> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn is_resizing(&self) -> bool {
        self.session.is_some()
    }

    /// Begin a gesture on `column_id`.
    pub fn begin(
        &mut self,
        column_id: &str,
        computed: &SizeMap,
        catalog: &ColumnCatalog,
    ) -> Result<&ResizeSession, ResizeError> {
        if let Some(active) = &self.session {
            return Err(ResizeError::SessionActive {
                column_id: active.column_id.clone(),
            });
        }
        let session = ResizeSession::begin(column_id, &self.sizes, computed, catalog)?;
        tracing::debug!(
            target: "tabula.resize",
            column_id = %column_id,
            start_size = session.start_size,
            pinned = session.pinned.len(),
            "resize started"
        );
        Ok(self.session.insert(session))
    }

    /// Apply a cumulative pointer delta and return the new size map.
    pub fn on_move(&mut self, pointer_delta_x: f64) -> Result<SizeMap, ResizeError> {
        let session = self.session.as_ref().ok_or(ResizeError::NoSession)?;
        let sizes = session.on_move(pointer_delta_x);
        tracing::trace!(
            target: "tabula.resize",
            column_id = %session.column_id,
            delta = pointer_delta_x,
            size = sizes.get(&session.column_id).copied().unwrap_or_default(),
            "resize moved"
        );
        self.sizes.clone_from(&sizes);
        Ok(sizes)
    }

    /// End the active gesture, keeping the last emitted sizes.
    ///
    /// Returns whether a gesture was active.
    pub fn end(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                let size = self
                    .sizes
                    .get(&session.column_id)
                    .copied()
                    .unwrap_or(session.start_size);
                tracing::debug!(
                    target: "tabula.resize",
                    column_id = %session.column_id,
                    size,
                    "resize ended"
                );
                true
            }
            None => false,
        }
    }

    /// Abort the active gesture and restore the sizes recorded at `begin`.
    pub fn cancel(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                tracing::debug!(
                    target: "tabula.resize",
                    column_id = %session.column_id,
                    "resize cancelled"
                );
                self.sizes = session.initial;
                true
            }
            None => false,
        }
    }

    /// Replace the recorded sizes, e.g. after restoring persisted state.
    pub fn set_sizes(&mut self, sizes: SizeMap) -> Result<(), ResizeError> {
        if let Some(active) = &self.session {
            return Err(ResizeError::SessionActive {
                column_id: active.column_id.clone(),
            });
        }
        self.sizes = sizes;
        Ok(())
    }

    /// Drop the explicit width of one column so its default applies again.
    pub fn reset_column(&mut self, column_id: &str) -> Result<Option<f64>, ResizeError> {
        if let Some(active) = &self.session {
            return Err(ResizeError::SessionActive {
                column_id: active.column_id.clone(),
            });
        }
        Ok(self.sizes.remove(column_id))
    }
}
