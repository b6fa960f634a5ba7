#![forbid(unsafe_code)]

//! Core: scalars, rows, filter specs, and the view-state composition engine.
//!
//! # Role in Tabula
//! `tabula-core` holds every pure operation over view state. Nothing in this
//! crate touches storage or keeps sessions; the runtime crate wires these
//! functions to persistence and exposes them to hosts.
//!
//! # Primary responsibilities
//! - **Predicate evaluation**: [`filter::matches`] decides whether one value
//!   satisfies one column's [`FilterSpec`](filter::FilterSpec).
//! - **Tier composition**: [`compose::compose`] merges scope and user filters,
//!   [`compose::decompose`] recovers the user-owned portion.
//! - **Drift detection**: [`snapshot::is_dirty`] compares a live
//!   [`ViewSnapshot`](snapshot::ViewSnapshot) against a saved baseline.
//! - **Row pipeline**: [`pipeline::evaluate`] filters, searches, sorts, groups
//!   and paginates a row source into index lists.

pub mod catalog;
pub mod compose;
pub mod filter;
pub mod pipeline;
pub mod snapshot;
pub mod value;

pub use catalog::{ColumnCatalog, ColumnDef};
pub use compose::{FilterLayers, compose, decompose, decompose_with_overrides, dedupe_tier};
pub use filter::{ColumnFilter, Condition, FilterSpec, FilterTier, matches, row_matches};
pub use pipeline::{Page, RowGroup, RowModel, RowQuery, evaluate};
pub use snapshot::{Drift, SavedView, SortKey, ViewSnapshot, drift, is_dirty};
pub use value::{Row, Scalar};
