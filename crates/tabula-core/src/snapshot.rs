#![forbid(unsafe_code)]

//! View snapshots, saved views, and drift detection.
//!
//! A [`ViewSnapshot`] is the part of the working state that defines a view:
//! sorting, user-tier filters, grouping and page size. Scope filters are
//! environmental and never part of a snapshot.
//!
//! # Equivalence
//!
//! - sorting: element-wise equal, order included (it encodes priority);
//! - filters: equal after normalizing each to `(column, value)`, where
//!   structured specs compare by their JSON text, and sorting by column;
//! - group-by: equal by value.
//!
//! `page_size` is persisted with a saved view but does not take part in the
//! dirty comparison: it is treated as a display preference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::compose::dedupe_tier;
use crate::filter::{ColumnFilter, FilterSpec};
use crate::value::Scalar;

/// One entry of the sort order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortKey {
    pub column_id: String,
    pub descending: bool,
}

impl SortKey {
    #[must_use]
    pub fn asc(column_id: impl Into<String>) -> Self {
        Self {
            column_id: column_id.into(),
            descending: false,
        }
    }

    #[must_use]
    pub fn desc(column_id: impl Into<String>) -> Self {
        Self {
            column_id: column_id.into(),
            descending: true,
        }
    }
}

/// The defining configuration of a table view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewSnapshot {
    pub sorting: Vec<SortKey>,
    /// User-tier filters only.
    pub filters: Vec<ColumnFilter>,
    pub group_by: Option<String>,
    pub page_size: usize,
}

/// A named, persisted view ("routine").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedView {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub filters: Vec<ColumnFilter>,
    #[serde(default)]
    pub sorting: Vec<SortKey>,
    #[serde(default)]
    pub group_by: Option<String>,
    #[serde(default)]
    pub page_size: usize,
    /// Bound to one scope; requires `scope_id`.
    #[serde(default)]
    pub scope_fixed: bool,
    #[serde(default)]
    pub scope_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SavedView {
    /// Build a view from a snapshot. The id is assigned by the repository.
    #[must_use]
    pub fn from_snapshot(
        name: impl Into<String>,
        snapshot: &ViewSnapshot,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            description: None,
            filters: snapshot.filters.clone(),
            sorting: snapshot.sorting.clone(),
            group_by: snapshot.group_by.clone(),
            page_size: snapshot.page_size,
            scope_fixed: false,
            scope_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The live snapshot that selecting this view produces.
    #[must_use]
    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            sorting: self.sorting.clone(),
            filters: self.filters.clone(),
            group_by: self.group_by.clone(),
            page_size: self.page_size,
        }
    }

    /// Re-synchronize the defining fields from a later snapshot.
    pub fn sync_from(&mut self, snapshot: &ViewSnapshot, now: DateTime<Utc>) {
        self.filters = snapshot.filters.clone();
        self.sorting = snapshot.sorting.clone();
        self.group_by = snapshot.group_by.clone();
        self.page_size = snapshot.page_size;
        self.updated_at = now;
    }
}

/// Comparison form of one filter value.
#[derive(Debug, Clone, PartialEq)]
enum NormalizedValue {
    Scalar(Scalar),
    /// Stable JSON text of a structured spec (set, conditioned, unrecognized, absent).
    Serialized(String),
}

#[derive(Debug, Clone, PartialEq)]
struct NormalizedFilter {
    id: String,
    value: NormalizedValue,
}

fn stable_serialize(spec: Option<&FilterSpec>) -> String {
    // serde_json object maps are ordered, so equal specs produce equal text.
    serde_json::to_string(&spec).unwrap_or_default()
}

fn normalize_filters(filters: &[ColumnFilter]) -> Vec<NormalizedFilter> {
    let mut normalized: Vec<NormalizedFilter> = dedupe_tier(filters)
        .into_iter()
        .map(|f| {
            let value = match &f.spec {
                Some(FilterSpec::Exact(scalar)) => NormalizedValue::Scalar(scalar.clone()),
                other => NormalizedValue::Serialized(stable_serialize(other.as_ref())),
            };
            NormalizedFilter {
                id: f.column_id,
                value,
            }
        })
        .collect();
    normalized.sort_by(|a, b| a.id.cmp(&b.id));
    normalized
}

/// Whether two filter sets are equivalent for drift purposes.
#[must_use]
pub fn filters_equivalent(a: &[ColumnFilter], b: &[ColumnFilter]) -> bool {
    normalize_filters(a) == normalize_filters(b)
}

/// Which facets of a live view diverge from its baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Drift {
    pub sorting: bool,
    pub filters: bool,
    pub group_by: bool,
}

impl Drift {
    /// Whether anything diverged.
    #[must_use]
    pub const fn any(&self) -> bool {
        self.sorting || self.filters || self.group_by
    }
}

/// Compare a live snapshot against a saved baseline.
///
/// Without a baseline, active sorting or filters count as drift (the view is
/// worth saving); grouping alone does not.
#[must_use]
pub fn drift(live: &ViewSnapshot, baseline: Option<&SavedView>) -> Drift {
    match baseline {
        None => Drift {
            sorting: !live.sorting.is_empty(),
            filters: !live.filters.is_empty(),
            group_by: false,
        },
        Some(saved) => Drift {
            sorting: live.sorting != saved.sorting,
            filters: !filters_equivalent(&live.filters, &saved.filters),
            group_by: live.group_by != saved.group_by,
        },
    }
}

/// Whether the live view differs from its baseline.
#[must_use]
pub fn is_dirty(live: &ViewSnapshot, baseline: Option<&SavedView>) -> bool {
    drift(live, baseline).any()
}
