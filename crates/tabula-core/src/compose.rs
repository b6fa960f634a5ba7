//! Filter tier composition.
//!
//! Row evaluation only ever sees two tiers: `scope` and `user`. Selecting a
//! saved view copies its filters into the user tier, so the routine tier is
//! kept for provenance only.
//!
//! # Invariants
//!
//! 1. For a column present in both tiers, [`compose`] yields exactly the user
//!    entry, at the scope entry's position.
//! 2. Columns present only in scope keep their scope entry; user-only columns
//!    are appended in user order.
//! 3. `decompose(compose(scope, user), scope)` returns the user entries whose
//!    columns scope does not own.
//! 4. No operation mutates its inputs.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::filter::{ColumnFilter, FilterTier};

/// Collapse duplicate columns within one tier.
///
/// The later entry wins, at the position of the first occurrence.
#[must_use]
pub fn dedupe_tier(filters: &[ColumnFilter]) -> Vec<ColumnFilter> {
    let mut out: Vec<ColumnFilter> = Vec::with_capacity(filters.len());
    for filter in filters {
        match out.iter_mut().find(|f| f.column_id == filter.column_id) {
            Some(existing) => existing.spec.clone_from(&filter.spec),
            None => out.push(filter.clone()),
        }
    }
    out
}

/// Merge scope and user filters into the effective filter set (user wins).
#[must_use]
pub fn compose(scope: &[ColumnFilter], user: &[ColumnFilter]) -> Vec<ColumnFilter> {
    let mut effective = dedupe_tier(scope);
    for filter in user {
        match effective
            .iter_mut()
            .find(|f| f.column_id == filter.column_id)
        {
            Some(existing) => *existing = filter.clone(),
            None => effective.push(filter.clone()),
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(
        target: "tabula.filter",
        scope = scope.len(),
        user = user.len(),
        effective = effective.len(),
        "composed filter tiers"
    );

    effective
}

/// Strip every scope-owned column from an effective set.
///
/// Used when the grid reports a whole new effective set: scope columns are
/// never promoted into user ownership, and a column the user cleared falls
/// back to its scope value on the next [`compose`].
#[must_use]
pub fn decompose(effective: &[ColumnFilter], scope: &[ColumnFilter]) -> Vec<ColumnFilter> {
    let scope_ids = scope_ids(scope);
    effective
        .iter()
        .filter(|f| !scope_ids.contains(f.column_id.as_str()))
        .cloned()
        .collect()
}

/// Like [`decompose`], but keeps scope-owned columns whose spec was edited.
///
/// A scope column surviving in `effective` with a spec different from the
/// scope's is a user override and stays in the user tier. A scope column
/// whose spec still equals the scope spec is dropped.
#[must_use]
pub fn decompose_with_overrides(
    effective: &[ColumnFilter],
    scope: &[ColumnFilter],
) -> Vec<ColumnFilter> {
    let scope = dedupe_tier(scope);
    effective
        .iter()
        .filter(|f| match scope.iter().find(|s| s.column_id == f.column_id) {
            Some(owned) => owned.spec != f.spec,
            None => true,
        })
        .cloned()
        .collect()
}

fn scope_ids(scope: &[ColumnFilter]) -> FxHashSet<&str> {
    scope.iter().map(|f| f.column_id.as_str()).collect()
}

/// All three filter tiers, for provenance display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterLayers {
    pub scope: Vec<ColumnFilter>,
    pub routine: Vec<ColumnFilter>,
    pub user: Vec<ColumnFilter>,
}

impl FilterLayers {
    /// The filters of one tier.
    #[must_use]
    pub fn tier(&self, tier: FilterTier) -> &[ColumnFilter] {
        match tier {
            FilterTier::Scope => &self.scope,
            FilterTier::Routine => &self.routine,
            FilterTier::User => &self.user,
        }
    }

    /// Which tier supplies the effective filter for `column_id`, if any.
    #[must_use]
    pub fn owner_of(&self, column_id: &str) -> Option<FilterTier> {
        if self.user.iter().any(|f| f.column_id == column_id) {
            Some(FilterTier::User)
        } else if self.scope.iter().any(|f| f.column_id == column_id) {
            Some(FilterTier::Scope)
        } else {
            None
        }
    }

    /// The effective set (`user > scope`).
    #[must_use]
    pub fn effective(&self) -> Vec<ColumnFilter> {
        compose(&self.scope, &self.user)
    }
}
