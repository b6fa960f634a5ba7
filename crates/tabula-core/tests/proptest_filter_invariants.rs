//! Property-based invariant tests for filter evaluation and composition.
//!
//! 1. Empty value sets (plain or conditioned) match every value.
//! 2. Set membership: members match, non-members do not.
//! 3. `isNot` is the exact negation of `is` for non-empty sets.
//! 4. AND composition: a row matches two filters iff it matches each.
//! 5. `decompose(compose(scope, user), scope)` restores the user entries on
//!    columns scope does not own.
//! 6. A saved view round-tripped into a live snapshot is never dirty.
//! 7. Composition never depends on evaluation order of distinct columns.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use tabula_core::{
    ColumnFilter, Condition, FilterSpec, Row, SavedView, Scalar, SortKey, ViewSnapshot, compose,
    decompose, is_dirty, matches, row_matches,
};

// ── Strategies ──────────────────────────────────────────────────────────

fn scalar() -> impl Strategy<Value = Scalar> {
    prop_oneof![
        any::<bool>().prop_map(Scalar::Bool),
        (-50i32..50).prop_map(Scalar::from),
        "[a-d]{1,2}".prop_map(Scalar::Text),
    ]
}

fn value_set() -> impl Strategy<Value = Vec<Scalar>> {
    proptest::collection::vec(scalar(), 1..6)
}

fn spec() -> impl Strategy<Value = FilterSpec> {
    prop_oneof![
        scalar().prop_map(FilterSpec::Exact),
        proptest::collection::vec(scalar(), 0..4).prop_map(FilterSpec::Set),
        (
            prop_oneof![Just(Condition::Is), Just(Condition::IsNot)],
            proptest::collection::vec(scalar(), 0..4)
        )
            .prop_map(|(condition, values)| FilterSpec::Conditioned { condition, values }),
    ]
}

/// Filters on distinct columns drawn from a small pool so tiers overlap.
fn tier() -> impl Strategy<Value = Vec<ColumnFilter>> {
    proptest::collection::btree_map("c[0-7]", spec(), 0..6).prop_map(|m| {
        m.into_iter()
            .map(|(column, spec)| ColumnFilter::new(column, spec))
            .collect()
    })
}

fn sorting() -> impl Strategy<Value = Vec<SortKey>> {
    proptest::collection::vec(
        ("c[0-7]", any::<bool>()).prop_map(|(column_id, descending)| SortKey {
            column_id,
            descending,
        }),
        0..4,
    )
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Empty sets are "no constraint"
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn empty_sets_match_any_value(value in proptest::option::of(scalar())) {
        prop_assert!(matches(value.as_ref(), Some(&FilterSpec::Set(vec![]))));
        prop_assert!(matches(value.as_ref(), Some(&FilterSpec::is(Vec::<Scalar>::new()))));
        prop_assert!(matches(value.as_ref(), Some(&FilterSpec::is_not(Vec::<Scalar>::new()))));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Set membership
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn set_membership(values in value_set(), probe in scalar()) {
        let spec = FilterSpec::Set(values.clone());
        for v in &values {
            prop_assert!(matches(Some(v), Some(&spec)));
        }
        prop_assert_eq!(matches(Some(&probe), Some(&spec)), values.contains(&probe));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. isNot negates is
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn is_not_negates_is(values in value_set(), probe in proptest::option::of(scalar())) {
        let is = FilterSpec::is(values.clone());
        let is_not = FilterSpec::is_not(values);
        prop_assert_eq!(
            matches(probe.as_ref(), Some(&is_not)),
            !matches(probe.as_ref(), Some(&is))
        );
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. AND composition across columns
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn and_composition(a in scalar(), b in scalar(), fa in spec(), fb in spec()) {
        let row = Row::new().with("a", a.clone()).with("b", b.clone());
        let f1 = ColumnFilter::new("a", fa.clone());
        let f2 = ColumnFilter::new("b", fb.clone());
        let both = row_matches(&row, &[f1.clone(), f2.clone()]);
        prop_assert_eq!(both, fa.matches(Some(&a)) && fb.matches(Some(&b)));
        prop_assert_eq!(both, row_matches(&row, &[f2, f1]));
    }
}

#[test]
fn and_composition_row_satisfying_one_filter() {
    let row = Row::new().with("type", "PO").with("plant", "B");
    let f1 = ColumnFilter::new("type", FilterSpec::any_of(["PO", "PR"]));
    let f2 = ColumnFilter::new("plant", FilterSpec::exact("A"));
    assert!(f1.matches_row(&row));
    assert!(!f2.matches_row(&row));
    assert!(!row_matches(&row, &[f1, f2]));
}

// ═════════════════════════════════════════════════════════════════════════
// 5. decompose inverts compose on user-owned columns
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn decompose_restores_user_only_entries(scope in tier(), user in tier()) {
        let effective = compose(&scope, &user);
        let restored = decompose(&effective, &scope);
        let expected: Vec<ColumnFilter> = user
            .iter()
            .filter(|u| !scope.iter().any(|s| s.column_id == u.column_id))
            .cloned()
            .collect();
        prop_assert_eq!(restored, expected);
    }

    #[test]
    fn compose_user_wins_everywhere(scope in tier(), user in tier()) {
        let effective = compose(&scope, &user);
        for u in &user {
            let hits: Vec<_> = effective.iter().filter(|e| e.column_id == u.column_id).collect();
            prop_assert_eq!(hits.len(), 1);
            prop_assert_eq!(hits[0], u);
        }
        for s in &scope {
            if !user.iter().any(|u| u.column_id == s.column_id) {
                prop_assert!(effective.contains(s));
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Drift detector is reflexive
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn saved_view_round_trip_is_clean(
        filters in tier(),
        sorting in sorting(),
        group_by in proptest::option::of("c[0-7]"),
        page_size in 0usize..200,
    ) {
        let snapshot = ViewSnapshot { sorting, filters, group_by, page_size };
        let now = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
        let view = SavedView::from_snapshot("view", &snapshot, now);
        prop_assert!(!is_dirty(&view.snapshot(), Some(&view)));

        // Survives the JSON exchange format too.
        let json = serde_json::to_string(&view).unwrap();
        let back: SavedView = serde_json::from_str(&json).unwrap();
        prop_assert!(!is_dirty(&back.snapshot(), Some(&view)));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// Concrete scenarios
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn scope_plant_overridden_by_user() {
    let scope = vec![ColumnFilter::new("plant", FilterSpec::exact("A"))];
    let user = vec![ColumnFilter::new("plant", FilterSpec::exact("B"))];
    let effective = compose(&scope, &user);
    assert_eq!(effective, vec![ColumnFilter::new("plant", FilterSpec::exact("B"))]);
}
