//! Property-based invariant tests for the column size arbiter.
//!
//! 1. Every other column's width is bit-for-bit unchanged after every move,
//!    not only at the end of the gesture.
//! 2. The target width stays within its bounds for any delta sequence.
//! 3. The final map after `end` equals the last emitted map.
//! 4. Cancel restores the sizes recorded before `begin`.

use proptest::prelude::*;
use tabula_core::{ColumnCatalog, ColumnDef};
use tabula_layout::{ColumnBounds, ColumnSizeArbiter, SizeMap};

// ── Strategies ──────────────────────────────────────────────────────────

fn column() -> impl Strategy<Value = (f64, f64, f64)> {
    // Bounds may be inverted on purpose.
    (0.0f64..400.0, 0.0f64..400.0, 10.0f64..500.0)
}

fn setup() -> impl Strategy<Value = (ColumnCatalog, SizeMap, usize, Vec<f64>)> {
    proptest::collection::vec(column(), 2..8).prop_flat_map(|cols| {
        let n = cols.len();
        let catalog: ColumnCatalog = cols
            .iter()
            .enumerate()
            .map(|(i, (min, max, default))| {
                ColumnDef::new(format!("c{i}"))
                    .bounds(*min, *max)
                    .default_size(*default)
            })
            .collect();
        (
            Just(catalog),
            proptest::collection::vec(1.0f64..600.0, n),
            0..n,
            proptest::collection::vec(-300.0f64..300.0, 1..12),
        )
            .prop_map(|(catalog, widths, target, deltas)| {
                let sizes: SizeMap = widths
                    .into_iter()
                    .enumerate()
                    .map(|(i, w)| (format!("c{i}"), w))
                    .collect();
                (catalog, sizes, target, deltas)
            })
    })
}

// ═════════════════════════════════════════════════════════════════════════
// 1-3. Only the target moves, continuously
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn only_target_changes((catalog, start, target, deltas) in setup()) {
        let target_id = format!("c{target}");
        let mut arbiter = ColumnSizeArbiter::with_sizes(start.clone());
        arbiter.begin(&target_id, &SizeMap::new(), &catalog).unwrap();
        let bounds = ColumnBounds::of(catalog.get(&target_id).unwrap());

        let mut last = SizeMap::new();
        for delta in deltas {
            let map = arbiter.on_move(delta).unwrap();
            for (id, width) in &start {
                if *id == target_id {
                    continue;
                }
                prop_assert_eq!(map[id].to_bits(), width.to_bits(), "column {} drifted", id);
            }
            let w = map[&target_id];
            prop_assert!(w >= bounds.min() && w <= bounds.max());
            last = map;
        }

        arbiter.end();
        prop_assert_eq!(arbiter.sizes(), &last);
        prop_assert_eq!(arbiter.sizes().len(), start.len());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Cancel restores the starting map
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn cancel_restores_start((catalog, start, target, deltas) in setup()) {
        let mut arbiter = ColumnSizeArbiter::with_sizes(start.clone());
        arbiter.begin(&format!("c{target}"), &SizeMap::new(), &catalog).unwrap();
        for delta in deltas {
            arbiter.on_move(delta).unwrap();
        }
        prop_assert!(arbiter.cancel());
        prop_assert_eq!(arbiter.sizes(), &start);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// Sequential gestures keep earlier results
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn second_gesture_keeps_first_result() {
    let catalog: ColumnCatalog = [ColumnDef::new("a"), ColumnDef::new("b"), ColumnDef::new("c")]
        .into_iter()
        .collect();
    let mut arbiter = ColumnSizeArbiter::new();

    arbiter.begin("a", &SizeMap::new(), &catalog).unwrap();
    arbiter.on_move(30.0).unwrap();
    arbiter.end();
    let after_a = arbiter.sizes().clone();

    arbiter.begin("b", &SizeMap::new(), &catalog).unwrap();
    let map = arbiter.on_move(-20.0).unwrap();
    arbiter.end();

    assert_eq!(map["a"], after_a["a"]);
    assert_eq!(map["c"], after_a["c"]);
    assert_eq!(map["b"], after_a["b"] - 20.0);
}
