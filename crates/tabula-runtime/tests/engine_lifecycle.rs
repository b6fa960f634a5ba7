//! Lifecycle tests for the view engine: reload, autosave, degraded storage.
//!
//! 1. A working view survives an engine rebuild over the same storage.
//! 2. A selection whose saved view vanished is dropped on reload.
//! 3. Autosave failures are logged and never fail the mutation.
//! 4. Corrupt or out-of-range persisted state falls back to defaults.
//! 5. Sort toggling never produces two keys for one column.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use tabula_core::{ColumnCatalog, ColumnDef, FilterSpec, SortKey};
use tabula_layout::SizeMap;
use tabula_runtime::{
    EngineConfig, FileStorage, MemoryStorage, SaveViewRequest, SavedViewRepository,
    ScopeSelection, StateRegistry, StorageBackend, StorageError, StorageResult,
    StoredViewRepository, ViewEngine,
};
use tracing_subscriber::layer::SubscriberExt;

// ── Helpers ─────────────────────────────────────────────────────────────

fn catalog() -> ColumnCatalog {
    [
        ColumnDef::new("type"),
        ColumnDef::new("plant"),
        ColumnDef::new("vendor").bounds(80.0, 400.0),
        ColumnDef::new("price").default_size(100.0),
    ]
    .into_iter()
    .collect()
}

fn config() -> EngineConfig {
    EngineConfig::for_page("orders")
}

type MemEngine = ViewEngine<StoredViewRepository<MemoryStorage>, MemoryStorage>;

/// Rebuild an engine over copies of another engine's stores.
fn reload(engine: &MemEngine) -> MemEngine {
    let routines = StateRegistry::new(engine.repository().registry().backend().clone())
        .with_prefix("tabula");
    ViewEngine::new(
        config(),
        catalog(),
        StoredViewRepository::open(routines, "orders"),
        engine.registry().backend().clone(),
    )
}

/// Backend that refuses every write.
#[derive(Debug, Default)]
struct FullDisk;

impl StorageBackend for FullDisk {
    fn name(&self) -> &str {
        "full-disk"
    }
    fn get(&self, _key: &str) -> StorageResult<Option<String>> {
        Ok(None)
    }
    fn set(&mut self, _key: &str, _value: String) -> StorageResult<()> {
        Err(StorageError::Unavailable("no space left".into()))
    }
    fn remove(&mut self, _key: &str) -> StorageResult<()> {
        Ok(())
    }
}

struct WarnCapture {
    targets: Arc<Mutex<Vec<String>>>,
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarnCapture {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if *event.metadata().level() == tracing::Level::WARN {
            self.targets
                .lock()
                .unwrap()
                .push(event.metadata().target().to_string());
        }
    }
}

fn capture_warn_targets<F: FnOnce()>(f: F) -> Vec<String> {
    let targets = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(WarnCapture {
        targets: targets.clone(),
    });
    tracing::subscriber::with_default(subscriber, f);
    let out = targets.lock().unwrap().clone();
    out
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Reload restores the working view
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn working_view_survives_rebuild() {
    let mut engine = ViewEngine::in_memory(config(), catalog());
    engine.set_user_filter("type", FilterSpec::any_of(["PO", "PR"])).unwrap();
    engine.toggle_sort("price", false).unwrap();
    engine.toggle_sort("price", false).unwrap();
    engine.set_group_by(Some("vendor".into())).unwrap();
    engine.set_page_size(50).unwrap();
    engine.resize_begin("vendor").unwrap();
    engine.resize_move(40.0).unwrap();
    engine.resize_end();

    let restored = reload(&engine);
    assert_eq!(restored.user_filters(), engine.user_filters());
    assert_eq!(restored.sorting(), &[SortKey::desc("price")]);
    assert_eq!(restored.group_by(), Some("vendor"));
    assert_eq!(restored.page_size(), 50);
    assert_eq!(restored.column_sizes(), engine.column_sizes());
    assert_eq!(restored.column_sizes()["vendor"], 190.0);
}

#[test]
fn scope_and_search_are_not_persisted() {
    let mut engine = ViewEngine::in_memory(config(), catalog());
    engine.set_scope(Some(ScopeSelection::new(
        "plant-a",
        vec![tabula_core::ColumnFilter::new("plant", FilterSpec::exact("A"))],
    )));
    engine.set_search("acme");
    engine.set_page(2);

    let restored = reload(&engine);
    assert!(restored.scope().is_none());
    assert_eq!(restored.search(), "");
    assert_eq!(restored.page_index(), 2);
    assert!(restored.effective_filters().is_empty());
}

#[test]
fn scope_or_search_change_persists_page_reset() {
    let mut engine = ViewEngine::in_memory(config(), catalog());
    engine.set_page(3);
    engine.set_scope(Some(ScopeSelection::new("plant-b", vec![])));
    assert_eq!(engine.page_index(), 0);
    assert_eq!(reload(&engine).page_index(), 0);

    engine.set_page(4);
    engine.set_search("acme");
    assert_eq!(reload(&engine).page_index(), 0);
}

#[test]
fn file_backed_engine_survives_process_restart() {
    let dir = tempfile::tempdir().unwrap();
    let view_path = dir.path().join("orders.view.json");
    let routine_path = dir.path().join("orders.routines.json");

    let open = || {
        let routines = StateRegistry::new(FileStorage::open(&routine_path)).with_prefix("tabula");
        ViewEngine::new(
            config(),
            catalog(),
            StoredViewRepository::open(routines, "orders"),
            FileStorage::open(&view_path),
        )
    };

    let mut engine = open();
    engine.set_user_filter("plant", FilterSpec::exact("B")).unwrap();
    let saved = engine
        .save_current_as_view(SaveViewRequest::named("Plant B"))
        .unwrap();
    engine.toggle_sort("vendor", false).unwrap();
    drop(engine);

    let engine = open();
    assert_eq!(engine.selected_view().map(|v| v.id.clone()), Some(saved.id));
    assert_eq!(engine.saved_views().len(), 1);
    assert_eq!(engine.sorting(), &[SortKey::asc("vendor")]);
    assert!(engine.is_dirty());
    assert!(engine.drift().sorting);
    assert!(!engine.drift().filters);
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Vanished selection
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn selection_of_deleted_view_is_dropped_on_reload() {
    let mut engine = ViewEngine::in_memory(config(), catalog());
    engine.set_user_filter("type", FilterSpec::exact("PO")).unwrap();
    let saved = engine.save_current_as_view(SaveViewRequest::named("POs")).unwrap();

    // Another tab deletes the view behind this engine's back.
    let mut routines = StoredViewRepository::open(
        StateRegistry::new(engine.repository().registry().backend().clone()).with_prefix("tabula"),
        "orders",
    );
    assert!(routines.delete(&saved.id).unwrap());

    let view_backend = engine.registry().backend().clone();
    let restored = ViewEngine::new(config(), catalog(), routines, view_backend);
    assert!(restored.selected_view().is_none());
    assert!(restored.filter_layers().routine.is_empty());
    // The live filters themselves are kept.
    assert_eq!(restored.user_filters().len(), 1);
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Autosave failures
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn autosave_failure_is_logged_not_returned() {
    let routines = StoredViewRepository::open(StateRegistry::new(MemoryStorage::new()), "orders");
    let mut engine = ViewEngine::new(config(), catalog(), routines, FullDisk);

    let targets = capture_warn_targets(|| {
        engine.set_user_filter("type", FilterSpec::exact("PO")).unwrap();
        engine.toggle_sort("price", true).unwrap();
    });
    assert_eq!(targets, vec!["tabula.engine".to_string(); 2]);
    assert_eq!(engine.user_filters().len(), 1);
    assert!(engine.persist().is_err());
}

#[test]
fn autosave_off_defers_writes() {
    let config = EngineConfig {
        autosave: false,
        ..config()
    };
    let mut engine = ViewEngine::in_memory(config.clone(), catalog());
    engine.set_user_filter("type", FilterSpec::exact("PO")).unwrap();
    assert!(engine.registry().backend().is_empty());

    engine.persist().unwrap();
    assert_eq!(engine.registry().backend().len(), 1);
    assert!(
        engine
            .registry()
            .backend()
            .get("tabula::view::orders")
            .unwrap()
            .is_some()
    );
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Degraded reads
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn corrupt_working_view_starts_from_defaults() {
    let mut backend = MemoryStorage::new();
    backend
        .set("tabula::view::orders", "{\"sorting\": [".into())
        .unwrap();
    let routines = StoredViewRepository::open(StateRegistry::new(MemoryStorage::new()), "orders");

    let mut engine = None;
    let targets = capture_warn_targets(|| {
        engine = Some(ViewEngine::new(config(), catalog(), routines, backend));
    });
    let engine = engine.unwrap();
    assert_eq!(targets, vec!["tabula.persist".to_string()]);
    assert!(engine.sorting().is_empty());
    assert_eq!(engine.page_size(), 25);
}

#[test]
fn unknown_page_size_falls_back_to_default() {
    let mut backend = MemoryStorage::new();
    backend
        .set("tabula::view::orders", r#"{"pageSize":7,"groupBy":"plant"}"#.into())
        .unwrap();
    let routines = StoredViewRepository::open(StateRegistry::new(MemoryStorage::new()), "orders");
    let engine = ViewEngine::new(config(), catalog(), routines, backend);
    assert_eq!(engine.page_size(), 25);
    assert_eq!(engine.group_by(), Some("plant"));
}

#[test]
fn cancelled_resize_is_not_persisted() {
    let mut engine = ViewEngine::in_memory(config(), catalog());
    let mut sizes = SizeMap::new();
    sizes.insert("type".into(), 120.0);
    engine.set_computed_sizes(sizes);

    engine.resize_begin("type").unwrap();
    engine.resize_move(60.0).unwrap();
    assert!(engine.resize_cancel());
    assert!(engine.column_sizes().is_empty());
    assert!(reload(&engine).column_sizes().is_empty());
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Sort toggling
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn toggle_sort_keeps_one_key_per_column(
        clicks in proptest::collection::vec(
            (
                prop_oneof![Just("type"), Just("plant"), Just("vendor"), Just("price")],
                any::<bool>(),
            ),
            0..24,
        )
    ) {
        let mut engine = ViewEngine::in_memory(config(), catalog());
        for (column, additive) in clicks {
            let next = engine.toggle_sort(column, additive).unwrap();
            let hits: Vec<_> = engine.sorting().iter().filter(|k| k.column_id == column).collect();
            match next {
                Some(key) => {
                    prop_assert_eq!(hits.len(), 1);
                    prop_assert_eq!(hits[0], &key);
                }
                None => prop_assert!(hits.is_empty()),
            }
            if !additive {
                prop_assert!(engine.sorting().len() <= 1);
            }
            let mut ids: Vec<_> = engine.sorting().iter().map(|k| &k.column_id).collect();
            ids.sort();
            ids.dedup();
            prop_assert_eq!(ids.len(), engine.sorting().len());
        }
    }
}
