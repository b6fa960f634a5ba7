#![forbid(unsafe_code)]

//! Tabula public facade crate.
//!
//! Re-exports the types a host page needs from the internal crates and adds
//! a file-backed engine constructor plus a prelude.
//!
//! ```rust,ignore
//! use tabula::prelude::*;
//!
//! let config = EngineConfig::for_page("purchase-orders");
//! let mut engine = tabula::open_file_engine(config, catalog, "state/")?;
//! engine.set_user_filter("type", FilterSpec::any_of(["PO", "PR"]))?;
//! let model = engine.evaluate(&rows);
//! ```

use std::fmt;
use std::path::Path;

// --- Core re-exports -------------------------------------------------------

pub use tabula_core::{
    ColumnCatalog, ColumnDef, ColumnFilter, Condition, Drift, FilterLayers, FilterSpec,
    FilterTier, Page, Row, RowGroup, RowModel, RowQuery, SavedView, Scalar, SortKey,
    ViewSnapshot, compose, decompose, decompose_with_overrides, dedupe_tier, drift, is_dirty,
    matches, row_matches,
};

// --- Layout re-exports -----------------------------------------------------

pub use tabula_layout::{ColumnBounds, ColumnSizeArbiter, ResizeError, ResizeSession, SizeMap};

// --- Runtime re-exports ----------------------------------------------------

pub use tabula_runtime::{
    ConfigError, EngineConfig, FileStorage, MemoryStorage, SaveViewRequest, SavedViewRepository,
    ScopeSelection, StateKey, StateRegistry, Stateful, StorageBackend, StorageError,
    StoredViewRepository, ViewEngine, ViewError, WizardProgress, WizardSelection, WizardStep,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for tabula hosts.
#[derive(Debug)]
pub enum Error {
    /// Configuration could not be loaded.
    Config(ConfigError),
    /// Configuration loaded but failed validation.
    InvalidConfig(Vec<String>),
    /// Engine validation or storage failure.
    View(ViewError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::InvalidConfig(problems) => write!(f, "invalid config: {}", problems.join("; ")),
            Self::View(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::View(err) => Some(err),
            Self::InvalidConfig(_) => None,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<ViewError> for Error {
    fn from(err: ViewError) -> Self {
        Self::View(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Self::View(ViewError::Storage(err))
    }
}

/// Standard result type for tabula APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- File-backed engine ---------------------------------------------------

/// An engine persisting both its working view and its saved views to disk.
pub type FileEngine = ViewEngine<StoredViewRepository<FileStorage>, FileStorage>;

/// Load a TOML or JSON config file and reject invalid settings.
pub fn load_config(path: impl AsRef<Path>) -> Result<EngineConfig> {
    let config = EngineConfig::from_file(path)?;
    let problems = config.validate();
    if problems.is_empty() {
        Ok(config)
    } else {
        Err(Error::InvalidConfig(problems))
    }
}

/// Build a [`FileEngine`] storing `<page_id>.view.json` and
/// `<page_id>.routines.json` under `state_dir`.
pub fn open_file_engine(
    config: EngineConfig,
    catalog: ColumnCatalog,
    state_dir: impl AsRef<Path>,
) -> Result<FileEngine> {
    let problems = config.validate();
    if !problems.is_empty() {
        return Err(Error::InvalidConfig(problems));
    }
    let dir = state_dir.as_ref();
    let view_store = FileStorage::open(dir.join(format!("{}.view.json", config.page_id)));
    let routine_store = FileStorage::open(dir.join(format!("{}.routines.json", config.page_id)));
    let routines = StateRegistry::new(routine_store).with_prefix(config.storage_prefix.as_str());
    let repository = StoredViewRepository::open(routines, config.page_id.as_str());
    Ok(ViewEngine::new(config, catalog, repository, view_store))
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        ColumnCatalog, ColumnDef, ColumnFilter, Condition, EngineConfig, Error, FilterSpec, Result,
        Row, SaveViewRequest, SavedView, Scalar, ScopeSelection, SizeMap, SortKey, ViewEngine,
        WizardProgress,
    };

    pub use crate::{core, layout, runtime};
}

pub use tabula_core as core;
pub use tabula_layout as layout;
pub use tabula_runtime as runtime;
