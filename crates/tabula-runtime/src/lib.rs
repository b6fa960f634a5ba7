#![forbid(unsafe_code)]

//! Runtime for tabula views: persistence, saved views, wizard progress,
//! configuration, and the [`ViewEngine`] a page drives.
//!
//! # Role in tabula
//! `tabula-runtime` ties the pure pieces of `tabula-core` and
//! `tabula-layout` to durable storage. A host page builds one [`ViewEngine`]
//! from an [`EngineConfig`], its column catalog, a [`SavedViewRepository`],
//! and a [`StorageBackend`], then forwards user intents to it.
//!
//! # How it fits in the system
//! Everything is synchronous and single-owner. Storage reads that fail
//! degrade to defaults with a warning; only writes and validation problems
//! surface as errors.

pub mod config;
pub mod engine;
pub mod error;
pub mod routines;
pub mod state_persistence;
pub mod wizard;

pub use config::{ConfigError, EngineConfig};
pub use engine::{
    SaveViewRequest, ScopeSelection, ViewEngine, WorkingView, WorkingViewState,
};
pub use error::{Result, ViewError};
pub use routines::{SavedViewRepository, StoredViewRepository, validate_view};
pub use state_persistence::{
    FileStorage, MemoryStorage, StateKey, StateRegistry, Stateful, StorageBackend, StorageError,
    StorageResult,
};
pub use wizard::{WizardPersistState, WizardProgress, WizardSelection, WizardStep};
