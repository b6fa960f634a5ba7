use thiserror::Error;

use crate::state_persistence::StorageError;
use tabula_layout::ResizeError;

pub type Result<T> = std::result::Result<T, ViewError>;

/// Errors surfaced by [`crate::ViewEngine`] and saved-view repositories.
///
/// Degraded persistence reads and malformed filter specs are not errors;
/// they fall back to defaults.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("view name must not be empty")]
    MissingName,

    #[error("scope-fixed view requires an active scope")]
    MissingScope,

    #[error("saved view not found: {id}")]
    ViewNotFound { id: String },

    #[error("no saved view is selected")]
    NoSelection,

    #[error("unknown column: {column_id}")]
    UnknownColumn { column_id: String },

    #[error("column does not accept filters: {column_id}")]
    NotFilterable { column_id: String },

    #[error("page size {size} is not one of {options:?}")]
    InvalidPageSize { size: usize, options: Vec<usize> },

    #[error(transparent)]
    Resize(#[from] ResizeError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ViewError {
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::ViewNotFound { id: id.into() }
    }

    #[must_use]
    pub fn unknown_column(column_id: impl Into<String>) -> Self {
        Self::UnknownColumn {
            column_id: column_id.into(),
        }
    }

    /// Whether the caller can fix this by changing its input.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}
