//! Column catalog supplied by the host page.

use serde::{Deserialize, Serialize};

/// Default width for a column without an explicit size.
pub const DEFAULT_COLUMN_SIZE: f64 = 150.0;
/// Default lower bound for column widths.
pub const DEFAULT_MIN_SIZE: f64 = 40.0;
/// Default upper bound for column widths.
pub const DEFAULT_MAX_SIZE: f64 = 800.0;

/// One column as declared by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnDef {
    pub id: String,
    pub label: String,
    pub min_size: f64,
    pub max_size: f64,
    pub default_size: f64,
    /// Whether the column may carry a filter.
    pub filterable: bool,
    /// Whether the column takes part in resize gestures.
    pub resizable: bool,
    /// Whether the global search looks at this column.
    pub searchable: bool,
}

impl Default for ColumnDef {
    fn default() -> Self {
        Self {
            id: String::new(),
            label: String::new(),
            min_size: DEFAULT_MIN_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            default_size: DEFAULT_COLUMN_SIZE,
            filterable: true,
            resizable: true,
            searchable: true,
        }
    }
}

impl ColumnDef {
    /// A filterable, resizable, searchable column labelled with its id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set `[min, max]` width bounds.
    #[must_use]
    pub fn bounds(mut self, min_size: f64, max_size: f64) -> Self {
        self.min_size = min_size;
        self.max_size = max_size;
        self
    }

    #[must_use]
    pub fn default_size(mut self, size: f64) -> Self {
        self.default_size = size;
        self
    }

    #[must_use]
    pub fn filterable(mut self, filterable: bool) -> Self {
        self.filterable = filterable;
        self
    }

    #[must_use]
    pub fn resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }

    #[must_use]
    pub fn searchable(mut self, searchable: bool) -> Self {
        self.searchable = searchable;
        self
    }
}

/// Ordered list of columns with lookup by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnCatalog {
    columns: Vec<ColumnDef>,
}

impl ColumnCatalog {
    #[must_use]
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self { columns }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter()
    }

    /// Ids of the columns the global search inspects, in catalog order.
    #[must_use]
    pub fn searchable_ids(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.searchable)
            .map(|c| c.id.as_str())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<ColumnDef> for ColumnCatalog {
    fn from_iter<I: IntoIterator<Item = ColumnDef>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
