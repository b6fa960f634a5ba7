#![forbid(unsafe_code)]

//! Engine configuration loaded from TOML or JSON.
//!
//! ```toml
//! # tabula.toml
//! page_id = "purchase-orders"
//! default_page_size = 50
//! page_size_options = [25, 50, 100]
//! autosave = true
//! ```
//!
//! ```rust,ignore
//! let config = EngineConfig::from_toml_file("tabula.toml")?;
//! let problems = config.validate();
//! ```
//!
//! Missing keys take their defaults, so an empty document is a valid
//! configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading an [`EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settings for one [`crate::ViewEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Page the engine serves; keys persisted state and saved views.
    pub page_id: String,
    pub default_page_size: usize,
    /// Page sizes the host offers; `set_page_size` accepts only these.
    pub page_size_options: Vec<usize>,
    /// Persist the working view after every mutation.
    pub autosave: bool,
    /// Search terms shorter than this are ignored.
    pub search_min_chars: usize,
    /// Prefix for every storage key; empty for none.
    pub storage_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_id: "default".into(),
            default_page_size: 25,
            page_size_options: vec![10, 25, 50, 100],
            autosave: true,
            search_min_chars: 2,
            storage_prefix: "tabula".into(),
        }
    }
}

impl EngineConfig {
    /// Defaults for `page_id`.
    #[must_use]
    pub fn for_page(page_id: impl Into<String>) -> Self {
        Self {
            page_id: page_id.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Load by file extension: `.json` as JSON, anything else as TOML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Problems with this configuration; empty when valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.page_id.trim().is_empty() {
            errors.push("page_id must not be empty".into());
        }
        if self.page_size_options.is_empty() {
            errors.push("page_size_options must not be empty".into());
        }
        if self.page_size_options.contains(&0) {
            errors.push("page_size_options must not contain 0".into());
        }
        if self.default_page_size == 0 {
            errors.push("default_page_size must be > 0".into());
        } else if !self.page_size_options.contains(&self.default_page_size) {
            errors.push(format!(
                "default_page_size {} must be one of page_size_options {:?}",
                self.default_page_size, self.page_size_options
            ));
        }

        errors
    }

    /// Whether `size` is an offered page size.
    #[must_use]
    pub fn allows_page_size(&self, size: usize) -> bool {
        self.page_size_options.contains(&size)
    }
}
