#![forbid(unsafe_code)]

//! Column sizing for Tabula.
//!
//! Grid layout engines redistribute width across every column when one is
//! resized. [`ColumnSizeArbiter`] pins every other column for the length of
//! a gesture so only the dragged column moves.

pub mod resize;

pub use resize::{ColumnBounds, ColumnSizeArbiter, ResizeError, ResizeSession, SizeMap};
