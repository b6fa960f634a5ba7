#![forbid(unsafe_code)]

//! Column filters and the predicate evaluator.
//!
//! A [`FilterSpec`] takes one of three shapes:
//!
//! | Shape        | JSON                                   | Matches when                  |
//! |--------------|----------------------------------------|-------------------------------|
//! | exact        | `"PO"`, `5`, `true`                    | value is strictly equal       |
//! | set          | `["PO", "PR"]`                         | value is a member             |
//! | conditioned  | `{"condition":"isNot","values":[...]}` | membership, negated for isNot |
//!
//! # Invariants
//!
//! 1. An empty value list (set or conditioned) is "no constraint" and matches
//!    every row, whatever the condition.
//! 2. A missing spec (`None` / JSON `null`) matches every row.
//! 3. Any other persisted shape deserializes to [`FilterSpec::Unrecognized`]
//!    and matches every row, so a malformed filter never hides a table.
//! 4. Evaluation is pure; across columns it is a logical AND whose result does
//!    not depend on evaluation order.

use serde::{Deserialize, Serialize};

use crate::value::{Row, Scalar};

/// Membership condition of a conditioned set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    #[serde(rename = "is")]
    Is,
    #[serde(rename = "isNot")]
    IsNot,
}

/// The constraint one column places on row values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterSpec {
    /// `{condition, values}`.
    Conditioned {
        condition: Condition,
        values: Vec<Scalar>,
    },
    /// Ordered set with OR semantics.
    Set(Vec<Scalar>),
    /// Exact-match scalar.
    Exact(Scalar),
    /// Any shape not listed above.
    Unrecognized(serde_json::Value),
}

impl FilterSpec {
    /// Conditioned set with `is`.
    #[must_use]
    pub fn is<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        Self::Conditioned {
            condition: Condition::Is,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Conditioned set with `isNot`.
    #[must_use]
    pub fn is_not<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        Self::Conditioned {
            condition: Condition::IsNot,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Plain set.
    #[must_use]
    pub fn any_of<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        Self::Set(values.into_iter().map(Into::into).collect())
    }

    /// Exact scalar.
    #[must_use]
    pub fn exact(value: impl Into<Scalar>) -> Self {
        Self::Exact(value.into())
    }

    /// Whether `value` satisfies this spec.
    #[must_use]
    pub fn matches(&self, value: Option<&Scalar>) -> bool {
        match self {
            Self::Conditioned { condition, values } => {
                if values.is_empty() {
                    return true;
                }
                let is_member = contains(values, value);
                match condition {
                    Condition::Is => is_member,
                    Condition::IsNot => !is_member,
                }
            }
            Self::Set(values) => values.is_empty() || contains(values, value),
            Self::Exact(expected) => value == Some(expected),
            Self::Unrecognized(_) => true,
        }
    }

    /// Whether this spec constrains nothing.
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        match self {
            Self::Conditioned { values, .. } | Self::Set(values) => values.is_empty(),
            Self::Exact(_) => false,
            Self::Unrecognized(_) => true,
        }
    }
}

fn contains(values: &[Scalar], value: Option<&Scalar>) -> bool {
    value.is_some_and(|v| values.contains(v))
}

/// Decide whether one row value satisfies one column's spec.
///
/// `None` for `spec` means "no filter" and always matches.
#[must_use]
pub fn matches(value: Option<&Scalar>, spec: Option<&FilterSpec>) -> bool {
    spec.is_none_or(|spec| spec.matches(value))
}

/// A filter bound to one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnFilter {
    pub column_id: String,
    #[serde(default)]
    pub spec: Option<FilterSpec>,
}

impl ColumnFilter {
    #[must_use]
    pub fn new(column_id: impl Into<String>, spec: FilterSpec) -> Self {
        Self {
            column_id: column_id.into(),
            spec: Some(spec),
        }
    }

    /// A filter entry with no constraint.
    #[must_use]
    pub fn unconstrained(column_id: impl Into<String>) -> Self {
        Self {
            column_id: column_id.into(),
            spec: None,
        }
    }

    /// Evaluate this filter against the matching cell of `row`.
    #[must_use]
    pub fn matches_row(&self, row: &Row) -> bool {
        matches(row.get(&self.column_id), self.spec.as_ref())
    }
}

/// Whether `row` satisfies every filter (logical AND).
#[must_use]
pub fn row_matches(row: &Row, filters: &[ColumnFilter]) -> bool {
    filters.iter().all(|f| f.matches_row(row))
}

/// The tier a filter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterTier {
    /// Read-only, derived from the user's data perimeter.
    Scope,
    /// Copied from the selected saved view; informational provenance.
    Routine,
    /// Freely editable.
    User,
}
