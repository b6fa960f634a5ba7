//! Row evaluation pipeline.
//!
//! Applies, in order: the effective filter set, the global search term,
//! multi-key sorting, grouping, and pagination. Every stage works on row
//! indices so the host's row source is never copied.

use std::cmp::Ordering;

use crate::filter::{ColumnFilter, row_matches};
use crate::snapshot::SortKey;
use crate::value::{Row, Scalar};

/// Inputs for one evaluation pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowQuery<'a> {
    /// Effective filter set (AND across columns).
    pub filters: &'a [ColumnFilter],
    /// Global search term, already debounced by the host.
    pub search: Option<&'a str>,
    /// Columns the search term is matched against.
    pub search_columns: &'a [&'a str],
    /// Terms shorter than this (in chars, after trimming) are ignored.
    pub search_min_chars: usize,
    pub sorting: &'a [SortKey],
    pub group_by: Option<&'a str>,
    pub page_index: usize,
    /// Rows per page; 0 shows every row on one page.
    pub page_size: usize,
}

/// Rows sharing one value of the grouping column.
#[derive(Debug, Clone, PartialEq)]
pub struct RowGroup {
    /// `None` collects rows where the column is absent.
    pub key: Option<Scalar>,
    pub rows: Vec<usize>,
}

/// One page of the matched rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// Zero-based, clamped to the last page.
    pub index: usize,
    pub size: usize,
    pub page_count: usize,
    pub rows: Vec<usize>,
}

/// Result of an evaluation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowModel {
    /// Every matching row, in sorted order.
    pub matched: Vec<usize>,
    /// Groups over `matched`, empty when no grouping column is set.
    pub groups: Vec<RowGroup>,
    pub page: Page,
}

impl RowModel {
    #[must_use]
    pub fn total(&self) -> usize {
        self.matched.len()
    }
}

/// Lowercased, trimmed search term, or `None` if it should be ignored.
fn normalized_term(search: Option<&str>, min_chars: usize) -> Option<String> {
    let term = search?.trim();
    if term.is_empty() || term.chars().count() < min_chars {
        return None;
    }
    Some(term.to_lowercase())
}

fn row_contains(row: &Row, columns: &[&str], term: &str) -> bool {
    columns.iter().any(|col| {
        row.get(col)
            .is_some_and(|value| value.to_string().to_lowercase().contains(term))
    })
}

/// Indices of rows passing the filters and the search term, in source order.
#[must_use]
pub fn filter_rows(rows: &[Row], query: &RowQuery<'_>) -> Vec<usize> {
    let term = normalized_term(query.search, query.search_min_chars);
    rows.iter()
        .enumerate()
        .filter(|(_, row)| row_matches(row, query.filters))
        .filter(|(_, row)| {
            term.as_deref()
                .is_none_or(|t| row_contains(row, query.search_columns, t))
        })
        .map(|(i, _)| i)
        .collect()
}

fn compare_cells(a: Option<&Scalar>, b: Option<&Scalar>, descending: bool) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        // Absent values trail in both directions.
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let ord = a.sort_cmp(b);
            if descending { ord.reverse() } else { ord }
        }
    }
}

/// Stable multi-key sort of `indices` following `sorting` priority.
pub fn sort_rows(rows: &[Row], indices: &mut [usize], sorting: &[SortKey]) {
    if sorting.is_empty() {
        return;
    }
    indices.sort_by(|&a, &b| {
        sorting
            .iter()
            .map(|key| {
                compare_cells(
                    rows[a].get(&key.column_id),
                    rows[b].get(&key.column_id),
                    key.descending,
                )
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

/// Group `indices` by `column`, in order of first appearance.
#[must_use]
pub fn group_rows(rows: &[Row], indices: &[usize], column: &str) -> Vec<RowGroup> {
    let mut groups: Vec<RowGroup> = Vec::new();
    for &i in indices {
        let key = rows[i].get(column);
        let existing = groups.iter_mut().find(|g| match (&g.key, key) {
            (None, None) => true,
            (Some(a), Some(b)) => a.sort_cmp(b).is_eq(),
            _ => false,
        });
        match existing {
            Some(group) => group.rows.push(i),
            None => groups.push(RowGroup {
                key: key.cloned(),
                rows: vec![i],
            }),
        }
    }
    groups
}

/// Slice `indices` into the requested page.
#[must_use]
pub fn paginate(indices: &[usize], page_index: usize, page_size: usize) -> Page {
    if page_size == 0 {
        return Page {
            index: 0,
            size: 0,
            page_count: 1,
            rows: indices.to_vec(),
        };
    }
    let page_count = indices.len().div_ceil(page_size).max(1);
    let index = page_index.min(page_count - 1);
    let start = index * page_size;
    let end = (start + page_size).min(indices.len());
    Page {
        index,
        size: page_size,
        page_count,
        rows: indices.get(start..end).map(<[usize]>::to_vec).unwrap_or_default(),
    }
}

/// Run the whole pipeline over `rows`.
#[must_use]
pub fn evaluate(rows: &[Row], query: &RowQuery<'_>) -> RowModel {
    let mut matched = filter_rows(rows, query);
    sort_rows(rows, &mut matched, query.sorting);
    let groups = query
        .group_by
        .map(|col| group_rows(rows, &matched, col))
        .unwrap_or_default();
    let page = paginate(&matched, query.page_index, query.page_size);

    #[cfg(feature = "tracing")]
    tracing::trace!(
        target: "tabula.filter",
        rows = rows.len(),
        matched = matched.len(),
        groups = groups.len(),
        page = page.index,
        "evaluated rows"
    );

    RowModel {
        matched,
        groups,
        page,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterSpec;

    fn orders() -> Vec<Row> {
        vec![
            Row::new().with("type", "PO").with("vendor", "Acme").with("price", 120),
            Row::new().with("type", "PR").with("vendor", "Globex").with("price", 80),
            Row::new().with("type", "SO").with("vendor", "Acme").with("price", 300),
            Row::new().with("type", "PO").with("vendor", "Initech"),
            Row::new().with("type", "PO").with("vendor", "Globex").with("price", 80),
        ]
    }

    #[test]
    fn filters_then_sorts_descending_with_absent_last() {
        let rows = orders();
        let filters = [ColumnFilter::new("type", FilterSpec::any_of(["PO", "PR"]))];
        let sorting = [SortKey::desc("price")];
        let model = evaluate(
            &rows,
            &RowQuery {
                filters: &filters,
                sorting: &sorting,
                ..RowQuery::default()
            },
        );
        // 1 and 4 tie on price; stable sort keeps source order.
        assert_eq!(model.matched, vec![0, 1, 4, 3]);
        assert_eq!(model.page.rows, model.matched);
    }

    #[test]
    fn secondary_key_breaks_ties() {
        let rows = orders();
        let sorting = [SortKey::asc("price"), SortKey::desc("vendor")];
        let mut idx: Vec<usize> = (0..rows.len()).collect();
        sort_rows(&rows, &mut idx, &sorting);
        assert_eq!(idx, vec![1, 4, 0, 2, 3]);
    }

    #[test]
    fn search_is_case_insensitive_and_respects_min_chars() {
        let rows = orders();
        let columns = ["vendor", "type"];
        let mut query = RowQuery {
            search: Some("  glo "),
            search_columns: &columns,
            search_min_chars: 2,
            ..RowQuery::default()
        };
        assert_eq!(filter_rows(&rows, &query), vec![1, 4]);

        query.search = Some("g");
        assert_eq!(filter_rows(&rows, &query).len(), rows.len());
    }

    #[test]
    fn search_matches_number_display_text() {
        let rows = orders();
        let columns = ["price"];
        let query = RowQuery {
            search: Some("300"),
            search_columns: &columns,
            ..RowQuery::default()
        };
        assert_eq!(filter_rows(&rows, &query), vec![2]);
    }

    #[test]
    fn groups_follow_sorted_order() {
        let rows = orders();
        let sorting = [SortKey::asc("vendor")];
        let model = evaluate(
            &rows,
            &RowQuery {
                sorting: &sorting,
                group_by: Some("vendor"),
                ..RowQuery::default()
            },
        );
        let keys: Vec<_> = model.groups.iter().map(|g| g.key.clone()).collect();
        assert_eq!(
            keys,
            vec![
                Some(Scalar::from("Acme")),
                Some(Scalar::from("Globex")),
                Some(Scalar::from("Initech")),
            ]
        );
        assert_eq!(model.groups[0].rows, vec![0, 2]);
    }

    #[test]
    fn absent_group_key_collects_separately() {
        let rows = orders();
        let idx: Vec<usize> = (0..rows.len()).collect();
        let groups = group_rows(&rows, &idx, "price");
        assert!(groups.iter().any(|g| g.key.is_none() && g.rows == vec![3]));
        assert!(
            groups
                .iter()
                .any(|g| g.key == Some(Scalar::from(80)) && g.rows == vec![1, 4])
        );
    }

    #[test]
    fn pagination_clamps_and_handles_zero() {
        let idx: Vec<usize> = (0..7).collect();
        let page = paginate(&idx, 1, 3);
        assert_eq!(page.rows, vec![3, 4, 5]);
        assert_eq!(page.page_count, 3);

        let clamped = paginate(&idx, 99, 3);
        assert_eq!(clamped.index, 2);
        assert_eq!(clamped.rows, vec![6]);

        let all = paginate(&idx, 4, 0);
        assert_eq!(all.rows.len(), 7);
        assert_eq!(all.page_count, 1);

        let empty = paginate(&[], 0, 10);
        assert_eq!(empty.page_count, 1);
        assert!(empty.rows.is_empty());
    }
}
