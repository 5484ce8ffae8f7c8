//! Header mapping onto the incident schema
//!
//! Header wording drifts between reports ("PRODUCT CATEGORY", "CATEGORY",
//! "NOTIFIED BY", "NOTIFYING COUNTRY" ...), so cells are matched by substring
//! in either direction rather than by equality.

use crate::tables::Grid;
use crate::ExtractionConfig;
use std::fmt;

/// Canonical column of an incident table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetColumn {
    Classification,
    ProductCategory,
    Commodity,
    Issue,
    Origin,
    NotifiedBy,
}

impl TargetColumn {
    pub const COUNT: usize = 6;

    /// All columns, in matching priority order
    pub const ALL: [TargetColumn; TargetColumn::COUNT] = [
        TargetColumn::Classification,
        TargetColumn::ProductCategory,
        TargetColumn::Commodity,
        TargetColumn::Issue,
        TargetColumn::Origin,
        TargetColumn::NotifiedBy,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Upper-case header labels this column answers to
    pub fn labels(self) -> &'static [&'static str] {
        match self {
            TargetColumn::Classification => &["CLASSIFICATION"],
            TargetColumn::ProductCategory => &["PRODUCT CATEGORY"],
            TargetColumn::Commodity => &["COMMODITY"],
            TargetColumn::Issue => &["ISSUE"],
            TargetColumn::Origin => &["ORIGIN"],
            TargetColumn::NotifiedBy => &["NOTIFIED BY", "NOTIFYING COUNTRY"],
        }
    }

    /// Columns whose labels are visually merged down many rows
    pub fn is_grouping(self) -> bool {
        matches!(
            self,
            TargetColumn::Classification | TargetColumn::ProductCategory
        )
    }
}

/// Binding of target columns to grid column indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderMapping {
    indices: [Option<usize>; TargetColumn::COUNT],
}

impl HeaderMapping {
    /// Grid column bound to `column`, if any
    pub fn index_of(&self, column: TargetColumn) -> Option<usize> {
        self.indices[column.index()]
    }

    pub fn is_bound(&self, column: TargetColumn) -> bool {
        self.index_of(column).is_some()
    }

    /// Number of target columns bound to a grid column
    pub fn bound_count(&self) -> usize {
        self.indices.iter().filter(|i| i.is_some()).count()
    }

    /// Bind `column` to `index` unless already bound
    pub fn bind(&mut self, column: TargetColumn, index: usize) -> bool {
        let slot = &mut self.indices[column.index()];
        if slot.is_some() {
            return false;
        }
        *slot = Some(index);
        true
    }

    pub fn bound_columns(&self) -> impl Iterator<Item = (TargetColumn, usize)> + '_ {
        TargetColumn::ALL
            .iter()
            .filter_map(move |&col| self.index_of(col).map(|idx| (col, idx)))
    }
}

/// Why a grid was not accepted as an incident table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridRejection {
    /// Header-only or empty grid
    TooFewRows { rows: usize },
    /// Header row bound fewer target columns than required
    InsufficientHeaders { matched: usize },
}

impl fmt::Display for GridRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridRejection::TooFewRows { rows } => write!(f, "grid has only {} row(s)", rows),
            GridRejection::InsufficientHeaders { matched } => {
                write!(f, "header matched only {} target column(s)", matched)
            }
        }
    }
}

/// Normalize a header cell for matching: upper-case, single spaces
fn normalize_header_cell(cell: &str) -> String {
    cell.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

fn cell_matches(cell: &str, label: &str) -> bool {
    cell.contains(label) || label.contains(cell)
}

/// Map the first row of `header` onto the target schema.
///
/// Each cell binds at most one target column: the first column, in
/// [`TargetColumn::ALL`] order, that is still unbound and whose label matches.
pub fn map_header_row(header: &[Option<String>]) -> HeaderMapping {
    let mut mapping = HeaderMapping::default();

    for (idx, cell) in header.iter().enumerate() {
        let Some(cell) = cell.as_deref() else {
            continue;
        };
        let cell = normalize_header_cell(cell);
        if cell.is_empty() {
            continue;
        }

        let target = TargetColumn::ALL.iter().copied().find(|&col| {
            !mapping.is_bound(col) && col.labels().iter().any(|label| cell_matches(&cell, label))
        });

        if let Some(col) = target {
            mapping.bind(col, idx);
        }
    }

    mapping
}

/// Accept or reject a grid as an incident table
pub fn map_grid(grid: &Grid, config: &ExtractionConfig) -> Result<HeaderMapping, GridRejection> {
    if grid.rows.len() < config.min_grid_rows {
        return Err(GridRejection::TooFewRows {
            rows: grid.rows.len(),
        });
    }

    let mapping = map_header_row(&grid.rows[0]);
    let matched = mapping.bound_count();
    if matched < config.min_header_matches {
        return Err(GridRejection::InsufficientHeaders { matched });
    }

    Ok(mapping)
}
