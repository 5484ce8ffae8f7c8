//! Merged-cell reconstruction
//!
//! Report tables merge the leftmost grouping cells (classification, product
//! category) vertically across many rows. Extracted grids show those merged
//! cells as blanks below the first row, so the last seen value is carried
//! forward until a new one appears.

use crate::header::{HeaderMapping, TargetColumn};
use crate::model::FraudType;
use crate::tables::GridRow;
use crate::ExtractionConfig;
use std::collections::HashMap;

/// Last non-blank value seen per target column within the current section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarryForward {
    last: HashMap<TargetColumn, String>,
}

impl CarryForward {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every carried value, including the running classification
    pub fn reset(&mut self) {
        self.last.clear();
    }

    pub fn get(&self, column: TargetColumn) -> Option<&str> {
        self.last.get(&column).map(String::as_str)
    }

    /// Running classification value
    pub fn classification(&self) -> Option<&str> {
        self.get(TargetColumn::Classification)
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }

    fn record(&mut self, column: TargetColumn, value: &str) {
        self.last.insert(column, value.to_string());
    }
}

/// A table row with every bound target column resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructedRow {
    pub fraud_type: FraudType,
    values: [String; TargetColumn::COUNT],
}

impl ReconstructedRow {
    pub fn new(fraud_type: FraudType) -> Self {
        Self {
            fraud_type,
            values: Default::default(),
        }
    }

    /// Builder-style setter, mostly useful for assembling rows by hand
    pub fn with(mut self, column: TargetColumn, value: impl Into<String>) -> Self {
        self.values[column.index()] = value.into();
        self
    }

    /// Resolved value, empty when the column is unbound or blank
    pub fn get(&self, column: TargetColumn) -> &str {
        &self.values[column.index()]
    }
}

/// Rows produced from one grid, with the counts of what was skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconstruction {
    pub rows: Vec<ReconstructedRow>,
    /// Visual spacer rows with no text at all
    pub spacer_rows: usize,
    /// Rows lacking a classification or both essential fields
    pub dropped_rows: usize,
}

fn non_blank(row: &GridRow, index: usize) -> Option<&str> {
    row.get(index)
        .and_then(|cell| cell.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn is_spacer(row: &GridRow) -> bool {
    row.iter()
        .all(|cell| cell.as_deref().map_or(true, |s| s.trim().is_empty()))
}

/// Reconstruct the data rows of one table.
///
/// `carry` is shared by every table of the current section and is updated in
/// place. Classification and product category fall back to the carried value
/// when blank; the detail columns only do so when
/// [`ExtractionConfig::carry_detail_columns`] is set, otherwise a blank stays
/// empty.
pub fn reconstruct_rows(
    mapping: &HeaderMapping,
    rows: &[GridRow],
    fraud_type: FraudType,
    carry: &mut CarryForward,
    config: &ExtractionConfig,
) -> Reconstruction {
    let mut result = Reconstruction::default();

    for row in rows {
        if is_spacer(row) {
            result.spacer_rows += 1;
            continue;
        }

        for (column, index) in mapping.bound_columns() {
            if let Some(value) = non_blank(row, index) {
                carry.record(column, value);
            }
        }

        let mut reconstructed = ReconstructedRow::new(fraud_type);
        for (column, index) in mapping.bound_columns() {
            let value = match non_blank(row, index) {
                Some(own) => Some(own),
                None if column.is_grouping() || config.carry_detail_columns => carry.get(column),
                None => None,
            };
            if let Some(value) = value {
                reconstructed.values[column.index()] = value.to_string();
            }
        }

        // A table without a classification column keeps its rows with an
        // empty classification
        let has_classification = !mapping.is_bound(TargetColumn::Classification)
            || !reconstructed.get(TargetColumn::Classification).is_empty();
        let has_essential = !reconstructed.get(TargetColumn::ProductCategory).is_empty()
            || !reconstructed.get(TargetColumn::Issue).is_empty();

        if has_classification && has_essential {
            result.rows.push(reconstructed);
        } else {
            result.dropped_rows += 1;
        }
    }

    result
}
