//! Table grid location
//!
//! Turns the positioned text items of one page into raw grids: ordered rows
//! of nullable cell text. Grids are only candidates; deciding whether one is
//! an incident table is left to [`crate::header`].

use crate::extractor::TextItem;

/// One raw row, `None` where the cell holds no text
pub type GridRow = Vec<Option<String>>;

/// A raw table grid as located on a page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    pub rows: Vec<GridRow>,
    /// Baseline of the first row, when the grid was located on a page
    pub top: Option<f32>,
}

impl Grid {
    /// Build a grid from plain strings, treating blank strings as empty cells
    pub fn from_strings<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| {
                        let cell = cell.as_ref();
                        (!cell.trim().is_empty()).then(|| cell.to_string())
                    })
                    .collect()
            })
            .collect();
        Self { rows, top: None }
    }

    /// Widest row length
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn header(&self) -> Option<&GridRow> {
        self.rows.first()
    }

    /// Rows after the header
    pub fn data_rows(&self) -> &[GridRow] {
        self.rows.get(1..).unwrap_or(&[])
    }

    /// Whether the grid starts above baseline `y`
    pub fn starts_above(&self, y: f32) -> bool {
        self.top.map_or(false, |top| top > y)
    }
}

/// Geometric thresholds used when locating grids
#[derive(Debug, Clone)]
pub struct TableDetectionConfig {
    /// Vertical gap that separates two table regions
    pub region_gap: f32,
    /// Row tolerance as a fraction of the item font size
    pub row_tolerance_ratio: f32,
    /// Minimum row tolerance in points
    pub min_row_tolerance: f32,
    /// Horizontal distance under which left edges share a column
    pub column_gap: f32,
    /// Items closer than this many font sizes to the previous item's right
    /// edge continue the same phrase
    pub word_gap_ratio: f32,
    /// A line closer than this many font sizes below the previous one, with
    /// nothing in the first column, is a wrapped continuation of that row
    pub wrap_gap_ratio: f32,
}

impl Default for TableDetectionConfig {
    fn default() -> Self {
        Self {
            region_gap: 30.0,
            row_tolerance_ratio: 0.5,
            min_row_tolerance: 2.0,
            column_gap: 20.0,
            word_gap_ratio: 1.0,
            wrap_gap_ratio: 1.5,
        }
    }
}

/// Items sharing a baseline band
#[derive(Debug)]
struct RowCluster<'a> {
    y: f32,
    items: Vec<&'a TextItem>,
}

impl RowCluster<'_> {
    fn font_size(&self) -> f32 {
        self.items.iter().map(|i| i.font_size).fold(0.0, f32::max)
    }
}

/// Adjacent items of one row that read as a single phrase
#[derive(Debug)]
struct Segment<'a> {
    x: f32,
    right: f32,
    items: Vec<&'a TextItem>,
}

/// Locate candidate grids among the items of one page
pub fn locate_grids(items: &[TextItem], config: &TableDetectionConfig) -> Vec<Grid> {
    let rows = cluster_rows(items, config);
    split_regions(rows, config.region_gap)
        .iter()
        .map(|region| build_grid(region, config))
        .filter(|grid| !grid.rows.is_empty())
        .collect()
}

/// Cluster items into rows, top of page first
fn cluster_rows<'a>(items: &'a [TextItem], config: &TableDetectionConfig) -> Vec<RowCluster<'a>> {
    let mut sorted: Vec<&TextItem> = items.iter().filter(|i| !i.text.trim().is_empty()).collect();
    sorted.sort_by(|a, b| b.y.partial_cmp(&a.y).unwrap_or(std::cmp::Ordering::Equal));

    let mut rows: Vec<RowCluster> = Vec::new();
    for item in sorted {
        let tolerance = (item.font_size * config.row_tolerance_ratio).max(config.min_row_tolerance);
        match rows.last_mut() {
            Some(row) if (row.y - item.y).abs() <= tolerance => {
                row.items.push(item);
                row.y = row.items.iter().map(|i| i.y).sum::<f32>() / row.items.len() as f32;
            }
            _ => rows.push(RowCluster {
                y: item.y,
                items: vec![item],
            }),
        }
    }

    for row in &mut rows {
        row.items
            .sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
    }

    rows
}

/// Split rows into regions wherever the vertical gap exceeds `gap`
fn split_regions(rows: Vec<RowCluster<'_>>, gap: f32) -> Vec<Vec<RowCluster<'_>>> {
    let mut regions: Vec<Vec<RowCluster>> = Vec::new();

    for row in rows {
        let starts_region = regions
            .last()
            .and_then(|region| region.last())
            .map_or(true, |prev| prev.y - row.y > gap);
        if starts_region {
            regions.push(vec![row]);
        } else if let Some(region) = regions.last_mut() {
            region.push(row);
        }
    }

    regions
}

/// Merge the items of a row into phrases, so a cell drawn word by word does
/// not open a new column per word
fn segment_row<'a>(row: &RowCluster<'a>, word_gap_ratio: f32) -> Vec<Segment<'a>> {
    let mut segments: Vec<Segment> = Vec::new();

    for &item in &row.items {
        let max_gap = item.font_size * word_gap_ratio;
        match segments.last_mut() {
            Some(segment) if item.x - segment.right <= max_gap => {
                segment.right = segment.right.max(item.right());
                segment.items.push(item);
            }
            _ => segments.push(Segment {
                x: item.x,
                right: item.right(),
                items: vec![item],
            }),
        }
    }

    segments
}

/// Column start positions from the left edges of multi-cell rows.
///
/// Rows holding a single phrase (titles, wrapped prose, merged-cell labels)
/// say nothing about the column layout and are ignored.
fn find_column_starts(rows: &[Vec<Segment<'_>>], column_gap: f32) -> Vec<f32> {
    let mut edges: Vec<f32> = rows
        .iter()
        .filter(|segments| segments.len() >= 2)
        .flat_map(|segments| segments.iter().map(|s| s.x))
        .collect();
    edges.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut starts: Vec<f32> = Vec::new();
    let mut last_edge = f32::NEG_INFINITY;
    for x in edges {
        if x - last_edge > column_gap {
            starts.push(x);
        }
        last_edge = x;
    }

    if starts.is_empty() {
        // Single-column region
        let min_x = rows
            .iter()
            .flat_map(|segments| segments.iter().map(|s| s.x))
            .fold(f32::INFINITY, f32::min);
        if min_x.is_finite() {
            starts.push(min_x);
        }
    }

    starts
}

/// Column an item starting at `x` falls into
fn find_column_index(starts: &[f32], x: f32, column_gap: f32) -> usize {
    starts
        .iter()
        .rposition(|&start| start <= x + column_gap / 2.0)
        .unwrap_or(0)
}

/// Join cell items, without spaces around hyphen breaks
fn join_cell_items(items: &[&TextItem]) -> String {
    let mut result = String::new();

    for item in items {
        let text = item.text.trim();
        if text.is_empty() {
            continue;
        }
        if !result.is_empty() && !result.ends_with('-') && !text.starts_with('-') {
            result.push(' ');
        }
        result.push_str(text);
    }

    result
}

/// A line continues the row above when it sits closer than a row pitch and
/// leaves the first column empty.
fn is_wrapped_line(
    prev: &RowCluster<'_>,
    row: &RowCluster<'_>,
    cells: &[Vec<&TextItem>],
    config: &TableDetectionConfig,
) -> bool {
    let first_empty = cells.first().map_or(true, Vec::is_empty);
    first_empty && prev.y - row.y < row.font_size() * config.wrap_gap_ratio
}

fn build_grid(region: &[RowCluster<'_>], config: &TableDetectionConfig) -> Grid {
    let segmented: Vec<Vec<Segment>> = region
        .iter()
        .map(|row| segment_row(row, config.word_gap_ratio))
        .collect();
    let starts = find_column_starts(&segmented, config.column_gap);
    if starts.is_empty() {
        return Grid::default();
    }

    let mut table: Vec<Vec<Vec<&TextItem>>> = Vec::new();
    let mut prev: Option<&RowCluster> = None;
    for (row, segments) in region.iter().zip(&segmented) {
        let mut cells: Vec<Vec<&TextItem>> = vec![Vec::new(); starts.len()];
        for segment in segments {
            let index = find_column_index(&starts, segment.x, config.column_gap);
            cells[index].extend(segment.items.iter().copied());
        }

        let wrapped = prev.map_or(false, |p| is_wrapped_line(p, row, &cells, config));
        match table.last_mut() {
            Some(last) if wrapped => {
                for (cell, more) in last.iter_mut().zip(cells) {
                    cell.extend(more);
                }
            }
            _ => table.push(cells),
        }
        prev = Some(row);
    }

    let rows = table
        .iter()
        .map(|cells| {
            cells
                .iter()
                .map(|cell_items| {
                    let text = join_cell_items(cell_items);
                    (!text.is_empty()).then_some(text)
                })
                .collect()
        })
        .collect();

    Grid {
        rows,
        top: region.first().map(|row| row.y),
    }
}
