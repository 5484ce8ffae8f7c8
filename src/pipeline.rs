//! Per-document extraction driver
//!
//! Pages are visited strictly in order. The only state that crosses page
//! boundaries is the current section, the carry-forward table and the layout
//! of the last accepted table; all three are reset when a new section starts.

use crate::assemble::{assemble_records, check_count, find_declared_total};
use crate::header::{map_grid, HeaderMapping};
use crate::model::{FraudType, IncidentRecord, ReportPeriod};
use crate::period;
use crate::reconstruct::{reconstruct_rows, CarryForward, ReconstructedRow};
use crate::section::{classify_page, SectionVerdict};
use crate::source::PageSource;
use crate::tables::Grid;
use crate::{ExtractionConfig, ReportError};
use log::{debug, info, warn};
use std::fmt;

/// Driver state while walking a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// No section heading seen yet
    Searching,
    InSection(FraudType),
    /// All pages processed
    Done,
}

impl DriverState {
    /// Section tag for rows extracted in this state
    pub fn fraud_type(&self) -> FraudType {
        match self {
            DriverState::InSection(fraud_type) => *fraud_type,
            DriverState::Searching | DriverState::Done => FraudType::Unknown,
        }
    }
}

/// Non-fatal findings attached to a successful extraction
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionWarning {
    /// Extracted count deviates from the declared total beyond tolerance
    CountMismatch { declared: u32, extracted: usize },
    /// A page could not be read and was skipped
    PageSkipped { page: u32, reason: String },
    /// Records were extracted before any section heading
    UntaggedRecords { count: usize },
    /// The document was readable but yielded no records
    NoRecords,
}

impl fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionWarning::CountMismatch {
                declared,
                extracted,
            } => write!(
                f,
                "extracted {} records but the report declares {}",
                extracted, declared
            ),
            ExtractionWarning::PageSkipped { page, reason } => {
                write!(f, "page {} skipped: {}", page, reason)
            }
            ExtractionWarning::UntaggedRecords { count } => {
                write!(f, "{} records found before any section heading", count)
            }
            ExtractionWarning::NoRecords => f.write_str("no incident records found"),
        }
    }
}

/// Counters collected while walking a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub pages_read: usize,
    pub pages_skipped: usize,
    pub grids_seen: usize,
    pub grids_rejected: usize,
    /// Rejected grids read with the previous table's layout
    pub continuation_grids: usize,
    pub spacer_rows: usize,
    /// Rows dropped during reconstruction
    pub rows_dropped: usize,
    /// Rows dropped by the essential-field filter
    pub records_dropped: usize,
    pub records: usize,
}

/// Result of walking one document
#[derive(Debug, Clone)]
pub struct Extraction {
    pub records: Vec<IncidentRecord>,
    pub declared_total: Option<u32>,
    /// Reporting period found in the text of the first pages
    pub period_hint: Option<ReportPeriod>,
    pub warnings: Vec<ExtractionWarning>,
    pub stats: ExtractionStats,
}

/// Working state of one traversal, never shared between documents
#[derive(Debug)]
struct WorkingState {
    state: DriverState,
    carry: CarryForward,
    /// Mapping and width of the last accepted table in this section
    last_table: Option<(HeaderMapping, usize)>,
    /// Whether a table has been accepted on the current page
    table_on_page: bool,
    rows: Vec<ReconstructedRow>,
}

impl WorkingState {
    fn new() -> Self {
        Self {
            state: DriverState::Searching,
            carry: CarryForward::new(),
            last_table: None,
            table_on_page: false,
            rows: Vec::new(),
        }
    }

    fn enter_section(&mut self, fraud_type: FraudType) {
        self.state = DriverState::InSection(fraud_type);
        self.carry.reset();
        self.last_table = None;
    }
}

/// Drives classifier, mapper, reconstructor and assembler over a document
pub struct Pipeline<'a> {
    config: &'a ExtractionConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a ExtractionConfig) -> Self {
        Self { config }
    }

    /// Extract every incident record of one document.
    ///
    /// Unreadable pages are skipped and reported as warnings. The call only
    /// fails when the document has no pages or none of them could be read.
    pub fn run<S: PageSource + ?Sized>(&self, source: &S) -> Result<Extraction, ReportError> {
        let page_count = source.page_count();
        if page_count == 0 {
            return Err(ReportError::InvalidStructure);
        }

        let mut working = WorkingState::new();
        let mut stats = ExtractionStats::default();
        let mut warnings = Vec::new();
        let mut declared_total = None;
        let mut period_hint = None;

        for index in 0..page_count {
            let page = match source.page(index) {
                Ok(page) => page,
                Err(e) => {
                    let page = index as u32 + 1;
                    warn!("Skipping page {}: {}", page, e);
                    stats.pages_skipped += 1;
                    warnings.push(ExtractionWarning::PageSkipped {
                        page,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            stats.pages_read += 1;

            if index < self.config.total_search_pages {
                if declared_total.is_none() {
                    declared_total = find_declared_total(&page.text);
                }
                if period_hint.is_none() {
                    period_hint = period::from_text(&page.text);
                }
            }

            let verdict = classify_page(&page.text);

            // Grids above the heading still belong to the previous section
            let split = match (verdict, page.heading_y) {
                (SectionVerdict::Heading(_), Some(y)) => {
                    page.grids.iter().take_while(|g| g.starts_above(y)).count()
                }
                _ => 0,
            };
            let (before, after) = page.grids.split_at(split);

            working.table_on_page = false;
            for grid in before {
                self.process_grid(&mut working, grid, &mut stats);
            }

            if let SectionVerdict::Heading(fraud_type) = verdict {
                if working.state != DriverState::InSection(fraud_type) {
                    debug!("Page {}: entering section '{}'", page.number, fraud_type);
                    working.enter_section(fraud_type);
                }
            }

            for grid in after {
                self.process_grid(&mut working, grid, &mut stats);
            }
        }

        if stats.pages_read == 0 {
            return Err(ReportError::NoReadablePages);
        }
        working.state = DriverState::Done;

        let assembly = assemble_records(&working.rows);
        stats.records_dropped = assembly.dropped;
        stats.records = assembly.records.len();
        let records = assembly.records;

        let untagged = records
            .iter()
            .filter(|r| r.fraud_type == FraudType::Unknown)
            .count();
        if untagged > 0 {
            warnings.push(ExtractionWarning::UntaggedRecords { count: untagged });
        }
        if let Some(warning) = check_count(declared_total, records.len(), self.config.count_tolerance)
        {
            warn!("{}", warning);
            warnings.push(warning);
        }
        if records.is_empty() {
            warnings.push(ExtractionWarning::NoRecords);
        }

        info!(
            "Extracted {} records from {} pages ({} grids, {} rejected)",
            records.len(),
            stats.pages_read,
            stats.grids_seen,
            stats.grids_rejected
        );

        Ok(Extraction {
            records,
            declared_total,
            period_hint,
            warnings,
            stats,
        })
    }

    fn process_grid(&self, working: &mut WorkingState, grid: &Grid, stats: &mut ExtractionStats) {
        stats.grids_seen += 1;

        let (mapping, data_rows, continued) = match map_grid(grid, self.config) {
            Ok(mapping) => (mapping, grid.data_rows(), false),
            Err(rejection) => match self.continuation_mapping(working, grid) {
                Some(mapping) => {
                    debug!("Grid ({}) read as continuation of the previous table", rejection);
                    stats.continuation_grids += 1;
                    (mapping, grid.rows.as_slice(), true)
                }
                None => {
                    debug!("Grid rejected: {}", rejection);
                    stats.grids_rejected += 1;
                    return;
                }
            },
        };

        if self.config.reset_carry_per_table && !continued {
            working.carry.reset();
        }

        let fraud_type = working.state.fraud_type();
        let result = reconstruct_rows(&mapping, data_rows, fraud_type, &mut working.carry, self.config);
        stats.spacer_rows += result.spacer_rows;
        stats.rows_dropped += result.dropped_rows;
        working.rows.extend(result.rows);

        working.last_table = Some((mapping, grid.width()));
        working.table_on_page = true;
    }

    /// Layout to reuse for a rejected grid continuing the previous table.
    ///
    /// Only the first grid of a page can continue, and only with the same
    /// width as the last accepted table of the current section. A single
    /// spilled-over row qualifies as well.
    fn continuation_mapping(&self, working: &WorkingState, grid: &Grid) -> Option<HeaderMapping> {
        if !self.config.continue_headerless_tables || working.table_on_page || grid.rows.is_empty() {
            return None;
        }
        let (mapping, width) = working.last_table?;
        (width == grid.width()).then_some(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::PageContent;

    fn page(number: u32, text: &str, grids: Vec<Grid>) -> PageContent {
        PageContent {
            number,
            text: text.to_string(),
            grids,
            heading_y: None,
        }
    }

    fn run(pages: &[PageContent]) -> Extraction {
        let config = ExtractionConfig::default();
        Pipeline::new(&config).run(pages).unwrap()
    }

    const HEADER: [&str; 4] = ["CLASSIFICATION", "PRODUCT CATEGORY", "ISSUE", "ORIGIN"];

    #[test]
    fn test_end_to_end_single_page() {
        let grid = Grid::from_strings(vec![
            HEADER.to_vec(),
            vec!["Serious", "Fish", "Mislabelled species", "Vietnam"],
            vec!["", "", "Heavy metals", "China"],
        ]);
        let extraction = run(&[page(1, "2. RECORD TAMPERING", vec![grid])]);

        assert_eq!(extraction.records.len(), 2);
        let first = &extraction.records[0];
        assert_eq!(first.fraud_type, FraudType::RecordTampering);
        assert_eq!(first.classification, "Serious");
        assert_eq!(first.product_category, "Fish");
        assert_eq!(first.issue, "Mislabelled species");
        assert_eq!(first.origin, "Vietnam");
        let second = &extraction.records[1];
        assert_eq!(second.classification, "Serious");
        assert_eq!(second.product_category, "Fish");
        assert_eq!(second.issue, "Heavy metals");
        assert_eq!(second.origin, "China");
        assert!(extraction.warnings.is_empty());
    }

    #[test]
    fn test_section_persists_across_pages() {
        let first = Grid::from_strings(vec![
            HEADER.to_vec(),
            vec!["Serious", "Fish", "Mislabelled species", "Vietnam"],
        ]);
        let second = Grid::from_strings(vec![HEADER.to_vec(), vec!["", "", "Heavy metals", "China"]]);
        let extraction = run(&[
            page(1, "1. PRODUCT TAMPERING", vec![first]),
            page(2, "continued", vec![second]),
        ]);

        assert_eq!(extraction.records.len(), 2);
        assert_eq!(extraction.records[1].fraud_type, FraudType::ProductTampering);
        assert_eq!(extraction.records[1].classification, "Serious");
        assert_eq!(extraction.records[1].product_category, "Fish");
    }

    #[test]
    fn test_section_transition_resets_carry() {
        let first = Grid::from_strings(vec![
            HEADER.to_vec(),
            vec!["Serious", "Fish", "Mislabelled species", "Vietnam"],
        ]);
        let second = Grid::from_strings(vec![
            HEADER.to_vec(),
            vec!["", "", "Forged certificate", "Brazil"],
            vec!["Minor", "", "Expired label", "Italy"],
        ]);
        let extraction = run(&[
            page(1, "1. PRODUCT TAMPERING", vec![first]),
            page(2, "2. RECORD TAMPERING", vec![second]),
        ]);

        let section_b: Vec<_> = extraction
            .records
            .iter()
            .filter(|r| r.fraud_type == FraudType::RecordTampering)
            .collect();
        assert_eq!(section_b.len(), 1);
        assert_eq!(section_b[0].classification, "Minor");
        assert_eq!(section_b[0].product_category, "");
        assert!(extraction
            .records
            .iter()
            .filter(|r| r.fraud_type == FraudType::RecordTampering)
            .all(|r| r.classification != "Serious" && r.product_category != "Fish"));
    }

    #[test]
    fn test_repeated_heading_does_not_reset() {
        let first = Grid::from_strings(vec![HEADER.to_vec(), vec!["Serious", "Fish", "A", "X"]]);
        let second = Grid::from_strings(vec![HEADER.to_vec(), vec!["", "", "B", "Y"]]);
        let extraction = run(&[
            page(1, "2. RECORD TAMPERING", vec![first]),
            page(2, "2. RECORD TAMPERING (continued)", vec![second]),
        ]);
        assert_eq!(extraction.records.len(), 2);
        assert_eq!(extraction.records[1].classification, "Serious");
    }

    #[test]
    fn test_records_before_heading_are_unknown() {
        let grid = Grid::from_strings(vec![HEADER.to_vec(), vec!["Serious", "Fish", "A", "X"]]);
        let extraction = run(&[page(1, "Monthly report", vec![grid])]);
        assert_eq!(extraction.records[0].fraud_type, FraudType::Unknown);
        assert_eq!(
            extraction.warnings,
            vec![ExtractionWarning::UntaggedRecords { count: 1 }]
        );
    }

    #[test]
    fn test_rejected_grids_produce_no_rows() {
        let furniture = Grid::from_strings(vec![
            vec!["PRODUCT CATEGORY", "ISSUE", "PAGE"],
            vec!["Fish", "Fraud", "3"],
        ]);
        let extraction = run(&[page(1, "1. PRODUCT TAMPERING", vec![furniture])]);
        assert!(extraction.records.is_empty());
        assert_eq!(extraction.stats.grids_rejected, 1);
        assert_eq!(extraction.warnings, vec![ExtractionWarning::NoRecords]);
    }

    #[test]
    fn test_headerless_continuation_uses_previous_layout() {
        let first = Grid::from_strings(vec![
            HEADER.to_vec(),
            vec!["Serious", "Fish", "Mislabelled species", "Vietnam"],
        ]);
        let continued = Grid::from_strings(vec![
            vec!["", "", "Heavy metals", "China"],
            vec!["", "Honey", "Sugar syrup", "Ukraine"],
        ]);
        let extraction = run(&[
            page(1, "2. RECORD TAMPERING", vec![first]),
            page(2, "", vec![continued]),
        ]);

        assert_eq!(extraction.stats.continuation_grids, 1);
        assert_eq!(extraction.records.len(), 3);
        assert_eq!(extraction.records[1].product_category, "Fish");
        assert_eq!(extraction.records[2].product_category, "Honey");
        assert_eq!(extraction.records[2].classification, "Serious");
    }

    #[test]
    fn test_headerless_grid_of_other_width_is_rejected() {
        let first = Grid::from_strings(vec![HEADER.to_vec(), vec!["Serious", "Fish", "A", "X"]]);
        let footer = Grid::from_strings(vec![vec!["Page 2", "of 9"], vec!["x", "y"]]);
        let extraction = run(&[
            page(1, "2. RECORD TAMPERING", vec![first]),
            page(2, "", vec![footer]),
        ]);
        assert_eq!(extraction.stats.continuation_grids, 0);
        assert_eq!(extraction.stats.grids_rejected, 1);
        assert_eq!(extraction.records.len(), 1);
    }

    #[test]
    fn test_single_spilled_row_continues_previous_table() {
        let first = Grid::from_strings(vec![
            HEADER.to_vec(),
            vec!["Serious", "Fish", "Mislabelled species", "Vietnam"],
        ]);
        let spilled = Grid::from_strings(vec![vec!["", "", "B", "Y"]]);
        let extraction = run(&[
            page(1, "2. RECORD TAMPERING", vec![first]),
            page(2, "", vec![spilled]),
        ]);

        assert_eq!(extraction.stats.continuation_grids, 1);
        assert_eq!(extraction.stats.grids_rejected, 0);
        assert_eq!(extraction.records.len(), 2);
        let last = &extraction.records[1];
        assert_eq!(last.classification, "Serious");
        assert_eq!(last.product_category, "Fish");
        assert_eq!(last.issue, "B");
        assert_eq!(last.origin, "Y");
    }

    #[test]
    fn test_continuation_disabled() {
        let first = Grid::from_strings(vec![HEADER.to_vec(), vec!["Serious", "Fish", "A", "X"]]);
        let spilled = Grid::from_strings(vec![vec!["", "", "B", "Y"]]);
        let pages = vec![
            page(1, "2. RECORD TAMPERING", vec![first]),
            page(2, "", vec![spilled]),
        ];
        let config = ExtractionConfig {
            continue_headerless_tables: false,
            ..ExtractionConfig::default()
        };
        let extraction = Pipeline::new(&config).run(pages.as_slice()).unwrap();
        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.stats.grids_rejected, 1);
    }

    #[test]
    fn test_grids_above_heading_keep_previous_section() {
        let first = Grid::from_strings(vec![
            HEADER.to_vec(),
            vec!["Serious", "Fish", "Mislabelled species", "Vietnam"],
        ]);
        let tail = Grid {
            top: Some(780.0),
            ..Grid::from_strings(vec![HEADER.to_vec(), vec!["", "", "Heavy metals", "China"]])
        };
        let next = Grid {
            top: Some(680.0),
            ..Grid::from_strings(vec![HEADER.to_vec(), vec!["Minor", "Honey", "Sugar syrup", "Ukraine"]])
        };
        let mut second = page(2, "2. RECORD TAMPERING", vec![tail, next]);
        second.heading_y = Some(730.0);

        let extraction = run(&[page(1, "1. PRODUCT TAMPERING", vec![first]), second]);

        assert_eq!(extraction.records.len(), 3);
        let tail_record = &extraction.records[1];
        assert_eq!(tail_record.fraud_type, FraudType::ProductTampering);
        assert_eq!(tail_record.classification, "Serious");
        assert_eq!(tail_record.product_category, "Fish");
        assert_eq!(extraction.records[2].fraud_type, FraudType::RecordTampering);
    }

    #[test]
    fn test_declared_total_and_count_warning() {
        let grid = Grid::from_strings(vec![HEADER.to_vec(), vec!["Serious", "Fish", "A", "X"]]);
        let extraction = run(&[
            page(1, "This month 10 suspicions were retrieved.", vec![]),
            page(2, "1. PRODUCT TAMPERING", vec![grid]),
        ]);
        assert_eq!(extraction.declared_total, Some(10));
        assert!(extraction.warnings.contains(&ExtractionWarning::CountMismatch {
            declared: 10,
            extracted: 1
        }));
    }

    #[test]
    fn test_period_hint_from_first_pages() {
        let extraction = run(&[page(1, "Monthly report - February 2025", vec![])]);
        assert_eq!(extraction.period_hint, ReportPeriod::new(2025, 2));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let grid = Grid::from_strings(vec![
            HEADER.to_vec(),
            vec!["Serious", "Fish", "Mislabelled species", "Vietnam"],
            vec!["", "", "Heavy metals", "China"],
        ]);
        let pages = vec![page(1, "2. RECORD TAMPERING", vec![grid])];
        assert_eq!(run(&pages).records, run(&pages).records);
    }

    #[test]
    fn test_empty_document_is_an_error() {
        let config = ExtractionConfig::default();
        let pages: Vec<PageContent> = Vec::new();
        assert!(matches!(
            Pipeline::new(&config).run(pages.as_slice()),
            Err(ReportError::InvalidStructure)
        ));
    }

    #[test]
    fn test_driver_state_tags() {
        assert_eq!(DriverState::Searching.fraud_type(), FraudType::Unknown);
        assert_eq!(
            DriverState::InSection(FraudType::OtherNonCompliances).fraud_type(),
            FraudType::OtherNonCompliances
        );
    }
}
