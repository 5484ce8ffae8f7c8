//! Incident table extraction for monthly food-fraud PDF reports
//!
//! This crate provides:
//! - Positioned text extraction and grid location on top of lopdf
//! - Section tracking, header mapping and merged-cell reconstruction
//! - Record assembly with a sanity check against the declared total
//! - A storage seam with an in-memory implementation

pub mod assemble;
pub mod extractor;
pub mod header;
pub mod model;
pub mod period;
pub mod pipeline;
pub mod reconstruct;
pub mod section;
pub mod source;
pub mod store;
pub mod tables;

pub use header::{GridRejection, HeaderMapping, TargetColumn};
pub use model::{FraudType, IncidentRecord, Report, ReportPeriod};
pub use pipeline::{DriverState, Extraction, ExtractionStats, ExtractionWarning, Pipeline};
pub use source::{PageContent, PageSource, PdfPageSource};
pub use store::{IncidentFilter, IngestStatus, MemoryStore, ReportStore, StoredIncident};
pub use tables::{Grid, TableDetectionConfig};

use rayon::prelude::*;
use std::path::Path;

/// Extraction thresholds and switches
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Grids with fewer rows (header included) are rejected
    pub min_grid_rows: usize,
    /// Header cells that must bind a target column for a grid to be accepted
    pub min_header_matches: usize,
    /// Relative deviation from the declared total tolerated without a warning
    pub count_tolerance: f64,
    /// Leading pages searched for the declared total and reporting period
    pub total_search_pages: usize,
    /// Fill blank detail cells (commodity, issue, origin, notified by) from
    /// the previous row as well
    pub carry_detail_columns: bool,
    /// Start every accepted table with an empty carry-forward table
    pub reset_carry_per_table: bool,
    /// Read headerless grids with the layout of the preceding table
    pub continue_headerless_tables: bool,
    pub detection: TableDetectionConfig,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_grid_rows: 2,
            min_header_matches: 3,
            count_tolerance: 0.20,
            total_search_pages: 3,
            carry_detail_columns: false,
            reset_carry_per_table: false,
            continue_headerless_tables: true,
            detection: TableDetectionConfig::default(),
        }
    }
}

/// A fully processed monthly report
#[derive(Debug, Clone)]
pub struct ProcessedReport {
    pub report: Report,
    pub records: Vec<IncidentRecord>,
    pub warnings: Vec<ExtractionWarning>,
    pub stats: ExtractionStats,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

impl ProcessedReport {
    /// Persist into `store`, replacing any report for the same period
    pub fn ingest_into<S: ReportStore + ?Sized>(&self, store: &S) -> Result<IngestStatus, ReportError> {
        store.ingest(self.report.clone(), self.records.clone())
    }
}

/// Process a report PDF from disk.
///
/// The reporting period is read from the file name, or failing that from
/// the first pages of the document.
pub fn process_report<P: AsRef<Path>>(
    path: P,
    config: &ExtractionConfig,
) -> Result<ProcessedReport, ReportError> {
    let start = std::time::Instant::now();
    let path = path.as_ref();

    let source = PdfPageSource::open(path, &config.detection)?;
    let extraction = Pipeline::new(config).run(&source)?;
    let period = period::from_file_name(path).or(extraction.period_hint);

    finish(extraction, period, path.display().to_string(), start)
}

/// Process a report PDF held in memory
pub fn process_report_mem(
    buffer: &[u8],
    source_ref: &str,
    config: &ExtractionConfig,
) -> Result<ProcessedReport, ReportError> {
    let start = std::time::Instant::now();

    let source = PdfPageSource::from_bytes(buffer, &config.detection)?;
    let extraction = Pipeline::new(config).run(&source)?;
    let period = period::from_file_name(source_ref).or(extraction.period_hint);

    finish(extraction, period, source_ref.to_string(), start)
}

/// Process pages that were already extracted, for a known period
pub fn process_pages(
    pages: &[PageContent],
    period: ReportPeriod,
    source_ref: &str,
    config: &ExtractionConfig,
) -> Result<ProcessedReport, ReportError> {
    let start = std::time::Instant::now();
    let extraction = Pipeline::new(config).run(pages)?;
    finish(extraction, Some(period), source_ref.to_string(), start)
}

/// Process several report PDFs in parallel.
///
/// Each document gets its own pipeline state; one failing document does not
/// affect the others. Results are returned in input order.
pub fn process_reports<P>(paths: &[P], config: &ExtractionConfig) -> Vec<Result<ProcessedReport, ReportError>>
where
    P: AsRef<Path> + Sync,
{
    paths
        .par_iter()
        .map(|path| process_report(path, config))
        .collect()
}

fn finish(
    extraction: Extraction,
    period: Option<ReportPeriod>,
    source_ref: String,
    start: std::time::Instant,
) -> Result<ProcessedReport, ReportError> {
    let period = period.ok_or(ReportError::UnknownPeriod)?;
    let declared_total = extraction.declared_total.unwrap_or(0);

    Ok(ProcessedReport {
        report: Report::new(period, declared_total, source_ref),
        records: extraction.records,
        warnings: extraction.warnings,
        stats: extraction.stats,
        processing_time_ms: start.elapsed().as_millis() as u64,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("PDF is encrypted")]
    Encrypted,
    #[error("Invalid PDF structure")]
    InvalidStructure,
    #[error("No page of the document could be read")]
    NoReadablePages,
    #[error("Reporting period could not be determined")]
    UnknownPeriod,
    #[error("Incident record {0} lacks a product category or issue")]
    IncompleteRecord(usize),
    #[error("Store error: {0}")]
    Store(String),
}

impl From<lopdf::Error> for ReportError {
    fn from(e: lopdf::Error) -> Self {
        ReportError::Parse(e.to_string())
    }
}
