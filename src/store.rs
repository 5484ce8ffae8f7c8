//! Report storage seam
//!
//! Extraction never talks to a database directly. Callers persist a
//! [`crate::ProcessedReport`] through a [`ReportStore`]; [`MemoryStore`] keeps
//! everything in process and is what the CLI and tests use.

use crate::model::{FraudType, IncidentRecord, Report, ReportPeriod};
use crate::ReportError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

/// Outcome of comparing an extracted report with what is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestStatus {
    /// No report stored for this period
    New,
    /// A report exists for the period with different content
    Updated,
    /// Stored report has the same declared total and records
    Duplicate,
}

/// Selection over stored incidents. Empty sets select everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentFilter {
    /// Inclusive lower bound
    pub from: Option<ReportPeriod>,
    /// Inclusive upper bound
    pub to: Option<ReportPeriod>,
    pub product_categories: BTreeSet<String>,
    pub fraud_types: BTreeSet<FraudType>,
}

impl IncidentFilter {
    pub fn period(mut self, from: ReportPeriod, to: ReportPeriod) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn product_category(mut self, category: impl Into<String>) -> Self {
        self.product_categories.insert(category.into());
        self
    }

    pub fn fraud_type(mut self, fraud_type: FraudType) -> Self {
        self.fraud_types.insert(fraud_type);
        self
    }

    fn includes_period(&self, period: ReportPeriod) -> bool {
        self.from.map_or(true, |from| period >= from) && self.to.map_or(true, |to| period <= to)
    }

    fn includes(&self, record: &IncidentRecord) -> bool {
        (self.product_categories.is_empty()
            || self.product_categories.contains(&record.product_category))
            && (self.fraud_types.is_empty() || self.fraud_types.contains(&record.fraud_type))
    }
}

/// An incident together with the period it was reported in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredIncident {
    pub period: ReportPeriod,
    #[serde(flatten)]
    pub record: IncidentRecord,
}

/// Insert/query interface of the backing store
pub trait ReportStore: Send + Sync {
    /// Classify `report` against the stored report for its period
    fn status_of(&self, report: &Report, records: &[IncidentRecord]) -> Result<IngestStatus, ReportError>;

    /// Replace the stored report for the period and all its incidents.
    ///
    /// Readers observe either the previous incidents or the new ones, never a
    /// mix. Duplicates are not written. Records lacking a product category or
    /// issue fail the whole ingest with [`ReportError::IncompleteRecord`].
    fn ingest(&self, report: Report, records: Vec<IncidentRecord>) -> Result<IngestStatus, ReportError>;

    fn report(&self, period: ReportPeriod) -> Result<Option<Report>, ReportError>;

    /// Incidents matching `filter`, oldest period first, in document order
    fn incidents(&self, filter: &IncidentFilter) -> Result<Vec<StoredIncident>, ReportError>;

    fn periods(&self) -> Result<Vec<ReportPeriod>, ReportError>;

    fn latest_period(&self) -> Result<Option<ReportPeriod>, ReportError> {
        Ok(self.periods()?.into_iter().max())
    }

    /// Distinct product categories across all stored incidents
    fn product_categories(&self) -> Result<Vec<String>, ReportError>;

    /// Distinct fraud types across all stored incidents
    fn fraud_types(&self) -> Result<Vec<FraudType>, ReportError>;
}

#[derive(Debug)]
struct StoredReport {
    report: Report,
    records: Vec<IncidentRecord>,
}

/// In-process store keyed by reporting period
#[derive(Debug, Default)]
pub struct MemoryStore {
    reports: RwLock<BTreeMap<ReportPeriod, StoredReport>>,
}

fn poisoned<T>(_: T) -> ReportError {
    ReportError::Store("store lock poisoned".to_string())
}

fn check_complete(records: &[IncidentRecord]) -> Result<(), ReportError> {
    match records.iter().position(|r| !r.is_complete()) {
        Some(index) => Err(ReportError::IncompleteRecord(index)),
        None => Ok(()),
    }
}

fn compare(stored: Option<&StoredReport>, report: &Report, records: &[IncidentRecord]) -> IngestStatus {
    match stored {
        None => IngestStatus::New,
        Some(stored)
            if stored.report.declared_total == report.declared_total
                && stored.records.as_slice() == records =>
        {
            IngestStatus::Duplicate
        }
        Some(_) => IngestStatus::Updated,
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportStore for MemoryStore {
    fn status_of(&self, report: &Report, records: &[IncidentRecord]) -> Result<IngestStatus, ReportError> {
        let reports = self.reports.read().map_err(poisoned)?;
        Ok(compare(reports.get(&report.period), report, records))
    }

    fn ingest(&self, report: Report, records: Vec<IncidentRecord>) -> Result<IngestStatus, ReportError> {
        check_complete(&records)?;
        let mut reports = self.reports.write().map_err(poisoned)?;
        let status = compare(reports.get(&report.period), &report, &records);
        if status != IngestStatus::Duplicate {
            reports.insert(report.period, StoredReport { report, records });
        }
        Ok(status)
    }

    fn report(&self, period: ReportPeriod) -> Result<Option<Report>, ReportError> {
        let reports = self.reports.read().map_err(poisoned)?;
        Ok(reports.get(&period).map(|stored| stored.report.clone()))
    }

    fn incidents(&self, filter: &IncidentFilter) -> Result<Vec<StoredIncident>, ReportError> {
        let reports = self.reports.read().map_err(poisoned)?;
        Ok(reports
            .iter()
            .filter(|(period, _)| filter.includes_period(**period))
            .flat_map(|(period, stored)| {
                stored
                    .records
                    .iter()
                    .filter(|record| filter.includes(record))
                    .map(|record| StoredIncident {
                        period: *period,
                        record: record.clone(),
                    })
            })
            .collect())
    }

    fn periods(&self) -> Result<Vec<ReportPeriod>, ReportError> {
        let reports = self.reports.read().map_err(poisoned)?;
        Ok(reports.keys().copied().collect())
    }

    fn product_categories(&self) -> Result<Vec<String>, ReportError> {
        let reports = self.reports.read().map_err(poisoned)?;
        let categories: BTreeSet<&str> = reports
            .values()
            .flat_map(|stored| stored.records.iter().map(|r| r.product_category.as_str()))
            .collect();
        Ok(categories.into_iter().map(str::to_string).collect())
    }

    fn fraud_types(&self) -> Result<Vec<FraudType>, ReportError> {
        let reports = self.reports.read().map_err(poisoned)?;
        let types: BTreeSet<FraudType> = reports
            .values()
            .flat_map(|stored| stored.records.iter().map(|r| r.fraud_type))
            .collect();
        Ok(types.into_iter().collect())
    }
}
