//! Report and incident record types
//!
//! These are the shapes handed to the storage layer and the dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fraud-type section a record was found under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FraudType {
    ProductTampering,
    RecordTampering,
    OtherNonCompliances,
    /// No section heading had been seen yet when the record was extracted
    Unknown,
}

impl FraudType {
    /// Human-readable label as stored alongside records
    pub fn label(&self) -> &'static str {
        match self {
            FraudType::ProductTampering => "Product tampering",
            FraudType::RecordTampering => "Record tampering",
            FraudType::OtherNonCompliances => "Other non-compliances",
            FraudType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for FraudType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Year and month a report covers. Unique per stored report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub year: i32,
    pub month: u32,
}

impl ReportPeriod {
    /// Build a period, rejecting months outside 1..=12
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && (1900..=9999).contains(&year) {
            Some(Self { year, month })
        } else {
            None
        }
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// One monthly source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub period: ReportPeriod,
    /// Incident count printed in the document prose, 0 when not found
    pub declared_total: u32,
    /// File name or URL the report was read from
    pub source_ref: String,
    pub ingested_at: DateTime<Utc>,
}

impl Report {
    pub fn new(period: ReportPeriod, declared_total: u32, source_ref: impl Into<String>) -> Self {
        Self {
            period,
            declared_total,
            source_ref: source_ref.into(),
            ingested_at: Utc::now(),
        }
    }
}

/// One suspicion row after reconstruction and normalization
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub fraud_type: FraudType,
    pub classification: String,
    pub product_category: String,
    pub commodity: String,
    pub issue: String,
    pub origin: String,
    pub notified_by: String,
}

impl IncidentRecord {
    /// Whether the record carries both a product category and an issue
    pub fn is_complete(&self) -> bool {
        !self.product_category.trim().is_empty() && !self.issue.trim().is_empty()
    }
}
