//! Record assembly and consistency checks

use crate::header::TargetColumn;
use crate::model::IncidentRecord;
use crate::pipeline::ExtractionWarning;
use crate::reconstruct::ReconstructedRow;
use once_cell::sync::Lazy;
use regex::Regex;

static TRAILING_MARKERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:\s*\*)+$").unwrap());

static DECLARED_TOTAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)THIS\s+MONTH,?\s+(\d{1,3}(?:,\d{3})+|\d+)\s+SUSPICIONS?\s+(?:WERE|WAS)\s+RETRIEVED")
        .unwrap()
});

/// Collapse whitespace runs and strip trailing reference asterisks
pub fn normalize_text(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    TRAILING_MARKERS.replace(&collapsed, "").trim().to_string()
}

/// Declared number of suspicions, as printed in the report prose
pub fn find_declared_total(text: &str) -> Option<u32> {
    let caps = DECLARED_TOTAL.captures(text)?;
    caps.get(1)?.as_str().replace(',', "").parse().ok()
}

/// Records built from a document's rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assembly {
    pub records: Vec<IncidentRecord>,
    /// Rows whose product category or issue was empty after normalization
    pub dropped: usize,
}

/// Normalize rows into incident records, keeping document order
pub fn assemble_records(rows: &[ReconstructedRow]) -> Assembly {
    let mut assembly = Assembly::default();

    for row in rows {
        let field = |column| normalize_text(row.get(column));
        let record = IncidentRecord {
            fraud_type: row.fraud_type,
            classification: field(TargetColumn::Classification),
            product_category: field(TargetColumn::ProductCategory),
            commodity: field(TargetColumn::Commodity),
            issue: field(TargetColumn::Issue),
            origin: field(TargetColumn::Origin),
            notified_by: field(TargetColumn::NotifiedBy),
        };

        if record.is_complete() {
            assembly.records.push(record);
        } else {
            assembly.dropped += 1;
        }
    }

    assembly
}

/// Compare the extracted record count against the declared total.
///
/// Returns a warning when the relative deviation exceeds `tolerance`. An
/// unknown or zero declared total is never checked.
pub fn check_count(
    declared: Option<u32>,
    extracted: usize,
    tolerance: f64,
) -> Option<ExtractionWarning> {
    let declared = declared.filter(|&d| d > 0)?;
    let deviation = (extracted as f64 - declared as f64).abs() / declared as f64;
    (deviation > tolerance).then_some(ExtractionWarning::CountMismatch {
        declared,
        extracted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FraudType;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Fish   and\nfishery  products "), "Fish and fishery products");
        assert_eq!(normalize_text("Honey**"), "Honey");
        assert_eq!(normalize_text("Honey * *"), "Honey");
        assert_eq!(normalize_text("Olive oil (*) blend"), "Olive oil (*) blend");
        assert_eq!(normalize_text("   "), "");
        assert_eq!(normalize_text("***"), "");
    }

    #[test]
    fn test_find_declared_total() {
        assert_eq!(
            find_declared_total("This month 87 suspicions were retrieved from the system."),
            Some(87)
        );
        assert_eq!(
            find_declared_total("THIS MONTH\n1,204 SUSPICIONS WERE RETRIEVED"),
            Some(1204)
        );
        assert_eq!(find_declared_total("No totals here"), None);
    }

    #[test]
    fn test_essential_fields_filter() {
        let rows = vec![
            ReconstructedRow::new(FraudType::RecordTampering)
                .with(TargetColumn::Classification, "Serious")
                .with(TargetColumn::ProductCategory, "Fish")
                .with(TargetColumn::Issue, "Mislabelled species*"),
            ReconstructedRow::new(FraudType::RecordTampering)
                .with(TargetColumn::Classification, "Serious")
                .with(TargetColumn::Commodity, "Tuna")
                .with(TargetColumn::Origin, "Spain"),
            ReconstructedRow::new(FraudType::RecordTampering)
                .with(TargetColumn::ProductCategory, "Fish")
                .with(TargetColumn::Issue, " ** "),
        ];

        let assembly = assemble_records(&rows);
        assert_eq!(assembly.records.len(), 1);
        assert_eq!(assembly.dropped, 2);
        let record = &assembly.records[0];
        assert_eq!(record.issue, "Mislabelled species");
        assert_eq!(record.commodity, "");
        assert_eq!(record.fraud_type, FraudType::RecordTampering);
    }

    #[test]
    fn test_count_mismatch_tolerance() {
        assert_eq!(
            check_count(Some(100), 60, 0.2),
            Some(ExtractionWarning::CountMismatch {
                declared: 100,
                extracted: 60
            })
        );
        assert_eq!(check_count(Some(100), 95, 0.2), None);
        assert_eq!(check_count(Some(100), 80, 0.2), None);
        assert!(check_count(Some(100), 121, 0.2).is_some());
        assert_eq!(check_count(Some(0), 10, 0.2), None);
        assert_eq!(check_count(None, 10, 0.2), None);
    }
}
