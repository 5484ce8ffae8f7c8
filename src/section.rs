//! Fraud-type section detection
//!
//! Reports split their incident tables into three numbered sections. A page
//! either announces a section heading or continues the previous one.

use crate::model::FraudType;
use once_cell::sync::Lazy;
use regex::Regex;

/// Verdict for one page of text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionVerdict {
    /// The page announces this section
    Heading(FraudType),
    /// No heading on the page; the current section continues
    Unchanged,
}

static NUMBERED_HEADINGS: Lazy<Vec<(Regex, FraudType)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"(?i)\b1\s*[.):\-]?\s*PRODUCT\s+TAMPERING").unwrap(),
            FraudType::ProductTampering,
        ),
        (
            Regex::new(r"(?i)\b2\s*[.):\-]?\s*RECORD\s+TAMPERING").unwrap(),
            FraudType::RecordTampering,
        ),
        (
            Regex::new(r"(?i)\b3\s*[.):\-]?\s*OTHER\s+NON\s*-?\s*COMPLIANCES?").unwrap(),
            FraudType::OtherNonCompliances,
        ),
    ]
});

const BARE_LABELS: [(&str, FraudType); 3] = [
    ("PRODUCT TAMPERING", FraudType::ProductTampering),
    ("RECORD TAMPERING", FraudType::RecordTampering),
    ("OTHER NON-COMPLIANCES", FraudType::OtherNonCompliances),
];

/// Classify a page by the section heading it contains.
///
/// Numbered headings win over bare labels. When several headings appear on
/// one page the one that occurs last is returned, since its section is the
/// one that continues onto the following pages.
pub fn classify_page(text: &str) -> SectionVerdict {
    let numbered = NUMBERED_HEADINGS
        .iter()
        .filter_map(|(re, fraud_type)| {
            re.find_iter(text)
                .last()
                .map(|m| (m.start(), *fraud_type))
        })
        .max_by_key(|(pos, _)| *pos);

    if let Some((_, fraud_type)) = numbered {
        return SectionVerdict::Heading(fraud_type);
    }

    // Bare labels are matched case-sensitively: headings are set in capitals,
    // prose mentioning "product tampering" is not a heading.
    BARE_LABELS
        .iter()
        .filter_map(|(label, fraud_type)| text.rfind(label).map(|pos| (pos, *fraud_type)))
        .max_by_key(|(pos, _)| *pos)
        .map_or(SectionVerdict::Unchanged, |(_, fraud_type)| {
            SectionVerdict::Heading(fraud_type)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_headings() {
        assert_eq!(
            classify_page("Summary\n1. PRODUCT TAMPERING\nClassification ..."),
            SectionVerdict::Heading(FraudType::ProductTampering)
        );
        assert_eq!(
            classify_page("2. RECORD TAMPERING"),
            SectionVerdict::Heading(FraudType::RecordTampering)
        );
        assert_eq!(
            classify_page("3. OTHER NON-COMPLIANCES"),
            SectionVerdict::Heading(FraudType::OtherNonCompliances)
        );
    }

    #[test]
    fn test_numbered_heading_tolerates_spacing_and_case() {
        assert_eq!(
            classify_page("2 )  Record   tampering"),
            SectionVerdict::Heading(FraudType::RecordTampering)
        );
        assert_eq!(
            classify_page("3.Other non compliances"),
            SectionVerdict::Heading(FraudType::OtherNonCompliances)
        );
        assert_eq!(
            classify_page("1:PRODUCT\nTAMPERING"),
            SectionVerdict::Heading(FraudType::ProductTampering)
        );
    }

    #[test]
    fn test_bare_label_fallback() {
        assert_eq!(
            classify_page("Section RECORD TAMPERING continued"),
            SectionVerdict::Heading(FraudType::RecordTampering)
        );
    }

    #[test]
    fn test_prose_mention_is_not_a_heading() {
        assert_eq!(
            classify_page("cases of product tampering were reported by members"),
            SectionVerdict::Unchanged
        );
    }

    #[test]
    fn test_no_heading_is_unchanged() {
        assert_eq!(classify_page(""), SectionVerdict::Unchanged);
        assert_eq!(
            classify_page("Fish | Mislabelled species | Vietnam"),
            SectionVerdict::Unchanged
        );
    }

    #[test]
    fn test_last_heading_on_page_wins() {
        let text = "... end of tables\n1. PRODUCT TAMPERING\nrows\n2. RECORD TAMPERING\nrows";
        assert_eq!(
            classify_page(text),
            SectionVerdict::Heading(FraudType::RecordTampering)
        );
    }

    #[test]
    fn test_numbered_beats_bare_label() {
        let text = "3. OTHER NON-COMPLIANCES\nsee also RECORD TAMPERING";
        assert_eq!(
            classify_page(text),
            SectionVerdict::Heading(FraudType::OtherNonCompliances)
        );
    }
}
