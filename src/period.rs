//! Reporting period detection

use crate::model::ReportPeriod;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static COMPACT_FILE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)report[_-]?(\d{4})(\d{2})(?:\D|$)").unwrap());

static SEPARATED_FILE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\D)(\d{4})[-_](\d{2})(?:\D|$)").unwrap());

static MONTH_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(JANUARY|FEBRUARY|MARCH|APRIL|MAY|JUNE|JULY|AUGUST|SEPTEMBER|OCTOBER|NOVEMBER|DECEMBER)\s+(\d{4})\b",
    )
    .unwrap()
});

static MONTH_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2})[-/](\d{4})\b").unwrap());

static YEAR_MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{2})\b").unwrap());

const MONTHS: [&str; 12] = [
    "JANUARY",
    "FEBRUARY",
    "MARCH",
    "APRIL",
    "MAY",
    "JUNE",
    "JULY",
    "AUGUST",
    "SEPTEMBER",
    "OCTOBER",
    "NOVEMBER",
    "DECEMBER",
];

fn parse(year: &str, month: &str) -> Option<ReportPeriod> {
    ReportPeriod::new(year.parse().ok()?, month.parse().ok()?)
}

/// Period encoded in a file name such as `report_202502.pdf` or `2025-02.pdf`
pub fn from_file_name<P: AsRef<Path>>(path: P) -> Option<ReportPeriod> {
    let name = path.as_ref().file_stem()?.to_str()?;

    COMPACT_FILE_NAME
        .captures_iter(name)
        .chain(SEPARATED_FILE_NAME.captures_iter(name))
        .find_map(|caps| parse(&caps[1], &caps[2]))
}

/// Period printed in report text, e.g. "February 2025", "02-2025" or "2025-02"
pub fn from_text(text: &str) -> Option<ReportPeriod> {
    let named = MONTH_NAME.captures_iter(text).find_map(|caps| {
        let month = caps[1].to_uppercase();
        let index = MONTHS.iter().position(|m| *m == month)?;
        ReportPeriod::new(caps[2].parse().ok()?, index as u32 + 1)
    });

    named
        .or_else(|| {
            MONTH_YEAR
                .captures_iter(text)
                .find_map(|caps| parse(&caps[2], &caps[1]))
        })
        .or_else(|| {
            YEAR_MONTH
                .captures_iter(text)
                .find_map(|caps| parse(&caps[1], &caps[2]))
        })
}
