//! Normalization of merged records into their final batch order.
//!
//! [`normalize`] is a pure function: dedupe by URL (first occurrence wins),
//! standardize dates, replace unset optional fields with the "not informed"
//! sentinel, sort newest first with undated records last, and stamp every
//! record with the batch timestamp. Running it on its own output changes
//! nothing.

use crate::models::ExtractionRecord;
use chrono::{DateTime, NaiveDate, Utc};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use tracing::debug;

static NUMERIC_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4}|\d{2})\b").expect("valid numeric date regex")
});

static LONG_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s+de\s+(\p{L}+)\s+de\s+(\d{4})\b").expect("valid long date regex")
});

const MONTHS: [&str; 12] = [
    "janeiro",
    "fevereiro",
    "março",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

/// Month number (1-12) for a Portuguese month name.
pub fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == name)
        .map(|idx| idx as u32 + 1)
}

/// Parse the first recognizable date in source-native text.
///
/// Accepts `D/M/Y` (also `-` and `.` separators, two-digit years read as
/// `20YY`) and `D de <mês> de YYYY`. Returns `None` for anything else,
/// including dates that do not exist on the calendar.
pub fn standardize_date(raw: &str) -> Option<NaiveDate> {
    if let Some(caps) = NUMERIC_DATE.captures(raw) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year_text = &caps[3];
        let mut year: i32 = year_text.parse().ok()?;
        if year_text.len() == 2 {
            year += 2000;
        }
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    let caps = LONG_DATE.captures(raw)?;
    let day: u32 = caps[1].parse().ok()?;
    let month = month_number(&caps[2])?;
    let year: i32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn newest_first(a: &Option<NaiveDate>, b: &Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Turn a merged record list into final batch order.
pub fn normalize(records: Vec<ExtractionRecord>, extracted_at: DateTime<Utc>) -> Vec<ExtractionRecord> {
    let before = records.len();

    let mut out: Vec<ExtractionRecord> = records
        .into_iter()
        .unique_by(|r| r.url.clone())
        .map(|mut record| {
            record.normalized_date = standardize_date(&record.raw_date);
            record.buyer = record.buyer.or_not_informed();
            record.acquired = record.acquired.or_not_informed();
            record.value = record.value.or_not_informed();
            record.multiple = record.multiple.or_not_informed();
            record.extracted_at = extracted_at;
            record
        })
        .collect();

    // `sort_by` is stable, so merge order breaks ties.
    out.sort_by(|a, b| newest_first(&a.normalized_date, &b.normalized_date));

    debug!(
        before,
        after = out.len(),
        duplicates = before - out.len(),
        "Normalized records"
    );
    out
}
