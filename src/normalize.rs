use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const DATE_FORMATS: [&str; 9] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%b/%Y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%m/%d/%Y",
    "%m-%d-%Y",
];

/// A calendar month. Every monthly stat row is keyed by one of these, whatever
/// format its date cell was typed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && (1000..=9999).contains(&year) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Tolerant month parser.
    ///
    /// Looks for a four digit year and an English month abbreviation anywhere in
    /// the text. Without a month name, numeric `Y-M-...` and `M-D-Y` layouts are
    /// tried, then a full date parse. Returns `None` when nothing fits.
    pub fn parse(text: &str) -> Option<Self> {
        let lower = text.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }

        let year = year_pattern().find(&lower).map(|m| m.as_str().to_string());

        if let Some(year) = year.as_deref() {
            let month = MONTH_ABBREVIATIONS
                .iter()
                .position(|abbr| lower.contains(&abbr.to_lowercase()))
                .map(|index| index as u32 + 1)
                .or_else(|| numeric_month(&lower, year));

            if let Some(month) = month {
                if let Some(key) = year.parse().ok().and_then(|y| MonthKey::new(y, month)) {
                    return Some(key);
                }
            }
        }

        parse_date(text).map(MonthKey::from_date)
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next().first_day() - Days::new(1)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Canonical `01/Mon/YYYY` label used in stat rows and task descriptions.
    pub fn label(&self) -> String {
        format!(
            "01/{}/{}",
            MONTH_ABBREVIATIONS[(self.month - 1) as usize],
            self.year
        )
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

fn year_pattern() -> &'static Regex {
    static YEAR: OnceLock<Regex> = OnceLock::new();
    YEAR.get_or_init(|| Regex::new(r"\d{4}").expect("year pattern is valid"))
}

fn numeric_month(lower: &str, year: &str) -> Option<u32> {
    let parts: Vec<&str> = lower.split(['-', '/']).map(str::trim).collect();
    if parts.len() < 2 {
        return None;
    }

    let candidate = if parts[0] == year {
        parts[1]
    } else if parts.get(2) == Some(&year) {
        parts[0]
    } else {
        return None;
    };

    leading_digits(candidate).parse().ok()
}

fn leading_digits(text: &str) -> &str {
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    &text[..end]
}

/// Parses a calendar date in any of the layouts seen in the store.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }

    if let Ok(value) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(value.date_naive());
    }

    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .map(|value| value.date())
}

/// Counter cells may carry thousands separators or junk; anything unreadable is 0.
pub fn parse_count(text: &str) -> u32 {
    let cleaned: String = text.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim();
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(cleaned)),
    };

    let digits = leading_digits(digits);
    if negative || digits.is_empty() {
        return 0;
    }

    digits.parse::<u64>().map(|v| v.min(u32::MAX as u64) as u32).unwrap_or(u32::MAX)
}

/// Strike cells are typed by hand: `TRUE`, `Yes`, `1` or a plain count.
pub fn parse_strike(text: &str) -> u32 {
    match text.trim().to_uppercase().as_str() {
        "TRUE" | "YES" | "1" => 1,
        other => parse_count(other),
    }
}

pub fn parse_flag(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("true")
}

pub fn flag_cell(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Key used to match names across tables.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Looser key for pasted panel exports, which drop or double spaces.
pub fn compact_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// `DD/Mon/YYYY`, the timestamp layout written to every log table.
pub fn timestamp_label(date: NaiveDate) -> String {
    date.format("%d/%b/%Y").to_string()
}

pub fn months_before(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(months)).unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(year: i32, month: u32) -> MonthKey {
        MonthKey::new(year, month).unwrap()
    }

    #[test]
    fn month_key_accepts_observed_formats() {
        assert_eq!(MonthKey::parse("2024-03-01"), Some(key(2024, 3)));
        assert_eq!(MonthKey::parse("2024-03"), Some(key(2024, 3)));
        assert_eq!(MonthKey::parse("01/Mar/2024"), Some(key(2024, 3)));
        assert_eq!(MonthKey::parse("  mar 2024 "), Some(key(2024, 3)));
        assert_eq!(MonthKey::parse("MARCH 2024"), Some(key(2024, 3)));
        assert_eq!(MonthKey::parse("03/15/2024"), Some(key(2024, 3)));
        assert_eq!(MonthKey::parse("3-15-2024"), Some(key(2024, 3)));
        assert_eq!(MonthKey::parse("2024/11/02"), Some(key(2024, 11)));
        assert_eq!(MonthKey::parse("2024-03-15T10:00:00Z"), Some(key(2024, 3)));
    }

    #[test]
    fn month_key_rejects_garbage() {
        assert_eq!(MonthKey::parse(""), None);
        assert_eq!(MonthKey::parse("sometime soon"), None);
        assert_eq!(MonthKey::parse("2024"), None);
        assert_eq!(MonthKey::parse("15/13/2024"), None);
    }

    #[test]
    fn month_key_span() {
        assert_eq!(key(2024, 2).last_day(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(key(2023, 2).last_day(), NaiveDate::from_ymd_opt(2023, 2, 28).unwrap());
        assert_eq!(key(2024, 12).last_day(), NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert_eq!(key(2024, 12).next(), key(2025, 1));
        assert_eq!(key(2024, 3).label(), "01/Mar/2024");
    }

    #[test]
    fn dates_parse_in_each_layout() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        for text in [
            "2024-03-05",
            "2024/03/05",
            "05/Mar/2024",
            "05-Mar-2024",
            "5 Mar 2024",
            "Mar 5, 2024",
            "03/05/2024",
            "03-05-2024",
            "2024-03-05T08:30:00Z",
        ] {
            assert_eq!(parse_date(text), Some(expected), "{text}");
        }
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn counts_parse_tolerantly() {
        assert_eq!(parse_count("1,234"), 1234);
        assert_eq!(parse_count(" 42 "), 42);
        assert_eq!(parse_count("12.7"), 12);
        assert_eq!(parse_count(""), 0);
        assert_eq!(parse_count("n/a"), 0);
        assert_eq!(parse_count("-3"), 0);
        assert_eq!(parse_count("+5"), 5);
        assert_eq!(parse_count(" +1,204"), 1204);
    }

    #[test]
    fn strikes_accept_boolean_words() {
        assert_eq!(parse_strike("TRUE"), 1);
        assert_eq!(parse_strike("yes"), 1);
        assert_eq!(parse_strike("1"), 1);
        assert_eq!(parse_strike("2"), 2);
        assert_eq!(parse_strike("FALSE"), 0);
        assert_eq!(parse_strike(""), 0);
    }

    #[test]
    fn names_compare_loosely() {
        assert_eq!(name_key("  Ash Reyes "), "ash reyes");
        assert_eq!(compact_name("Ash  Reyes"), "ashreyes");
        assert!(parse_flag("true"));
        assert!(!parse_flag("FALSE"));
    }
}
