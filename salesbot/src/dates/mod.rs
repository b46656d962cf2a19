//! Date normalization for free-form date and period expressions.
//!
//! Converts any textual date expression into a [`NormalizedDate`]: a single
//! calendar day, a closed range, or `Unresolved` with a reason. Pure and
//! deterministic for a fixed reference date.
//!
//! Policy notes (fixed, not heuristics):
//! - Ambiguous two-part numeric dates (`4-5-2024`) are read day-first:
//!   May 4th 2024, never April 5th. When the day-first reading is not a
//!   valid calendar date the month-first reading is tried before giving up.
//! - Named occasions resolve to the occurrence in the reference year, or
//!   the next occurrence if that date has already passed.
//! - Bare month names and "whole <month>" phrases use the reference year.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::NormalizedDate;

static NUMERIC_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,4})[-/](\d{1,2})[-/](\d{1,4})$").unwrap());
static IN_N_DAYS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^in\s+(\d{1,3})\s+days?$").unwrap());
static NEXT_LAST_WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(next|last)\s+(monday|tuesday|wednesday|thursday|friday|saturday|sunday)$")
        .unwrap()
});
static MONTH_PERIOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:whole\s+|entire\s+|all\s+of\s+)?([a-z]+)(?:\s+(\d{4}))?$").unwrap()
});
static DAY_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:on\s+)?(\d{1,2})(?:st|nd|rd|th)?\s+(?:of\s+)?([a-z]+)(?:,?\s+(\d{4}))?$")
        .unwrap()
});
static MONTH_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:on\s+)?([a-z]+)\s+(\d{1,2})(?:st|nd|rd|th)?(?:,?\s+(\d{4}))?$").unwrap()
});
static EXPLICIT_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})\b").unwrap());

/// Fixed occasion table. Keys are matched as whole phrases inside the
/// expression, longest key first. Dates are month/day in every year.
static OCCASIONS: &[(&str, (u32, u32))] = &[
    ("christmas eve", (12, 24)),
    ("christmas", (12, 25)),
    ("new year's eve", (12, 31)),
    ("new year's day", (1, 1)),
    ("new year", (1, 1)),
    ("valentine's day", (2, 14)),
    ("valentine", (2, 14)),
    ("halloween", (10, 31)),
    ("april fools", (4, 1)),
];

/// Normalize a textual date/period expression against `reference`.
pub fn normalize(expression: &str, reference: NaiveDate) -> NormalizedDate {
    let expr = expression.trim().to_ascii_lowercase();
    if expr.is_empty() {
        return NormalizedDate::Unresolved("empty date expression".to_string());
    }

    // Relative keywords
    match expr.as_str() {
        "today" => return NormalizedDate::Single(reference),
        "tomorrow" => return NormalizedDate::Single(reference + Duration::days(1)),
        "yesterday" => return NormalizedDate::Single(reference - Duration::days(1)),
        _ => {}
    }

    if let Some(caps) = IN_N_DAYS.captures(&expr) {
        // Bounded by the regex to 3 digits, cannot overflow.
        let n: i64 = caps[1].parse().unwrap_or(0);
        return NormalizedDate::Single(reference + Duration::days(n));
    }

    if let Some(caps) = NEXT_LAST_WEEKDAY.captures(&expr) {
        let target = weekday_from_name(&caps[2]).expect("regex restricts weekday names");
        return NormalizedDate::Single(match &caps[1] {
            "next" => next_weekday(reference, target),
            _ => last_weekday(reference, target),
        });
    }

    if let Some(resolved) = resolve_occasion(&expr, reference) {
        return resolved;
    }

    if let Some(caps) = NUMERIC_DATE.captures(&expr) {
        return normalize_numeric(&caps[1], &caps[2], &caps[3]);
    }

    // "4 may 2024" / "may 4, 2024" single dates. Checked before bare month
    // periods so "may 4" is a day, not the whole of May.
    if let Some(caps) = DAY_MONTH.captures(&expr) {
        if let Some(month) = month_from_name(&caps[2]) {
            let day: u32 = caps[1].parse().unwrap_or(0);
            let year = caps
                .get(3)
                .map(|y| y.as_str().parse().unwrap_or(reference.year()))
                .unwrap_or_else(|| reference.year());
            return single_date(year, month, day);
        }
    }
    if let Some(caps) = MONTH_DAY.captures(&expr) {
        if let Some(month) = month_from_name(&caps[1]) {
            let day: u32 = caps[2].parse().unwrap_or(0);
            let year = caps
                .get(3)
                .map(|y| y.as_str().parse().unwrap_or(reference.year()))
                .unwrap_or_else(|| reference.year());
            return single_date(year, month, day);
        }
    }

    // "whole may", "may 2024", bare "may" -> full-month range
    if let Some(caps) = MONTH_PERIOD.captures(&expr) {
        if let Some(month) = month_from_name(&caps[1]) {
            let year = caps
                .get(2)
                .map(|y| y.as_str().parse().unwrap_or(reference.year()))
                .unwrap_or_else(|| reference.year());
            return month_range(year, month);
        }
    }

    NormalizedDate::Unresolved("unparseable date expression".to_string())
}

/// Numeric date with policy: a 4-digit leading part is ISO `YYYY-MM-DD`;
/// otherwise day-first `D-M-YYYY`, falling back to month-first only when
/// the day-first reading is not a valid calendar date.
fn normalize_numeric(a: &str, b: &str, c: &str) -> NormalizedDate {
    if a.len() == 4 {
        let (year, month, day) = (
            a.parse().unwrap_or(0),
            b.parse().unwrap_or(0),
            c.parse().unwrap_or(0),
        );
        return single_date(year, month, day);
    }
    if c.len() != 4 {
        return NormalizedDate::Unresolved("date is missing a 4-digit year".to_string());
    }
    let year: i32 = c.parse().unwrap_or(0);
    let first: u32 = a.parse().unwrap_or(0);
    let second: u32 = b.parse().unwrap_or(0);
    // Day-first precedence, applied consistently.
    if let Some(d) = NaiveDate::from_ymd_opt(year, second, first) {
        return NormalizedDate::Single(d);
    }
    if let Some(d) = NaiveDate::from_ymd_opt(year, first, second) {
        return NormalizedDate::Single(d);
    }
    NormalizedDate::Unresolved(format!("{}-{}-{} is not a calendar date", a, b, c))
}

fn resolve_occasion(expr: &str, reference: NaiveDate) -> Option<NormalizedDate> {
    let (_, (month, day)) = OCCASIONS.iter().find(|(name, _)| expr.contains(name))?;
    // An explicit year ("christmas 2023") pins the occurrence; the
    // rollover policy only applies to the bare occasion name.
    if let Some(caps) = EXPLICIT_YEAR.captures(expr) {
        let year: i32 = caps[1].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, *month, *day).map(NormalizedDate::Single);
    }
    let this_year = NaiveDate::from_ymd_opt(reference.year(), *month, *day)?;
    let resolved = if this_year < reference {
        // Already passed: nearest future occurrence.
        NaiveDate::from_ymd_opt(reference.year() + 1, *month, *day)?
    } else {
        this_year
    };
    Some(NormalizedDate::Single(resolved))
}

fn single_date(year: i32, month: u32, day: u32) -> NormalizedDate {
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(d) => NormalizedDate::Single(d),
        None => NormalizedDate::Unresolved(format!(
            "{}-{}-{} is not a calendar date",
            year, month, day
        )),
    }
}

fn month_range(year: i32, month: u32) -> NormalizedDate {
    let start = match NaiveDate::from_ymd_opt(year, month, 1) {
        Some(d) => d,
        None => {
            return NormalizedDate::Unresolved(format!("invalid month {}-{}", year, month));
        }
    };
    let end = last_day_of_month(year, month);
    NormalizedDate::Range { start, end }
}

fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    first_of_next.expect("valid first of month") - Duration::days(1)
}

fn month_from_name(name: &str) -> Option<u32> {
    let month = match name {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    let day = match name {
        "monday" => Weekday::Mon,
        "tuesday" => Weekday::Tue,
        "wednesday" => Weekday::Wed,
        "thursday" => Weekday::Thu,
        "friday" => Weekday::Fri,
        "saturday" => Weekday::Sat,
        "sunday" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

/// Strictly-future next occurrence of `target` after `from`.
fn next_weekday(from: NaiveDate, target: Weekday) -> NaiveDate {
    let ahead = (target.num_days_from_monday() + 7 - from.weekday().num_days_from_monday()) % 7;
    let ahead = if ahead == 0 { 7 } else { ahead };
    from + Duration::days(ahead as i64)
}

/// Strictly-past previous occurrence of `target` before `from`.
fn last_weekday(from: NaiveDate, target: Weekday) -> NaiveDate {
    let back = (from.weekday().num_days_from_monday() + 7 - target.num_days_from_monday()) % 7;
    let back = if back == 0 { 7 } else { back };
    from - Duration::days(back as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn reference() -> NaiveDate {
        // A Wednesday.
        date(2024, 5, 15)
    }

    #[test]
    fn iso_dates_parse_and_are_idempotent() {
        let first = normalize("2024-05-01", reference());
        assert_eq!(first, NormalizedDate::Single(date(2024, 5, 1)));
        if let NormalizedDate::Single(d) = first {
            // Canonical rendering round-trips to the same single date.
            assert_eq!(
                normalize(&d.to_string(), reference()),
                NormalizedDate::Single(d)
            );
        }
    }

    #[test]
    fn ambiguous_two_part_dates_are_day_first() {
        assert_eq!(
            normalize("4-5-2024", reference()),
            NormalizedDate::Single(date(2024, 5, 4))
        );
        assert_eq!(
            normalize("04/05/2024", reference()),
            NormalizedDate::Single(date(2024, 5, 4))
        );
        // Unambiguous because 13 cannot be a month.
        assert_eq!(
            normalize("13-5-2024", reference()),
            NormalizedDate::Single(date(2024, 5, 13))
        );
        // Day-first impossible (month 25), month-first reading taken.
        assert_eq!(
            normalize("5-25-2024", reference()),
            NormalizedDate::Single(date(2024, 5, 25))
        );
    }

    #[test]
    fn relative_expressions_resolve_against_reference() {
        assert_eq!(
            normalize("today", reference()),
            NormalizedDate::Single(date(2024, 5, 15))
        );
        assert_eq!(
            normalize("Tomorrow", reference()),
            NormalizedDate::Single(date(2024, 5, 16))
        );
        assert_eq!(
            normalize("yesterday", reference()),
            NormalizedDate::Single(date(2024, 5, 14))
        );
        assert_eq!(
            normalize("in 10 days", reference()),
            NormalizedDate::Single(date(2024, 5, 25))
        );
    }

    #[test]
    fn next_and_last_weekdays_are_strict() {
        // Reference is a Wednesday; "next wednesday" is a week out.
        assert_eq!(
            normalize("next wednesday", reference()),
            NormalizedDate::Single(date(2024, 5, 22))
        );
        assert_eq!(
            normalize("next friday", reference()),
            NormalizedDate::Single(date(2024, 5, 17))
        );
        assert_eq!(
            normalize("last monday", reference()),
            NormalizedDate::Single(date(2024, 5, 13))
        );
        assert_eq!(
            normalize("last wednesday", reference()),
            NormalizedDate::Single(date(2024, 5, 8))
        );
    }

    #[test]
    fn occasions_roll_to_next_year_once_passed() {
        assert_eq!(
            normalize("christmas", reference()),
            NormalizedDate::Single(date(2024, 12, 25))
        );
        // Valentine's day 2024 already passed by mid-May.
        assert_eq!(
            normalize("valentine's day", reference()),
            NormalizedDate::Single(date(2025, 2, 14))
        );
        assert_eq!(
            normalize("on christmas eve", reference()),
            NormalizedDate::Single(date(2024, 12, 24))
        );
    }

    #[test]
    fn occasions_with_an_explicit_year_do_not_roll() {
        assert_eq!(
            normalize("christmas 2023", reference()),
            NormalizedDate::Single(date(2023, 12, 25))
        );
        // Explicit year in the past beats the rollover policy too.
        assert_eq!(
            normalize("valentine's day 2024", reference()),
            NormalizedDate::Single(date(2024, 2, 14))
        );
    }

    #[test]
    fn month_periods_cover_the_whole_month() {
        let expected = NormalizedDate::Range {
            start: date(2024, 5, 1),
            end: date(2024, 5, 31),
        };
        assert_eq!(normalize("whole may", reference()), expected);
        assert_eq!(normalize("entire may", reference()), expected);
        assert_eq!(normalize("all of may", reference()), expected);
        assert_eq!(normalize("may 2024", reference()), expected);
        assert_eq!(normalize("may", reference()), expected);
        assert_eq!(
            normalize("february 2024", reference()),
            NormalizedDate::Range {
                start: date(2024, 2, 1),
                end: date(2024, 2, 29),
            }
        );
    }

    #[test]
    fn day_and_month_name_forms_are_single_dates() {
        assert_eq!(
            normalize("4 may 2024", reference()),
            NormalizedDate::Single(date(2024, 5, 4))
        );
        assert_eq!(
            normalize("on 4th of may", reference()),
            NormalizedDate::Single(date(2024, 5, 4))
        );
        assert_eq!(
            normalize("May 4, 2024", reference()),
            NormalizedDate::Single(date(2024, 5, 4))
        );
    }

    #[test]
    fn unrecognized_expressions_are_unresolved() {
        assert!(matches!(
            normalize("the day the music died", reference()),
            NormalizedDate::Unresolved(_)
        ));
        assert!(matches!(
            normalize("", reference()),
            NormalizedDate::Unresolved(_)
        ));
        assert!(matches!(
            normalize("32-13-2024", reference()),
            NormalizedDate::Unresolved(_)
        ));
        // Two-part numeric without a 4-digit year is rejected.
        assert!(matches!(
            normalize("4-5-24", reference()),
            NormalizedDate::Unresolved(_)
        ));
    }
}
