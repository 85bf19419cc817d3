//! Free-text historical dates to calendar dates.
//!
//! Inexact qualifiers from the German export are mapped onto one exact date:
//! "um"/"ca" (around) and bare years become 1 January of that year, "vor"
//! (before) the year earlier and "nach" (after) the year later.

use crate::error::{EtlError, Result};
use crate::types::DateField;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2})[./\-](\d{1,2})[./\-](\d{4})").expect("valid date regex")
});

const APPROXIMATE_MARKERS: &[&str] = &["ca. ", "ca ", "ca"];

/// Parse one raw date string. Null, empty and `?` mean unknown.
pub fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>> {
    let Some(original) = raw else {
        return Ok(None);
    };
    if original.trim().is_empty() || original.trim() == "?" {
        return Ok(None);
    }

    // Qualifiers are applied in a fixed order, each on the previous result.
    let mut value = original.to_string();

    if value.contains("um ") {
        value = value.replacen("um ", "01.01.", 1);
    }

    if value.contains("ca") {
        if let Some(marker) = APPROXIMATE_MARKERS.iter().find(|m| value.contains(**m)) {
            value = value.replacen(*marker, "01.01.", 1);
        }
    }

    if value.contains("vor ") {
        let year = parse_year(original, &value.replacen("vor ", "", 1))?
            .checked_sub(1)
            .ok_or_else(|| EtlError::date_parse(original, "year out of range"))?;
        value = format!("01.01.{}", year);
    }

    if value.contains("nach ") {
        let year = parse_year(original, &value.replacen("nach ", "", 1))?
            .checked_add(1)
            .ok_or_else(|| EtlError::date_parse(original, "year out of range"))?;
        value = format!("01.01.{}", year);
    }

    if !value.contains('.') {
        value = format!("01.01.{}", value.trim());
    }

    let caps = DAY_MONTH_YEAR
        .captures(&value)
        .ok_or_else(|| EtlError::date_parse(original, "no day.month.year pattern"))?;

    let day: u32 = caps[1].parse().map_err(|_| EtlError::date_parse(original, "bad day"))?;
    let month: u32 = caps[2].parse().map_err(|_| EtlError::date_parse(original, "bad month"))?;
    let year: i32 = caps[3].parse().map_err(|_| EtlError::date_parse(original, "bad year"))?;

    NaiveDate::from_ymd_opt(year, month, day)
        .map(Some)
        .ok_or_else(|| EtlError::date_parse(original, "not a calendar date"))
}

fn parse_year(original: &str, value: &str) -> Result<i32> {
    value
        .trim()
        .parse()
        .map_err(|_| EtlError::date_parse(original, format!("'{}' is not a year", value.trim())))
}

/// Replace a raw date field with its parsed form; parsed fields are kept.
pub fn normalize_field(field: Option<DateField>) -> Result<Option<DateField>> {
    match field {
        None => Ok(None),
        Some(DateField::Parsed(date)) => Ok(Some(DateField::Parsed(date))),
        Some(DateField::Raw(raw)) => Ok(parse_date(Some(&raw))?.map(DateField::Parsed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_no_values() {
        assert_eq!(parse_date(None).unwrap(), None);
        assert_eq!(parse_date(Some("")).unwrap(), None);
        assert_eq!(parse_date(Some("?")).unwrap(), None);
    }

    #[test]
    fn test_exact_dates() {
        assert_eq!(parse_date(Some("24.12.1850")).unwrap(), date(1850, 12, 24));
        assert_eq!(parse_date(Some("1.2.1799")).unwrap(), date(1799, 2, 1));
        assert_eq!(parse_date(Some("03.07.1901")).unwrap(), date(1901, 7, 3));
    }

    #[test]
    fn test_inexact_same_values() {
        let expected = date(1800, 1, 1);
        assert_eq!(parse_date(Some("um 1800")).unwrap(), expected);
        assert_eq!(parse_date(Some("ca 1800")).unwrap(), expected);
        assert_eq!(parse_date(Some("ca. 1800")).unwrap(), expected);
        assert_eq!(parse_date(Some("1800")).unwrap(), expected);
    }

    #[test]
    fn test_inexact_before_and_after() {
        assert_eq!(parse_date(Some("vor 1800")).unwrap(), date(1799, 1, 1));
        assert_eq!(parse_date(Some("nach 1800")).unwrap(), date(1801, 1, 1));
    }

    #[test]
    fn test_pattern_extracted_from_noise() {
        assert_eq!(parse_date(Some("getauft 05.03.1822 in Weng")).unwrap(), date(1822, 3, 5));
    }

    #[test]
    fn test_invalid_calendar_date() {
        let err = parse_date(Some("01.13.1800")).unwrap_err();
        assert!(matches!(err, EtlError::DateParse { .. }));
    }

    #[test]
    fn test_unparseable() {
        assert!(matches!(parse_date(Some("unbekannt")), Err(EtlError::DateParse { .. })));
        assert!(matches!(parse_date(Some("vor Krieg")), Err(EtlError::DateParse { .. })));
    }

    #[test]
    fn test_qualifier_at_year_limit() {
        let err = parse_date(Some("nach 2147483647")).unwrap_err();
        assert!(matches!(err, EtlError::DateParse { ref reason, .. } if reason == "year out of range"));
        let err = parse_date(Some("vor -2147483648")).unwrap_err();
        assert!(matches!(err, EtlError::DateParse { ref reason, .. } if reason == "year out of range"));
    }

    // Combined qualifiers have no documented meaning; these pin down the
    // literal rule order rather than an intended interpretation.
    #[test]
    fn test_combined_qualifiers_follow_rule_order() {
        // "ca" runs before "vor", leaving a full date that is not a bare year
        assert!(parse_date(Some("vor ca 1800")).is_err());
        // "um" rewrites to a full date, so "nach" cannot parse a year
        assert!(parse_date(Some("nach um 1800")).is_err());
    }

    #[test]
    fn test_normalize_field() {
        assert_eq!(normalize_field(None).unwrap(), None);
        assert_eq!(
            normalize_field(Some(DateField::Raw("um 1750".to_string()))).unwrap(),
            Some(DateField::Parsed(NaiveDate::from_ymd_opt(1750, 1, 1).unwrap()))
        );
        assert_eq!(normalize_field(Some(DateField::Raw("?".to_string()))).unwrap(), None);

        let parsed = Some(DateField::Parsed(NaiveDate::from_ymd_opt(1790, 5, 6).unwrap()));
        assert_eq!(normalize_field(parsed.clone()).unwrap(), parsed);
    }
}
