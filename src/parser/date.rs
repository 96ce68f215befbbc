use crate::errors::ParseError;
use chrono::{DateTime, NaiveDate};

/// Integers above this are epoch milliseconds, at or below it epoch seconds.
pub const EPOCH_MILLIS_THRESHOLD: i64 = 10_000_000_000;

/// A date token as it came off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawDate {
    Epoch(i64),
    Text(String),
    /// Already a calendar date (e.g. decoded from `Date.UTC(y, m, d)`).
    Calendar(NaiveDate),
}

pub fn date_from_epoch(value: i64) -> Result<NaiveDate, ParseError> {
    let (secs, nanos) = if value > EPOCH_MILLIS_THRESHOLD {
        (value.div_euclid(1000), (value.rem_euclid(1000) * 1_000_000) as u32)
    } else {
        (value, 0)
    };

    DateTime::from_timestamp(secs, nanos)
        .map(|dt| dt.date_naive())
        .ok_or(ParseError::TimestampOutOfRange(value))
}

/// Try each format in order; the first one that parses wins. A purely
/// numeric token that matches none of them is read as an epoch.
pub fn parse_date_text<S: AsRef<str>>(text: &str, formats: &[S]) -> Result<NaiveDate, ParseError> {
    let token = text.trim();
    if token.is_empty() {
        return Err(ParseError::Empty);
    }

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(token, fmt.as_ref()) {
            return Ok(date);
        }
    }

    if token.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(value) = token.parse::<i64>() {
            return date_from_epoch(value);
        }
    }

    Err(ParseError::UnknownDateFormat(token.to_string()))
}

pub fn parse_date<S: AsRef<str>>(raw: &RawDate, formats: &[S]) -> Result<NaiveDate, ParseError> {
    match raw {
        RawDate::Epoch(value) => date_from_epoch(*value),
        RawDate::Text(text) => parse_date_text(text, formats),
        RawDate::Calendar(date) => Ok(*date),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_DATE_FORMATS;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_epoch_millis_and_seconds() {
        assert_eq!(date_from_epoch(1_700_000_000_000).unwrap(), ymd(2023, 11, 14));
        assert_eq!(date_from_epoch(1_700_000_000).unwrap(), ymd(2023, 11, 14));
        assert_eq!(date_from_epoch(0).unwrap(), ymd(1970, 1, 1));
    }

    #[test]
    fn test_textual_formats_agree() {
        let iso = parse_date_text("2024-01-05", &DEFAULT_DATE_FORMATS).unwrap();
        let br = parse_date_text("05/01/2024", &DEFAULT_DATE_FORMATS).unwrap();
        assert_eq!(iso, ymd(2024, 1, 5));
        assert_eq!(iso, br);
        assert_eq!(parse_date_text("2024/01/05", &DEFAULT_DATE_FORMATS).unwrap(), iso);
        assert_eq!(parse_date_text("20240105", &DEFAULT_DATE_FORMATS).unwrap(), iso);
    }

    #[test]
    fn test_format_order_decides_ambiguous_dates() {
        let day_first = ["%d/%m/%Y", "%m/%d/%Y"];
        let month_first = ["%m/%d/%Y", "%d/%m/%Y"];
        assert_eq!(parse_date_text("01/02/2024", &day_first).unwrap(), ymd(2024, 2, 1));
        assert_eq!(parse_date_text("01/02/2024", &month_first).unwrap(), ymd(2024, 1, 2));
        // 默认顺序：日在前
        assert_eq!(parse_date_text("01/02/2024", &DEFAULT_DATE_FORMATS), Ok(ymd(2024, 2, 1)));
    }

    #[test]
    fn test_numeric_text_falls_back_to_epoch() {
        assert_eq!(
            parse_date(&RawDate::Text("1700000000000".into()), &DEFAULT_DATE_FORMATS).unwrap(),
            ymd(2023, 11, 14)
        );
        assert_eq!(
            parse_date(&RawDate::Epoch(1_700_000_000_000), &DEFAULT_DATE_FORMATS).unwrap(),
            ymd(2023, 11, 14)
        );
    }

    #[test]
    fn test_unparseable_dates() {
        assert_eq!(parse_date_text("", &DEFAULT_DATE_FORMATS), Err(ParseError::Empty));
        assert!(matches!(
            parse_date_text("ontem", &DEFAULT_DATE_FORMATS),
            Err(ParseError::UnknownDateFormat(_))
        ));
        assert!(matches!(
            date_from_epoch(i64::MAX),
            Err(ParseError::TimestampOutOfRange(_))
        ));
    }
}
