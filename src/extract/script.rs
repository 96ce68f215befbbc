use crate::errors::{DataHubError, ParseError, Result};
use crate::models::SeriesPoint;
use crate::parser::{parse_date, parse_liquidity, try_number, RawDate};
use chrono::NaiveDate;
use log::debug;
use regex::Regex;
use serde_json::Value as Json;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static BRACKET_GROUP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\[\]]*)\]").unwrap());
static DATE_UTC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Date\.UTC\(\s*(\d{4})\s*,\s*(\d{1,2})\s*,\s*(\d{1,2})[^)]*\)\s*,\s*(-?\d+(?:[.,]\d+)?)").unwrap()
});
static COTACOES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)var\s+cotacoes\s*=\s*(\[.*?\])\s*;").unwrap());
static COTACOES_GREEDY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)var\s+cotacoes\s*=\s*(\[.*\])").unwrap());

const DATE_KEYS: [&str; 4] = ["Data", "data", "date", "x"];
const PRICE_KEYS: [&str; 4] = ["Preco", "preco", "close", "y"];
const VOLUME_KEYS: [&str; 3] = ["Volume", "volume", "v"];

/// One chart/history observation before typing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPoint {
    pub date: RawDate,
    pub value: String,
    pub volume: Option<String>,
}

impl RawPoint {
    pub fn new(date: RawDate, value: &str) -> Self {
        Self {
            date,
            value: value.to_string(),
            volume: None,
        }
    }

    /// Type the point. A bad date or value fails only this point.
    pub fn to_series_point<S: AsRef<str>>(&self, formats: &[S]) -> std::result::Result<SeriesPoint, ParseError> {
        let date = parse_date(&self.date, formats)?;
        let value = try_number(&self.value)?;
        let volume = self.volume.as_deref().and_then(parse_liquidity);
        Ok(SeriesPoint::new(date, value).with_volume(volume))
    }
}

/// Type a batch of raw points, returning the good ones and how many were dropped.
pub fn to_series_points<S: AsRef<str>>(raw: &[RawPoint], formats: &[S]) -> (Vec<SeriesPoint>, usize) {
    let mut points = Vec::with_capacity(raw.len());
    let mut dropped = 0;
    for item in raw {
        match item.to_series_point(formats) {
            Ok(point) => points.push(point),
            Err(e) => {
                debug!("dropping point {:?}: {}", item, e);
                dropped += 1;
            }
        }
    }
    (points, dropped)
}

/// Read `var NAME = [[ts, v], ...];` anywhere in the document.
///
/// Groups with fewer than two members are skipped; numeric validation is
/// left to [`RawPoint::to_series_point`].
pub fn extract_var_pairs(document: &str, var: &str) -> Vec<RawPoint> {
    let pattern = format!(r"(?is)var\s+{}\s*=\s*\[(.*?)\]\s*;", regex::escape(var));
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };
    let Some(body) = re.captures(document).and_then(|c| c.get(1)) else {
        return Vec::new();
    };

    BRACKET_GROUP_RE
        .captures_iter(body.as_str())
        .filter_map(|caps| {
            let inner = caps.get(1)?.as_str();
            let mut parts = inner.split(',').map(str::trim);
            let ts = parts.next().filter(|s| !s.is_empty())?;
            let value = parts.next().filter(|s| !s.is_empty())?;
            Some(RawPoint::new(raw_date_token(ts), unquote(value)))
        })
        .collect()
}

/// Pair `LABELS.push(ts)` with `VALUES.push(v)` calls by position.
/// Mismatched lengths mean the page changed shape; nothing is returned.
pub fn extract_push_series(document: &str, labels: &str, values: &str) -> Vec<RawPoint> {
    let label_args = push_arguments(document, labels);
    let value_args = push_arguments(document, values);

    if label_args.len() != value_args.len() {
        debug!(
            "{} has {} entries but {} has {}, ignoring",
            labels,
            label_args.len(),
            values,
            value_args.len()
        );
        return Vec::new();
    }

    label_args
        .iter()
        .zip(value_args.iter())
        .map(|(ts, v)| RawPoint::new(raw_date_token(ts), unquote(v)))
        .collect()
}

/// `Date.UTC(2024, 0, 15), 0.85` pairs. The month is zero-based.
pub fn extract_date_utc_pairs(document: &str) -> Vec<RawPoint> {
    DATE_UTC_RE
        .captures_iter(document)
        .filter_map(|caps| {
            let year: i32 = caps.get(1)?.as_str().parse().ok()?;
            let month: u32 = caps.get(2)?.as_str().parse().ok()?;
            let day: u32 = caps.get(3)?.as_str().parse().ok()?;
            let date = NaiveDate::from_ymd_opt(year, month + 1, day)?;
            Some(RawPoint::new(RawDate::Calendar(date), caps.get(4)?.as_str()))
        })
        .collect()
}

/// Closing-price history payload: either plain JSON or a script with
/// `var cotacoes = [...]`. Items are `[ts, price, volume?]` arrays or
/// objects keyed `Data`/`Preco`/`Volume` (and lowercase / chart aliases).
pub fn extract_price_history(text: &str) -> Result<Vec<RawPoint>> {
    let json = match serde_json::from_str::<Json>(text.trim()) {
        Ok(json) => json,
        Err(_) => {
            let literal = COTACOES_RE
                .captures(text)
                .or_else(|| COTACOES_GREEDY_RE.captures(text))
                .and_then(|c| c.get(1))
                .ok_or_else(|| DataHubError::Extraction("no price history payload found".to_string()))?;
            serde_json::from_str::<Json>(literal.as_str())?
        }
    };

    let items: &[Json] = match &json {
        Json::Array(items) => items.as_slice(),
        Json::Object(map) => match map.get("cotacoes").or_else(|| map.get("data")) {
            Some(Json::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    Ok(items.iter().filter_map(json_point).collect())
}

/// Codes matching `pattern` anywhere in `text`, deduplicated and sorted.
pub fn extract_codes(text: &str, pattern: &Regex) -> Vec<String> {
    pattern
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn json_point(item: &Json) -> Option<RawPoint> {
    let (date, value, volume) = match item {
        Json::Array(parts) => (parts.first()?, parts.get(1)?, parts.get(2)),
        Json::Object(map) => {
            let date = DATE_KEYS.iter().find_map(|k| map.get(*k))?;
            let value = PRICE_KEYS.iter().find_map(|k| map.get(*k))?;
            let volume = VOLUME_KEYS.iter().find_map(|k| map.get(*k));
            (date, value, volume)
        }
        _ => return None,
    };

    Some(RawPoint {
        date: json_date(date)?,
        value: json_scalar(value)?,
        volume: volume.and_then(json_volume),
    })
}

fn json_date(value: &Json) -> Option<RawDate> {
    match value {
        Json::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(RawDate::Epoch),
        Json::String(s) => Some(raw_date_token(s)),
        _ => None,
    }
}

fn json_scalar(value: &Json) -> Option<String> {
    match value {
        Json::Number(n) => Some(n.to_string()),
        Json::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn json_volume(value: &Json) -> Option<String> {
    match value {
        Json::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(|v| v.to_string()),
        Json::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn push_arguments(document: &str, name: &str) -> Vec<String> {
    let pattern = format!(r"{}\.push\(\s*([^)]*?)\s*\)", regex::escape(name));
    match Regex::new(&pattern) {
        Ok(re) => re
            .captures_iter(document)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn raw_date_token(token: &str) -> RawDate {
    let token = unquote(token);
    let digits = token.strip_prefix('-').unwrap_or(token);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(value) = token.parse::<i64>() {
            return RawDate::Epoch(value);
        }
    }
    RawDate::Text(token.to_string())
}

fn unquote(token: &str) -> &str {
    token.trim().trim_matches(|c| c == '"' || c == '\'').trim()
}
