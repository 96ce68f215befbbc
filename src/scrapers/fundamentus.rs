//! Pages and payloads shared by the stock and fund scrapers.

use crate::errors::{DataHubError, Result};
use crate::extract::{extract_codes, extract_price_history, key_value_pairs, locate_table, RawPoint, RawRow};
use crate::mapper::{self, Alias};
use crate::models::{Field, InstrumentKind, InstrumentUpdate, Value};
use crate::parser::normalize_text;
use crate::scrapers::http::{HttpClient, RequestProfile};
use log::debug;
use regex::Regex;

pub const CODE_INDEX_PATH: &str = "/script/cmplte.php";

/// How to read one consolidated listing page.
pub struct ListingLayout {
    pub path: &'static str,
    /// Keyword groups the header row must satisfy (see [`locate_table`]).
    pub required: &'static [&'static [&'static str]],
    pub aliases: &'static [Alias],
    /// Recover the name from `title` attributes when there is no name column.
    /// A page with neither leaves stored names alone.
    pub titles_as_name: bool,
    /// Fall back to the 8th/7th cell, then to a cell labelled "liquidez",
    /// when no liquidity column was resolved or it is empty.
    pub positional_liquidity: bool,
}

/// Parse a listing page into one update per valid code row.
///
/// Rows whose code cell does not match the kind's code format (totals,
/// separators) are skipped.
pub fn parse_listing(html: &str, kind: InstrumentKind, layout: &ListingLayout) -> Result<Vec<InstrumentUpdate>> {
    let table = locate_table(html, layout.required)
        .ok_or_else(|| DataHubError::Extraction(format!("no table found in {}", layout.path)))?;

    let code_col = mapper::find_column(&table.headers, &[&["papel"]])
        .or_else(|| table.headers.iter().position(|h| h == "codigo"))
        .unwrap_or(0);
    let columns = mapper::resolve_columns(&table.headers, layout.aliases);
    debug!("{}: headers {:?} -> {:?}", layout.path, table.headers, columns);

    // 页面本身不给名称时，不能把名称当作已清空
    let supplies_names = columns.contains_key(&Field::Name)
        || (layout.titles_as_name && table.rows.iter().any(|r| name_from_titles(r).is_some()));

    let mut updates = Vec::new();
    for row in &table.rows {
        let code = row.text(code_col).unwrap_or("").trim().to_uppercase();
        if !kind.is_valid_code(&code) {
            continue;
        }

        let mut update = InstrumentUpdate::new(&code, kind);
        for (field, index) in &columns {
            if let Some(value) = row.text(*index).and_then(|raw| mapper::map_value(*field, raw)) {
                update.set(*field, value);
            }
        }

        if layout.titles_as_name && !update.fields.contains_key(&Field::Name) {
            if let Some(name) = name_from_titles(row) {
                update.set(Field::Name, Value::Text(name));
            }
        }

        if layout.positional_liquidity && !update.fields.contains_key(&Field::DailyLiquidity) {
            let resolved_empty = columns
                .get(&Field::DailyLiquidity)
                .and_then(|i| row.text(*i))
                .map_or(true, |t| t.trim().is_empty());
            if resolved_empty {
                if let Some(value) = liquidity_fallback(row).and_then(|raw| mapper::map_value(Field::DailyLiquidity, &raw)) {
                    update.set(Field::DailyLiquidity, value);
                }
            }
        }

        let mut update = update.resupply();
        if !supplies_names && update.fields.get(&Field::Name) == Some(&None) {
            update.fields.remove(&Field::Name);
        }
        updates.push(update);
    }

    Ok(updates)
}

/// Read a detail page through `aliases`. A page with no recognizable
/// label is an extraction failure.
pub fn parse_details(html: &str, code: &str, kind: InstrumentKind, aliases: &[Alias]) -> Result<InstrumentUpdate> {
    let pairs = key_value_pairs(html);
    let mut update = InstrumentUpdate::new(code, kind);
    let mapped = mapper::map_pairs(&pairs, aliases, &mut update);
    if mapped == 0 {
        return Err(DataHubError::Extraction(format!(
            "no recognizable fields on detail page of {} ({} pairs)",
            code,
            pairs.len()
        )));
    }
    Ok(update.resupply())
}

/// Fetch the first detail page that answers, then parse it.
pub fn fetch_details(
    http: &HttpClient,
    code: &str,
    kind: InstrumentKind,
    templates: &[&str],
    aliases: &[Alias],
) -> Result<InstrumentUpdate> {
    let paths: Vec<String> = templates.iter().map(|t| t.replace("{code}", code)).collect();
    let referer = format!("{}/", http.base_url());
    let (path, html) = http.first_available(&paths, RequestProfile::Html, Some(&referer))?;
    debug!("{}: detail page {}", code, path);
    parse_details(&html, code, kind, aliases)
}

pub fn fetch_listing(http: &HttpClient, kind: InstrumentKind, layout: &ListingLayout) -> Result<Vec<InstrumentUpdate>> {
    let referer = format!("{}/", http.base_url());
    let html = http.get_text(layout.path, RequestProfile::Html, Some(&referer))?;
    parse_listing(&html, kind, layout)
}

/// Codes from the autocomplete script; an empty result is an error.
pub fn fetch_code_index(http: &HttpClient, pattern: &Regex) -> Result<Vec<String>> {
    let referer = format!("{}/", http.base_url());
    let text = http.get_text(CODE_INDEX_PATH, RequestProfile::Html, Some(&referer))?;
    let codes = extract_codes(&text, pattern);
    if codes.is_empty() {
        return Err(DataHubError::NoInstruments(format!("{} returned no codes", CODE_INDEX_PATH)));
    }
    Ok(codes)
}

/// `amline/cot_hist.php`, requested the way the quotes page does it.
pub fn fetch_price_history(http: &HttpClient, code: &str) -> Result<Vec<RawPoint>> {
    let referer = format!("{}/cotacoes.php?papel={}&tela=3", http.base_url(), code);
    let body = http.get_text(
        &format!("/amline/cot_hist.php?papel={}", code),
        RequestProfile::Xhr,
        Some(&referer),
    )?;
    extract_price_history(&body)
}

fn name_from_titles(row: &RawRow) -> Option<String> {
    row.cell(0)
        .and_then(|c| c.title.clone())
        .or_else(|| row.titles.first().cloned())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn liquidity_fallback(row: &RawRow) -> Option<String> {
    let positional = [7, 6]
        .iter()
        .filter_map(|i| row.text(*i))
        .map(str::trim)
        .find(|t| !t.is_empty());
    if let Some(text) = positional {
        return Some(text.to_string());
    }

    row.cells
        .iter()
        .find(|c| c.label.as_deref().map_or(false, |l| normalize_text(l).contains("liquidez")))
        .map(|c| c.text.trim().to_string())
        .filter(|t| !t.is_empty())
}
