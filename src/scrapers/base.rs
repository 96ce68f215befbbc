use crate::errors::Result;
use crate::extract::RawPoint;
use crate::models::{InstrumentKind, InstrumentUpdate, SeriesKind};
use log::warn;
use std::collections::BTreeSet;

/// Base trait for instrument scrapers, one implementation per instrument kind.
pub trait InstrumentScraper {
    /// Instrument kind this scraper is for
    fn kind(&self) -> InstrumentKind;

    /// Consolidated listing page: one update per instrument row.
    fn fetch_listing(&self) -> Result<Vec<InstrumentUpdate>>;

    /// Secondary, autocomplete-style code index. Sorted and deduplicated.
    fn fetch_code_index(&self) -> Result<Vec<String>>;

    /// Per-instrument detail page.
    fn fetch_details(&self, code: &str) -> Result<InstrumentUpdate>;

    /// Closing-price history, untyped.
    fn fetch_price_history(&self, code: &str) -> Result<Vec<RawPoint>>;

    /// Whether [`fetch_charts`](Self::fetch_charts) does any network work.
    fn has_charts(&self) -> bool {
        false
    }

    /// Extra chart series (distributions, dividend yield).
    fn fetch_charts(&self, _code: &str) -> Result<Vec<(SeriesKind, Vec<RawPoint>)>> {
        Ok(Vec::new())
    }

    /// Every known code: the consolidated listing first, the code index when
    /// the listing fails or comes back empty.
    fn list_codes(&self) -> Result<Vec<String>> {
        match self.fetch_listing() {
            Ok(rows) if !rows.is_empty() => return Ok(codes_of(&rows)),
            Ok(_) => warn!("{} listing is empty, using code index", self.kind()),
            Err(e) => warn!("{} listing failed ({}), using code index", self.kind(), e),
        }
        self.fetch_code_index()
    }
}

/// Sorted, deduplicated codes of a listing.
pub fn codes_of(rows: &[InstrumentUpdate]) -> Vec<String> {
    rows.iter()
        .map(|r| r.code.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
