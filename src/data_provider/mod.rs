use crate::errors::{DataHubError, Result};
use crate::models::{
    Classification, ClassificationKind, Field, Instrument, InstrumentKind, SeriesKind, SeriesPoint,
};
use crate::store::Store;
use chrono::NaiveDate;
use log::debug;
use std::cmp::Ordering;

/// 排序字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    Code,
    Name,
    Price,
    PriceToBook,
}

/// Ordering of a listing; `-field` means descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: OrderField,
    pub descending: bool,
}

impl Default for OrderBy {
    fn default() -> Self {
        Self {
            field: OrderField::Code,
            descending: false,
        }
    }
}

impl OrderBy {
    /// `code`, `name`, `price` (or `cotacao_atual`), `p_vp`, optionally prefixed by `-`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (descending, name) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let field = match name.to_lowercase().as_str() {
            "code" | "codigo" => OrderField::Code,
            "name" | "nome" => OrderField::Name,
            "price" | "cotacao_atual" => OrderField::Price,
            "p_vp" | "pvp" => OrderField::PriceToBook,
            other => return Err(DataHubError::Validation(format!("cannot order by {:?}", other))),
        };
        Ok(Self { field, descending })
    }
}

/// Filters for [`InstrumentDataProvider::list`]. Empty filters match everything.
#[derive(Debug, Clone, Default)]
pub struct InstrumentQuery {
    /// Case-insensitive substring over code, name, sector, segment and kind.
    pub search: Option<String>,
    /// Exact sector name, case-insensitive.
    pub sector: Option<String>,
    /// Exact segment name, case-insensitive.
    pub segment: Option<String>,
    pub kind: Option<InstrumentKind>,
    pub order: OrderBy,
}

impl InstrumentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: &str) -> Self {
        self.search = Some(search.to_string());
        self
    }

    pub fn with_sector(mut self, sector: &str) -> Self {
        self.sector = Some(sector.to_string());
        self
    }

    pub fn with_segment(mut self, segment: &str) -> Self {
        self.segment = Some(segment.to_string());
        self
    }

    pub fn with_kind(mut self, kind: InstrumentKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_order(mut self, order: OrderBy) -> Self {
        self.order = order;
        self
    }

    fn matches(&self, instrument: &Instrument) -> bool {
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let haystacks = [
                Some(instrument.code.as_str()),
                Some(instrument.name.as_str()),
                instrument.sector.as_ref().map(|c| c.name.as_str()),
                instrument.segment.as_ref().map(|c| c.name.as_str()),
                Some(instrument.kind.as_str()),
            ];
            if !haystacks
                .iter()
                .flatten()
                .any(|h| h.to_lowercase().contains(&needle))
            {
                return false;
            }
        }

        exact(self.sector.as_deref(), instrument.sector.as_ref())
            && exact(self.segment.as_deref(), instrument.segment.as_ref())
    }
}

fn exact(wanted: Option<&str>, actual: Option<&Classification>) -> bool {
    match wanted.map(str::trim).filter(|w| !w.is_empty()) {
        None => true,
        Some(wanted) => actual.map_or(false, |c| c.name.to_lowercase() == wanted.to_lowercase()),
    }
}

/// 数据提供者，提供对已存储数据的只读查询
pub struct InstrumentDataProvider<'a, S: Store + ?Sized> {
    store: &'a S,
}

impl<'a, S: Store + ?Sized> InstrumentDataProvider<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// 按条件列出标的
    pub fn list(&self, query: &InstrumentQuery) -> Result<Vec<Instrument>> {
        let mut instruments: Vec<Instrument> = self
            .store
            .list_instruments(query.kind)?
            .into_iter()
            .filter(|i| query.matches(i))
            .collect();

        let order = query.order;
        instruments.sort_by(|a, b| compare(a, b, order).then_with(|| a.code.cmp(&b.code)));
        debug!("query {:?} -> {} instruments", query, instruments.len());
        Ok(instruments)
    }

    /// 获取指定标的。Without a kind, funds are looked up first.
    pub fn get_instrument(&self, code: &str, kind: Option<InstrumentKind>) -> Result<Option<Instrument>> {
        let code = code.trim().to_uppercase();
        match kind {
            Some(kind) => self.store.get_instrument(&code, kind),
            None => {
                for kind in [InstrumentKind::RealEstateFund, InstrumentKind::Stock] {
                    if let Some(found) = self.store.get_instrument(&code, kind)? {
                        return Ok(Some(found));
                    }
                }
                Ok(None)
            }
        }
    }

    /// Points ordered by date ascending; `since` is inclusive.
    pub fn series(
        &self,
        code: &str,
        kind: InstrumentKind,
        series: SeriesKind,
        since: Option<NaiveDate>,
    ) -> Result<Vec<SeriesPoint>> {
        self.store.series(&code.trim().to_uppercase(), kind, series, since)
    }

    pub fn classifications(&self, kind: ClassificationKind) -> Result<Vec<Classification>> {
        self.store.list_classifications(kind)
    }

    /// 获取所有标的及其收盘价历史，用于导出快照
    pub fn instruments_with_history(&self, kind: Option<InstrumentKind>) -> Result<Vec<(Instrument, Vec<SeriesPoint>)>> {
        let instruments = self.store.list_instruments(kind)?;
        let mut result = Vec::with_capacity(instruments.len());
        for instrument in instruments {
            let history = self
                .store
                .series(&instrument.code, instrument.kind, SeriesKind::ClosingPrice, None)?;
            result.push((instrument, history));
        }
        Ok(result)
    }
}

fn compare(a: &Instrument, b: &Instrument, order: OrderBy) -> Ordering {
    let ordering = match order.field {
        OrderField::Code => a.code.cmp(&b.code),
        OrderField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        OrderField::Price => return compare_optional(a.decimal(Field::Price), b.decimal(Field::Price), order.descending),
        OrderField::PriceToBook => {
            return compare_optional(
                a.decimal(Field::PriceToBook),
                b.decimal(Field::PriceToBook),
                order.descending,
            )
        }
    };
    if order.descending {
        ordering.reverse()
    } else {
        ordering
    }
}

// 空值始终排在最后
fn compare_optional<T: Ord>(a: Option<T>, b: Option<T>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if descending => b.cmp(&a),
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
