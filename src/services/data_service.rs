use crate::config::Config;
use crate::errors::{DataHubError, Result};
use crate::extract::{to_series_points, RawPoint};
use crate::models::{InstrumentKind, InstrumentUpdate, SeriesKind};
use crate::scrapers::base::{codes_of, InstrumentScraper};
use crate::services::reconciler::{self, SeriesOutcome, UpsertOutcome};
use crate::store::Store;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::thread;

/// 批处理目标：单个代码或全部
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    All,
    Code(String),
}

impl Target {
    /// `ALL`/`TUDO` (any case) mean every known code. Anything else must be a
    /// valid code of `kind`; the check happens before any network call.
    pub fn parse(raw: &str, kind: InstrumentKind) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("all") || trimmed.eq_ignore_ascii_case("tudo") {
            return Ok(Target::All);
        }
        Ok(Target::Code(kind.normalize_code(trimmed)?))
    }
}

/// Where a base update came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseSource {
    Listing,
    Details,
}

impl BaseSource {
    fn as_str(&self) -> &'static str {
        match self {
            BaseSource::Listing => "listing",
            BaseSource::Details => "details",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogOutcome {
    pub history: SeriesOutcome,
    pub distributions: SeriesOutcome,
    pub dividend_yield: SeriesOutcome,
}

/// Aggregate result of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    /// (code, error message) per failed entity, in processing order.
    pub failures: Vec<(String, String)>,
}

impl RunSummary {
    fn record<T>(&mut self, code: &str, result: Result<T>) {
        self.attempted += 1;
        match result {
            Ok(_) => self.succeeded += 1,
            Err(e) => {
                warn!("Failed {}: {}", code, e);
                self.failures.push((code.to_string(), e.to_string()));
            }
        }
    }
}

/// 数据服务，处理数据的获取、解析和存储
///
/// One service drives one instrument kind against one store. Entities are
/// processed one at a time; a failing entity is logged and counted, the
/// rest of the batch goes on.
pub struct DataService<S: Store> {
    config: Config,
    scraper: Box<dyn InstrumentScraper>,
    store: S,
}

impl<S: Store> DataService<S> {
    /// 创建新的数据服务实例
    pub fn new(config: Config, scraper: Box<dyn InstrumentScraper>, store: S) -> Self {
        Self { config, scraper, store }
    }

    pub fn kind(&self) -> InstrumentKind {
        self.scraper.kind()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// 刷新基础数据（名称、分类、指标）
    ///
    /// The consolidated listing is fetched once and reused for every code;
    /// codes missing from it go through the detail page instead. For a
    /// single code a failed listing only means going to the detail page.
    pub fn run_base(&mut self, target: &Target) -> Result<RunSummary> {
        let (codes, listing) = match target {
            Target::Code(code) => (vec![code.clone()], self.single_listing_row(code)),
            Target::All => {
                let (codes, rows) = self.resolve_all()?;
                let listing = rows.into_iter().map(|r| (r.code.clone(), r)).collect();
                (codes, listing)
            }
        };

        let codes = self.limit(codes);
        let mut summary = RunSummary::default();
        for code in &codes {
            let result = self.update_base(code, listing.get(code));
            summary.record(code, result);
        }

        info!("Processed {} of {}", summary.succeeded, summary.attempted);
        Ok(summary)
    }

    /// Apply one instrument's base data, from `row` when present, else
    /// from its detail page.
    pub fn update_base(&mut self, code: &str, row: Option<&InstrumentUpdate>) -> Result<(UpsertOutcome, BaseSource)> {
        let (update, source) = match row {
            Some(row) => (row.clone(), BaseSource::Listing),
            None => {
                let update = self.scraper.fetch_details(code);
                self.pause();
                (update?, BaseSource::Details)
            }
        };

        let outcome = reconciler::upsert_instrument(&mut self.store, &update)?;
        info!(
            "{}: base updated via {} (fields: {})",
            code,
            source.as_str(),
            update.field_names().join(", ")
        );
        Ok((outcome, source))
    }

    /// 下载历史序列（收盘价，以及基金的分红和股息率）
    pub fn run_log(&mut self, target: &Target) -> Result<RunSummary> {
        let codes = match target {
            Target::Code(code) => vec![code.clone()],
            Target::All => {
                let codes = self.scraper.list_codes()?;
                if codes.is_empty() {
                    return Err(DataHubError::NoInstruments(format!("no {} codes found", self.kind())));
                }
                codes
            }
        };

        let codes = self.limit(codes);
        let mut summary = RunSummary::default();
        for code in &codes {
            let result = self.update_log(code);
            summary.record(code, result);
            self.pause();
        }

        info!("Processed {} of {}", summary.succeeded, summary.attempted);
        Ok(summary)
    }

    /// Fetch and upsert every series of one instrument.
    pub fn update_log(&mut self, code: &str) -> Result<LogOutcome> {
        let kind = self.kind();
        let (_, created) = self.store.get_or_create_instrument(code, kind)?;
        if created {
            debug!("{}: created before history download", code);
        }

        let mut outcome = LogOutcome::default();

        let raw = self.scraper.fetch_price_history(code)?;
        outcome.history = self.store_series(code, SeriesKind::ClosingPrice, &raw)?;

        if self.scraper.has_charts() {
            self.pause();
            for (series, raw) in self.scraper.fetch_charts(code)? {
                let stored = self.store_series(code, series, &raw)?;
                match series {
                    SeriesKind::Distribution => outcome.distributions = stored,
                    SeriesKind::DividendYield => outcome.dividend_yield = stored,
                    SeriesKind::ClosingPrice => outcome.history = stored,
                }
            }
        }

        info!(
            "{}: history+{}; distributions+{}; dy+{}",
            code, outcome.history.inserted, outcome.distributions.inserted, outcome.dividend_yield.inserted
        );
        Ok(outcome)
    }

    fn store_series(&mut self, code: &str, series: SeriesKind, raw: &[RawPoint]) -> Result<SeriesOutcome> {
        let kind = self.kind();
        let (points, dropped) = to_series_points(raw, &self.config.date_formats);
        if dropped > 0 {
            debug!("{}: dropped {} {} points", code, dropped, series);
        }
        let mut outcome = reconciler::upsert_series(&mut self.store, code, kind, series, &points)?;
        outcome.dropped = dropped;
        Ok(outcome)
    }

    fn single_listing_row(&self, code: &str) -> BTreeMap<String, InstrumentUpdate> {
        match self.scraper.fetch_listing() {
            Ok(rows) => rows.into_iter().filter(|r| r.code == code).map(|r| (r.code.clone(), r)).collect(),
            Err(e) => {
                warn!("{} listing failed ({}), {} goes to its detail page", self.kind(), e, code);
                BTreeMap::new()
            }
        }
    }

    /// Listing first (its rows are kept for reuse), code index otherwise.
    fn resolve_all(&self) -> Result<(Vec<String>, Vec<InstrumentUpdate>)> {
        let (codes, rows) = match self.scraper.fetch_listing() {
            Ok(rows) if !rows.is_empty() => (codes_of(&rows), rows),
            other => {
                match other {
                    Err(e) => warn!("{} listing failed ({}), using code index", self.kind(), e),
                    Ok(_) => warn!("{} listing is empty, using code index", self.kind()),
                }
                (self.scraper.fetch_code_index()?, Vec::new())
            }
        };

        if codes.is_empty() {
            return Err(DataHubError::NoInstruments(format!("no {} codes found", self.kind())));
        }
        info!("Found {} {} codes", codes.len(), self.kind());
        Ok((codes, rows))
    }

    // 调试模式：只处理前N个
    fn limit(&self, mut codes: Vec<String>) -> Vec<String> {
        if self.config.debug_mode && codes.len() > self.config.debug_limit {
            let original = codes.len();
            codes.truncate(self.config.debug_limit);
            info!("DEBUG MODE: Processing only {} out of {} codes", codes.len(), original);
        }
        codes
    }

    fn pause(&self) {
        if !self.config.request_delay.is_zero() {
            thread::sleep(self.config.request_delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Field, Value};
    use crate::parser::RawDate;
    use crate::store::MemoryStore;
    use rust_decimal_macros::dec;
    use std::time::{Duration, Instant};

    struct FakeScraper {
        listing: Result<Vec<InstrumentUpdate>>,
        index: Vec<String>,
    }

    impl FakeScraper {
        fn new(listing: Result<Vec<InstrumentUpdate>>) -> Self {
            Self {
                listing,
                index: Vec::new(),
            }
        }
    }

    fn clone_result(r: &Result<Vec<InstrumentUpdate>>) -> Result<Vec<InstrumentUpdate>> {
        match r {
            Ok(rows) => Ok(rows.clone()),
            Err(e) => Err(DataHubError::Extraction(e.to_string())),
        }
    }

    impl InstrumentScraper for FakeScraper {
        fn kind(&self) -> InstrumentKind {
            InstrumentKind::RealEstateFund
        }

        fn fetch_listing(&self) -> Result<Vec<InstrumentUpdate>> {
            clone_result(&self.listing)
        }

        fn fetch_code_index(&self) -> Result<Vec<String>> {
            Ok(self.index.clone())
        }

        fn fetch_details(&self, code: &str) -> Result<InstrumentUpdate> {
            if code == "FAIL11" {
                return Err(DataHubError::Extraction("no candidate page available".into()));
            }
            Ok(InstrumentUpdate::new(code, self.kind())
                .with(Field::Vacancy, Value::Decimal(dec!(2.5)))
                .resupply())
        }

        fn fetch_price_history(&self, code: &str) -> Result<Vec<RawPoint>> {
            if code == "FAIL11" {
                return Err(DataHubError::HttpStatus {
                    url: "cot_hist".into(),
                    status: 500,
                });
            }
            Ok(vec![
                RawPoint::new(RawDate::Text("2024-01-05".into()), "98,40"),
                RawPoint::new(RawDate::Text("not a date".into()), "1,00"),
            ])
        }

        fn has_charts(&self) -> bool {
            true
        }

        fn fetch_charts(&self, _code: &str) -> Result<Vec<(SeriesKind, Vec<RawPoint>)>> {
            Ok(vec![(
                SeriesKind::Distribution,
                vec![RawPoint::new(RawDate::Epoch(1704067200000), "0.85")],
            )])
        }
    }

    fn listing_row(code: &str) -> InstrumentUpdate {
        InstrumentUpdate::new(code, InstrumentKind::RealEstateFund)
            .with(Field::PriceToBook, Value::Decimal(dec!(1.05)))
            .resupply()
    }

    fn service(scraper: FakeScraper) -> DataService<MemoryStore> {
        DataService::new(Config::new(), Box::new(scraper), MemoryStore::new())
    }

    #[test]
    fn test_target_parse() {
        let kind = InstrumentKind::RealEstateFund;
        assert_eq!(Target::parse("tudo", kind).unwrap(), Target::All);
        assert_eq!(Target::parse("ALL", kind).unwrap(), Target::All);
        assert_eq!(Target::parse(" hglg11 ", kind).unwrap(), Target::Code("HGLG11".into()));
        assert!(matches!(Target::parse("PETR4", kind), Err(DataHubError::Validation(_))));
    }

    #[test]
    fn test_base_run_uses_listing_and_detail_fallback() {
        let mut svc = service(FakeScraper::new(Ok(vec![listing_row("AAAA11"), listing_row("BBBB11")])));
        let summary = svc.run_base(&Target::All).unwrap();
        assert_eq!((summary.succeeded, summary.attempted), (2, 2));

        let (_, source) = svc.update_base("CCCC11", None).unwrap();
        assert_eq!(source, BaseSource::Details);
        let stored = svc.store().get_instrument("AAAA11", InstrumentKind::RealEstateFund).unwrap().unwrap();
        assert_eq!(stored.decimal(Field::PriceToBook), Some(dec!(1.05)));
    }

    #[test]
    fn test_single_code_prefers_listing_row() {
        let fund = InstrumentKind::RealEstateFund;
        let mut svc = service(FakeScraper::new(Ok(vec![listing_row("AAAA11")])));

        svc.run_base(&Target::Code("AAAA11".into())).unwrap();
        let listed = svc.store().get_instrument("AAAA11", fund).unwrap().unwrap();
        assert_eq!(listed.decimal(Field::PriceToBook), Some(dec!(1.05)));
        assert_eq!(listed.decimal(Field::Vacancy), None);

        svc.run_base(&Target::Code("CCCC11".into())).unwrap();
        let detailed = svc.store().get_instrument("CCCC11", fund).unwrap().unwrap();
        assert_eq!(detailed.decimal(Field::Vacancy), Some(dec!(2.5)));
        assert_eq!(detailed.decimal(Field::PriceToBook), None);
    }

    #[test]
    fn test_single_code_survives_listing_failure() {
        let mut svc = service(FakeScraper::new(Err(DataHubError::Extraction("no table".into()))));
        let summary = svc.run_base(&Target::Code("AAAA11".into())).unwrap();
        assert_eq!((summary.succeeded, summary.attempted), (1, 1));
        let stored = svc.store().get_instrument("AAAA11", InstrumentKind::RealEstateFund).unwrap().unwrap();
        assert_eq!(stored.decimal(Field::Vacancy), Some(dec!(2.5)));
    }

    #[test]
    fn test_detail_fetch_is_paced() {
        let config = Config::new().with_request_delay(Duration::from_millis(60));
        let mut svc = DataService::new(config, Box::new(FakeScraper::new(Ok(Vec::new()))), MemoryStore::new());

        let started = Instant::now();
        let (_, source) = svc.update_base("CCCC11", None).unwrap();
        assert_eq!(source, BaseSource::Details);
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_base_run_continues_after_failure() {
        let mut scraper = FakeScraper::new(Err(DataHubError::Extraction("no table".into())));
        scraper.index = vec!["AAAA11".into(), "FAIL11".into(), "ZZZZ11".into()];
        let mut svc = service(scraper);

        let summary = svc.run_base(&Target::All).unwrap();
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].0, "FAIL11");
        assert_eq!(svc.store().instrument_count(), 2);
    }

    #[test]
    fn test_empty_all_is_an_error() {
        let mut svc = service(FakeScraper::new(Ok(Vec::new())));
        assert!(matches!(svc.run_base(&Target::All), Err(DataHubError::NoInstruments(_))));
        assert!(matches!(svc.run_log(&Target::All), Err(DataHubError::NoInstruments(_))));
    }

    #[test]
    fn test_log_run_drops_bad_points_only() {
        let mut svc = service(FakeScraper::new(Ok(vec![listing_row("AAAA11")])));
        let outcome = svc.update_log("AAAA11").unwrap();
        assert_eq!(outcome.history.inserted, 1);
        assert_eq!(outcome.history.dropped, 1);
        assert_eq!(outcome.distributions.inserted, 1);

        let again = svc.update_log("AAAA11").unwrap();
        assert_eq!((again.history.inserted, again.history.updated), (0, 1));

        let summary = svc.run_log(&Target::Code("FAIL11".into())).unwrap();
        assert_eq!((summary.succeeded, summary.attempted), (0, 1));
    }

    #[test]
    fn test_debug_limit_truncates() {
        let rows = (0..5).map(|i| listing_row(&format!("AAA{}11", (b'A' + i) as char))).collect();
        let config = Config::new().with_debug_mode(true).with_debug_limit(2);
        let mut svc = DataService::new(config, Box::new(FakeScraper::new(Ok(rows))), MemoryStore::new());
        let summary = svc.run_base(&Target::All).unwrap();
        assert_eq!(summary.attempted, 2);
    }
}
