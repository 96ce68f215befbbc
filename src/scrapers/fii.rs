use crate::config::Config;
use crate::errors::Result;
use crate::extract::{extract_date_utc_pairs, extract_push_series, extract_var_pairs, RawPoint};
use crate::mapper::{FUND_DETAIL_ALIASES, FUND_LISTING_ALIASES};
use crate::models::{InstrumentKind, InstrumentUpdate, SeriesKind};
use crate::scrapers::base::InstrumentScraper;
use crate::scrapers::fundamentus::{self, ListingLayout};
use crate::scrapers::http::{HttpClient, RequestProfile};
use log::debug;
use regex::Regex;
use std::sync::LazyLock;

static FUND_CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z]{4}11\b").unwrap());

const LISTING: ListingLayout = ListingLayout {
    path: "/fii_resultado.php",
    required: &[&["papel"], &["p/vp", "p vp"], &["segmento", "setor"]],
    aliases: FUND_LISTING_ALIASES,
    titles_as_name: true,
    positional_liquidity: true,
};

const DETAIL_PATHS: [&str; 4] = [
    "/fii_detalhes.php?papel={code}",
    "/fii_detalhes.php?papel={code}&interface=mobile",
    "/detalhes.php?papel={code}",
    "/detalhes.php?papel={code}&interface=mobile",
];

/// 房地产投资基金（FII）抓取器
pub struct FiiScraper {
    http: HttpClient,
}

impl FiiScraper {
    /// 创建新的FII抓取器
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(config)?,
        })
    }
}

impl InstrumentScraper for FiiScraper {
    fn kind(&self) -> InstrumentKind {
        InstrumentKind::RealEstateFund
    }

    fn fetch_listing(&self) -> Result<Vec<InstrumentUpdate>> {
        fundamentus::fetch_listing(&self.http, self.kind(), &LISTING)
    }

    fn fetch_code_index(&self) -> Result<Vec<String>> {
        fundamentus::fetch_code_index(&self.http, &FUND_CODE_RE)
    }

    fn fetch_details(&self, code: &str) -> Result<InstrumentUpdate> {
        fundamentus::fetch_details(&self.http, code, self.kind(), &DETAIL_PATHS, FUND_DETAIL_ALIASES)
    }

    fn fetch_price_history(&self, code: &str) -> Result<Vec<RawPoint>> {
        fundamentus::fetch_price_history(&self.http, code)
    }

    fn has_charts(&self) -> bool {
        true
    }

    fn fetch_charts(&self, code: &str) -> Result<Vec<(SeriesKind, Vec<RawPoint>)>> {
        let referer = format!("{}/", self.http.base_url());
        let document = self.http.get_text(
            &format!("/fii_graficos.php?papel={}&tipo=1", code),
            RequestProfile::Html,
            Some(&referer),
        )?;
        Ok(parse_charts(&document))
    }
}

/// 从图表页面的脚本中提取分红和股息率序列
pub fn parse_charts(document: &str) -> Vec<(SeriesKind, Vec<RawPoint>)> {
    let mut distributions = extract_push_series(document, "labelsRendimento", "dataSerieRendimento");
    if distributions.is_empty() {
        distributions = extract_date_utc_pairs(document);
        debug!("push series empty, {} Date.UTC pairs", distributions.len());
    }
    let dividend_yield = extract_var_pairs(document, "dataSerieDividendYield");

    vec![
        (SeriesKind::Distribution, distributions),
        (SeriesKind::DividendYield, dividend_yield),
    ]
}
