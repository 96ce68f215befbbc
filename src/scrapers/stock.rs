use crate::config::Config;
use crate::errors::Result;
use crate::extract::RawPoint;
use crate::mapper::{STOCK_DETAIL_ALIASES, STOCK_LISTING_ALIASES};
use crate::models::{InstrumentKind, InstrumentUpdate};
use crate::scrapers::base::InstrumentScraper;
use crate::scrapers::fundamentus::{self, ListingLayout};
use crate::scrapers::http::HttpClient;
use regex::Regex;
use std::sync::LazyLock;

static STOCK_CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z]{4}[0-9]{1,2}\b").unwrap());

const LISTING: ListingLayout = ListingLayout {
    path: "/resultado.php",
    required: &[&["papel"], &["cotacao"], &["p/l"]],
    aliases: STOCK_LISTING_ALIASES,
    titles_as_name: true,
    positional_liquidity: false,
};

const DETAIL_PATHS: [&str; 2] = ["/detalhes.php?papel={code}", "/detalhes.php?papel={code}&interface=mobile"];

/// 股票抓取器
pub struct StockScraper {
    http: HttpClient,
}

impl StockScraper {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(config)?,
        })
    }
}

impl InstrumentScraper for StockScraper {
    fn kind(&self) -> InstrumentKind {
        InstrumentKind::Stock
    }

    fn fetch_listing(&self) -> Result<Vec<InstrumentUpdate>> {
        fundamentus::fetch_listing(&self.http, self.kind(), &LISTING)
    }

    fn fetch_code_index(&self) -> Result<Vec<String>> {
        fundamentus::fetch_code_index(&self.http, &STOCK_CODE_RE)
    }

    fn fetch_details(&self, code: &str) -> Result<InstrumentUpdate> {
        fundamentus::fetch_details(&self.http, code, self.kind(), &DETAIL_PATHS, STOCK_DETAIL_ALIASES)
    }

    fn fetch_price_history(&self, code: &str) -> Result<Vec<RawPoint>> {
        fundamentus::fetch_price_history(&self.http, code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Field, Value};
    use crate::services::upsert_instrument;
    use crate::store::{MemoryStore, Store};
    use rust_decimal_macros::dec;

    #[test]
    fn test_stock_listing_keeps_stock_codes_only() {
        let html = r#"<table>
            <tr><th>Papel</th><th>Cotação</th><th>P/L</th><th>P/VP</th></tr>
            <tr><td>PETR4</td><td>38,50</td><td>4,20</td><td>1,10</td></tr>
            <tr><td>HGLG11</td><td>160,00</td><td>0,00</td><td>1,00</td></tr>
            <tr><td>VALE3</td><td>61,02</td><td>6,80</td><td>1,50</td></tr>
        </table>"#;
        let rows = fundamentus::parse_listing(html, InstrumentKind::Stock, &LISTING).unwrap();
        let codes: Vec<&str> = rows.iter().map(|r| r.code.as_str()).collect();
        // HGLG11 is four letters plus two digits, a valid stock code shape too
        assert_eq!(codes, vec!["PETR4", "HGLG11", "VALE3"]);
        assert_eq!(rows[0].fields.get(&Field::Price), Some(&Some(Value::Decimal(dec!(38.50)))));
        assert_eq!(rows[2].fields.get(&Field::PriceEarnings), Some(&Some(Value::Decimal(dec!(6.80)))));
    }

    #[test]
    fn test_stock_listing_names_from_titles() {
        let html = r#"<table>
            <tr><th>Papel</th><th>Cotação</th><th>P/L</th></tr>
            <tr><td><span class="tips" title="PETROBRAS PN"><a href="detalhes.php?papel=PETR4">PETR4</a></span></td><td>38,50</td><td>4,20</td></tr>
            <tr><td>VALE3</td><td>61,02</td><td>6,80</td></tr>
        </table>"#;
        let rows = fundamentus::parse_listing(html, InstrumentKind::Stock, &LISTING).unwrap();
        assert_eq!(rows[0].fields.get(&Field::Name), Some(&Some(Value::Text("PETROBRAS PN".into()))));
        // titles exist on the page, so a row without one clears its name
        assert_eq!(rows[1].fields.get(&Field::Name), Some(&None));
    }

    #[test]
    fn test_listing_without_names_keeps_stored_name() {
        let mut store = MemoryStore::new();
        let details = InstrumentUpdate::new("PETR4", InstrumentKind::Stock)
            .with(Field::Name, Value::Text("Petrobras".into()))
            .resupply();
        upsert_instrument(&mut store, &details).unwrap();

        let html = r#"<table>
            <tr><th>Papel</th><th>Cotação</th><th>P/L</th></tr>
            <tr><td>PETR4</td><td>38,50</td><td>4,20</td></tr>
        </table>"#;
        let rows = fundamentus::parse_listing(html, InstrumentKind::Stock, &LISTING).unwrap();
        assert!(!rows[0].fields.contains_key(&Field::Name));
        upsert_instrument(&mut store, &rows[0]).unwrap();

        let stored = store.get_instrument("PETR4", InstrumentKind::Stock).unwrap().unwrap();
        assert_eq!(stored.name, "Petrobras");
        assert_eq!(stored.decimal(Field::Price), Some(dec!(38.50)));
    }

    #[test]
    fn test_stock_code_pattern() {
        let codes = crate::extract::extract_codes("PETR4, VALE3; ITUB4 PETR4 abc1", &STOCK_CODE_RE);
        assert_eq!(codes, vec!["ITUB4", "PETR4", "VALE3"]);
    }
}
