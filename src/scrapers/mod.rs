pub mod base;
pub mod fii;
pub mod fundamentus;
pub mod http;
pub mod stock;

pub use base::InstrumentScraper;
pub use fii::FiiScraper;
pub use http::{HttpClient, RequestProfile};
pub use stock::StockScraper;

use crate::config::Config;
use crate::errors::Result;
use crate::models::InstrumentKind;

/// 按品种创建对应的抓取器
pub fn scraper_for(kind: InstrumentKind, config: &Config) -> Result<Box<dyn InstrumentScraper>> {
    Ok(match kind {
        InstrumentKind::RealEstateFund => Box::new(FiiScraper::new(config)?),
        InstrumentKind::Stock => Box::new(StockScraper::new(config)?),
    })
}
