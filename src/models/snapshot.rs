use crate::models::{Field, Instrument, SeriesPoint};
use crate::util::date_to_int;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

/// 日线收盘数据
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyClose {
    /// YYYYMMDD
    pub date: i32,
    pub close: f64,
    pub volume: Option<i64>,
}

/// Flattened instrument with nested closing-price history, the row shape
/// of the Arrow snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentSnapshot {
    pub kind: String,
    pub code: String,
    pub name: String,
    pub sector: Option<String>,
    pub segment: Option<String>,
    pub price: Option<f64>,
    pub p_vp: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub daily_liquidity: Option<i64>,
    /// Newest first.
    pub daily: Vec<DailyClose>,
}

impl InstrumentSnapshot {
    pub fn from_instrument(instrument: &Instrument, history: &[SeriesPoint]) -> Self {
        let float = |field: Field| instrument.decimal(field).and_then(|d| d.to_f64());

        let mut daily: Vec<DailyClose> = history
            .iter()
            .filter_map(|p| {
                Some(DailyClose {
                    date: date_to_int(p.date),
                    close: p.value.to_f64()?,
                    volume: p.volume,
                })
            })
            .collect();
        // 确保按日期降序
        daily.sort_by(|a, b| b.date.cmp(&a.date));

        Self {
            kind: instrument.kind.as_str().to_string(),
            code: instrument.code.clone(),
            name: instrument.name.clone(),
            sector: instrument.sector.as_ref().map(|c| c.name.clone()),
            segment: instrument.segment.as_ref().map(|c| c.name.clone()),
            price: float(Field::Price),
            p_vp: float(Field::PriceToBook),
            dividend_yield: float(Field::DividendYield),
            daily_liquidity: instrument.get(Field::DailyLiquidity).and_then(|v| v.as_integer()),
            daily,
        }
    }
}
