use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SeriesKind {
    /// 收盘价 (value) + 成交量 (volume)
    ClosingPrice,
    /// Distribution paid per share, R$.
    Distribution,
    DividendYield,
}

impl SeriesKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesKind::ClosingPrice => "historico",
            SeriesKind::Distribution => "rendimentos",
            SeriesKind::DividendYield => "dy",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "historico" | "history" | "cotacoes" => Some(SeriesKind::ClosingPrice),
            "rendimentos" | "distribuicoes" | "dividends" => Some(SeriesKind::Distribution),
            "dy" | "dividend_yield" => Some(SeriesKind::DividendYield),
            _ => None,
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation, unique per (instrument, kind, date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: Decimal,
    pub volume: Option<i64>,
}

impl SeriesPoint {
    pub fn new(date: NaiveDate, value: Decimal) -> Self {
        Self { date, value, volume: None }
    }

    pub fn with_volume(mut self, volume: Option<i64>) -> Self {
        self.volume = volume;
        self
    }
}
