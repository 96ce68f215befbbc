use crate::errors::{DataHubError, Result};
use crate::models::field::{ClassificationKind, Field, Value};
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

static FUND_CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{4}11$").unwrap());
static STOCK_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{4}[0-9]{1,2}$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum InstrumentKind {
    Stock,
    RealEstateFund,
}

impl InstrumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentKind::Stock => "acao",
            InstrumentKind::RealEstateFund => "fii",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "acao" | "acoes" | "stock" => Ok(InstrumentKind::Stock),
            "fii" | "fiis" | "fund" => Ok(InstrumentKind::RealEstateFund),
            other => Err(DataHubError::Validation(format!("unknown instrument kind: {other}"))),
        }
    }

    pub fn is_valid_code(&self, code: &str) -> bool {
        match self {
            InstrumentKind::Stock => STOCK_CODE_RE.is_match(code),
            InstrumentKind::RealEstateFund => FUND_CODE_RE.is_match(code),
        }
    }

    /// Trim + uppercase, then check the kind's code format.
    pub fn normalize_code(&self, raw: &str) -> Result<String> {
        let code = raw.trim().to_uppercase();
        if self.is_valid_code(&code) {
            Ok(code)
        } else {
            Err(DataHubError::Validation(format!(
                "invalid {} code: {:?}",
                self.as_str(),
                raw
            )))
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sector or segment lookup entity, unique per (kind, name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub id: i64,
    pub kind: ClassificationKind,
    pub name: String,
}

/// Persisted instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instrument {
    pub code: String,
    pub kind: InstrumentKind,
    pub name: String,
    pub sector: Option<Classification>,
    pub segment: Option<Classification>,
    /// Indicator columns that currently hold a value.
    pub values: BTreeMap<Field, Value>,
    pub updated_at: Option<DateTime<FixedOffset>>,
}

impl Instrument {
    pub fn new(code: &str, kind: InstrumentKind) -> Self {
        Self {
            code: code.to_string(),
            kind,
            name: String::new(),
            sector: None,
            segment: None,
            values: BTreeMap::new(),
            updated_at: None,
        }
    }

    pub fn get(&self, field: Field) -> Option<&Value> {
        self.values.get(&field)
    }

    pub fn decimal(&self, field: Field) -> Option<rust_decimal::Decimal> {
        self.values.get(&field).and_then(Value::as_decimal)
    }

    pub fn classification(&self, kind: ClassificationKind) -> Option<&Classification> {
        match kind {
            ClassificationKind::Sector => self.sector.as_ref(),
            ClassificationKind::Segment => self.segment.as_ref(),
        }
    }
}

/// Partial update for one instrument.
///
/// - key absent: field untouched
/// - `Some(value)`: field set
/// - `None`: field cleared
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentUpdate {
    pub code: String,
    pub kind: InstrumentKind,
    pub fields: BTreeMap<Field, Option<Value>>,
}

impl InstrumentUpdate {
    pub fn new(code: &str, kind: InstrumentKind) -> Self {
        Self {
            code: code.to_string(),
            kind,
            fields: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, field: Field, value: Value) {
        self.fields.insert(field, Some(value));
    }

    pub fn clear(&mut self, field: Field) {
        self.fields.insert(field, None);
    }

    pub fn with(mut self, field: Field, value: Value) -> Self {
        self.set(field, value);
        self
    }

    /// Mark every always-resupplied field that this update does not carry
    /// as explicitly cleared.
    pub fn resupply(mut self) -> Self {
        for field in Field::ALL.iter().filter(|f| f.is_resupplied()) {
            self.fields.entry(*field).or_insert(None);
        }
        self
    }

    /// Merge another update into this one; keys in `other` win.
    pub fn merge(&mut self, other: InstrumentUpdate) {
        self.fields.extend(other.fields);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.keys().map(|f| f.column_name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_formats() {
        let fii = InstrumentKind::RealEstateFund;
        assert_eq!(fii.normalize_code(" hglg11 ").unwrap(), "HGLG11");
        assert!(fii.normalize_code("HGLG3").is_err());
        assert!(fii.normalize_code("HGL11").is_err());

        let stock = InstrumentKind::Stock;
        assert_eq!(stock.normalize_code("petr4").unwrap(), "PETR4");
        assert!(stock.is_valid_code("TAEE11"));
        assert!(!stock.is_valid_code("PETR"));
    }

    #[test]
    fn test_resupply_only_fills_missing() {
        let update = InstrumentUpdate::new("ABCD11", InstrumentKind::RealEstateFund)
            .with(Field::Name, Value::Text("Fundo".into()))
            .resupply();
        assert_eq!(update.fields.get(&Field::Name), Some(&Some(Value::Text("Fundo".into()))));
        assert_eq!(update.fields.get(&Field::Price), Some(&None));
        assert!(!update.fields.contains_key(&Field::PriceToBook));
    }
}
