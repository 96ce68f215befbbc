use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// How a raw token for a field is turned into a typed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Decimal,
    Integer,
    /// Integer amount that may carry a magnitude suffix (`1,2M`).
    Liquidity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ClassificationKind {
    Sector,
    Segment,
}

impl ClassificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationKind::Sector => "setor",
            ClassificationKind::Segment => "segmento",
        }
    }

    pub fn from_str_opt(value: &str) -> Option<Self> {
        match value {
            "setor" => Some(ClassificationKind::Sector),
            "segmento" => Some(ClassificationKind::Segment),
            _ => None,
        }
    }
}

/// Where a field lives on the persisted instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Name,
    Classification(ClassificationKind),
    Column,
}

/// Canonical field catalogue shared by every scraper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Field {
    Name,
    Sector,
    Segment,
    Price,
    PriceToBook,
    DividendYield,
    FfoYield,
    MarketValue,
    PropertyCount,
    PricePerM2,
    RentPerM2,
    CapRate,
    Vacancy,
    DailyLiquidity,
    BookValuePerShare,
    NetWorth,
    AdminFee,
    PerformanceFee,
    Administrator,
    Manager,
    Mandate,
    TargetAudience,
    Cnpj,
    PriceEarnings,
    Roe,
    Low52Weeks,
    High52Weeks,
    Volume,
    TotalDebt,
    DebtToEquity,
}

impl Field {
    pub const ALL: [Field; 30] = [
        Field::Name,
        Field::Sector,
        Field::Segment,
        Field::Price,
        Field::PriceToBook,
        Field::DividendYield,
        Field::FfoYield,
        Field::MarketValue,
        Field::PropertyCount,
        Field::PricePerM2,
        Field::RentPerM2,
        Field::CapRate,
        Field::Vacancy,
        Field::DailyLiquidity,
        Field::BookValuePerShare,
        Field::NetWorth,
        Field::AdminFee,
        Field::PerformanceFee,
        Field::Administrator,
        Field::Manager,
        Field::Mandate,
        Field::TargetAudience,
        Field::Cnpj,
        Field::PriceEarnings,
        Field::Roe,
        Field::Low52Weeks,
        Field::High52Weeks,
        Field::Volume,
        Field::TotalDebt,
        Field::DebtToEquity,
    ];

    pub fn kind(&self) -> FieldKind {
        match self {
            Field::Name
            | Field::Sector
            | Field::Segment
            | Field::Administrator
            | Field::Manager
            | Field::Mandate
            | Field::TargetAudience
            | Field::Cnpj => FieldKind::Text,
            Field::PropertyCount => FieldKind::Integer,
            Field::DailyLiquidity | Field::Volume => FieldKind::Liquidity,
            _ => FieldKind::Decimal,
        }
    }

    pub fn storage(&self) -> Storage {
        match self {
            Field::Name => Storage::Name,
            Field::Sector => Storage::Classification(ClassificationKind::Sector),
            Field::Segment => Storage::Classification(ClassificationKind::Segment),
            _ => Storage::Column,
        }
    }

    /// Column name in the relational store and key in exports.
    pub fn column_name(&self) -> &'static str {
        match self {
            Field::Name => "nome",
            Field::Sector => "setor",
            Field::Segment => "segmento",
            Field::Price => "cotacao_atual",
            Field::PriceToBook => "p_vp",
            Field::DividendYield => "dividend_yield_percent",
            Field::FfoYield => "ffo_yield_percent",
            Field::MarketValue => "valor_mercado",
            Field::PropertyCount => "quantidade_imoveis",
            Field::PricePerM2 => "preco_m2",
            Field::RentPerM2 => "aluguel_m2",
            Field::CapRate => "cap_rate_percent",
            Field::Vacancy => "vacancia_media_percent",
            Field::DailyLiquidity => "liquidez_media_diaria",
            Field::BookValuePerShare => "valor_patrimonial_cota",
            Field::NetWorth => "patrimonio_liquido",
            Field::AdminFee => "taxa_adm",
            Field::PerformanceFee => "taxa_perf",
            Field::Administrator => "administrador",
            Field::Manager => "gestor",
            Field::Mandate => "mandato",
            Field::TargetAudience => "publico_alvo",
            Field::Cnpj => "cnpj",
            Field::PriceEarnings => "p_l",
            Field::Roe => "roe_percent",
            Field::Low52Weeks => "min_52_semanas",
            Field::High52Weeks => "max_52_semanas",
            Field::Volume => "volume",
            Field::TotalDebt => "divida_total",
            Field::DebtToEquity => "divida_patrimonio",
        }
    }

    pub fn from_column_name(name: &str) -> Option<Field> {
        Field::ALL.iter().copied().find(|f| f.column_name() == name)
    }

    /// Fields every listing/detail fetch supplies again; absence clears them.
    pub fn is_resupplied(&self) -> bool {
        matches!(self, Field::Name | Field::Price)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Value {
    Text(String),
    Decimal(Decimal),
    Integer(i64),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(d) => Some(*d),
            Value::Integer(i) => Some(Decimal::from(*i)),
            Value::Text(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Integer(i) => write!(f, "{}", i),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_names_are_unique_and_reversible() {
        for field in Field::ALL {
            assert_eq!(Field::from_column_name(field.column_name()), Some(field));
        }
        assert_eq!(Field::from_column_name("nao_existe"), None);
    }

    #[test]
    fn test_storage_roles() {
        assert_eq!(Field::Name.storage(), Storage::Name);
        assert_eq!(
            Field::Segment.storage(),
            Storage::Classification(ClassificationKind::Segment)
        );
        assert_eq!(Field::PriceToBook.storage(), Storage::Column);
        assert_eq!(Field::DailyLiquidity.kind(), FieldKind::Liquidity);
        assert!(Field::Price.is_resupplied());
        assert!(!Field::PriceToBook.is_resupplied());
    }
}
