//! Label/header text to canonical field, raw token to typed value.
//!
//! Every mapping decision goes through an ordered [`Alias`] table. Labels
//! and headers are compared after [`normalize_text`], by substring
//! containment.

use crate::models::{Field, FieldKind, InstrumentUpdate, Value};
use crate::parser::{normalize_text, parse_integer, parse_liquidity, parse_number};
use std::collections::BTreeMap;

/// One alias entry: the label matches when it contains every keyword.
#[derive(Debug, Clone, Copy)]
pub struct Alias {
    pub field: Field,
    pub keywords: &'static [&'static str],
    /// Only consulted for column resolution when no primary alias of the
    /// same field matched any header.
    pub fallback: bool,
}

impl Alias {
    pub const fn new(field: Field, keywords: &'static [&'static str]) -> Self {
        Self { field, keywords, fallback: false }
    }

    pub const fn fallback(field: Field, keywords: &'static [&'static str]) -> Self {
        Self { field, keywords, fallback: true }
    }

    /// `normalized` must already be passed through [`normalize_text`].
    pub fn matches(&self, normalized: &str) -> bool {
        !self.keywords.is_empty() && self.keywords.iter().all(|k| normalized.contains(k))
    }
}

// fii_resultado.php
pub const FUND_LISTING_ALIASES: &[Alias] = &[
    Alias::new(Field::Name, &["nome"]),
    Alias::new(Field::Name, &["fundo"]),
    Alias::new(Field::Segment, &["segmento"]),
    Alias::new(Field::PriceToBook, &["p/vp"]),
    Alias::new(Field::PriceToBook, &["p vp"]),
    Alias::new(Field::Price, &["cotacao"]),
    Alias::new(Field::FfoYield, &["ffo"]),
    Alias::new(Field::DividendYield, &["dividend"]),
    Alias::new(Field::DividendYield, &["dy"]),
    Alias::new(Field::MarketValue, &["valor de mercado"]),
    Alias::new(Field::MarketValue, &["v. mercado"]),
    Alias::new(Field::PropertyCount, &["qtd", "imoveis"]),
    Alias::fallback(Field::PropertyCount, &["imoveis"]),
    Alias::new(Field::PricePerM2, &["preco/m2"]),
    Alias::new(Field::PricePerM2, &["preco m2"]),
    Alias::new(Field::PricePerM2, &["preco por m2"]),
    Alias::new(Field::PricePerM2, &["preco por m"]),
    Alias::fallback(Field::PricePerM2, &["preco", "m2"]),
    Alias::new(Field::RentPerM2, &["aluguel/m2"]),
    Alias::new(Field::RentPerM2, &["aluguel m2"]),
    Alias::new(Field::RentPerM2, &["aluguel por m2"]),
    Alias::new(Field::RentPerM2, &["aluguel", "m2"]),
    Alias::new(Field::CapRate, &["cap", "rate"]),
    Alias::new(Field::Vacancy, &["vacancia"]),
    Alias::new(Field::DailyLiquidity, &["liquidez"]),
    Alias::new(Field::DailyLiquidity, &["liq", "diaria"]),
];

// fii_detalhes.php / detalhes.php for funds; first matching entry wins.
pub const FUND_DETAIL_ALIASES: &[Alias] = &[
    Alias::new(Field::Administrator, &["administrador"]),
    Alias::new(Field::Manager, &["gestao"]),
    Alias::new(Field::Manager, &["gestor"]),
    Alias::new(Field::Mandate, &["mandato"]),
    Alias::new(Field::TargetAudience, &["publico alvo"]),
    Alias::new(Field::TargetAudience, &["publico-alvo"]),
    Alias::new(Field::Cnpj, &["cnpj"]),
    Alias::new(Field::Name, &["nome"]),
    Alias::new(Field::Name, &["fundo"]),
    Alias::new(Field::BookValuePerShare, &["valor patrimonial por cota"]),
    Alias::new(Field::BookValuePerShare, &["valor patrimonial r$/cota"]),
    Alias::new(Field::BookValuePerShare, &["vpa"]),
    Alias::new(Field::PriceToBook, &["p/vp"]),
    Alias::new(Field::NetWorth, &["patrimonio liquido"]),
    Alias::new(Field::NetWorth, &["patrim liquido"]),
    Alias::new(Field::DailyLiquidity, &["liquidez media diaria"]),
    Alias::new(Field::AdminFee, &["taxa de administracao"]),
    Alias::new(Field::PerformanceFee, &["taxa de performance"]),
    Alias::new(Field::Segment, &["segmento"]),
    Alias::new(Field::Price, &["cotacao"]),
    Alias::new(Field::DividendYield, &["div. yield"]),
    Alias::new(Field::DividendYield, &["dividend yield"]),
    Alias::new(Field::FfoYield, &["ffo yield"]),
    Alias::new(Field::MarketValue, &["valor de mercado"]),
    Alias::new(Field::PropertyCount, &["qtd", "imoveis"]),
    Alias::new(Field::Vacancy, &["vacancia"]),
    Alias::new(Field::CapRate, &["cap rate"]),
];

// resultado.php
pub const STOCK_LISTING_ALIASES: &[Alias] = &[
    Alias::new(Field::Price, &["cotacao"]),
    Alias::new(Field::PriceEarnings, &["p/l"]),
    Alias::new(Field::PriceToBook, &["p/vp"]),
    Alias::new(Field::DividendYield, &["div.yield"]),
    Alias::new(Field::DividendYield, &["div. yield"]),
    Alias::new(Field::DividendYield, &["dividend"]),
    Alias::new(Field::Roe, &["roe"]),
    Alias::new(Field::DailyLiquidity, &["liq", "meses"]),
    Alias::new(Field::NetWorth, &["patrim. liq"]),
    Alias::new(Field::NetWorth, &["patrimonio liquido"]),
    Alias::new(Field::DebtToEquity, &["div", "brut", "patrim"]),
];

// detalhes.php for stocks. "subsetor" has to come before "setor".
pub const STOCK_DETAIL_ALIASES: &[Alias] = &[
    Alias::new(Field::Segment, &["subsetor"]),
    Alias::new(Field::Sector, &["setor"]),
    Alias::new(Field::Name, &["empresa"]),
    Alias::new(Field::Price, &["cotacao"]),
    Alias::new(Field::Low52Weeks, &["min 52"]),
    Alias::new(Field::High52Weeks, &["max 52"]),
    Alias::new(Field::Volume, &["vol $ med"]),
    Alias::new(Field::MarketValue, &["valor de mercado"]),
    Alias::new(Field::PriceEarnings, &["p/l"]),
    Alias::new(Field::PriceToBook, &["p/vp"]),
    Alias::new(Field::BookValuePerShare, &["vpa"]),
    Alias::new(Field::DividendYield, &["div. yield"]),
    Alias::new(Field::DividendYield, &["div.yield"]),
    Alias::new(Field::Roe, &["roe"]),
    Alias::new(Field::NetWorth, &["patrim. liq"]),
    Alias::new(Field::TotalDebt, &["div. bruta"]),
];

/// First alias (table order) contained in the label.
pub fn resolve_label(label: &str, table: &[Alias]) -> Option<Field> {
    let normalized = normalize_text(label);
    if normalized.is_empty() {
        return None;
    }
    table.iter().find(|a| a.matches(&normalized)).map(|a| a.field)
}

/// Column index per field: the first header matching any primary alias
/// of that field, else the first header matching a fallback alias.
/// Fields with no matching header are simply absent.
pub fn resolve_columns(headers: &[String], table: &[Alias]) -> BTreeMap<Field, usize> {
    let mut columns = BTreeMap::new();

    for alias in table {
        if columns.contains_key(&alias.field) {
            continue;
        }
        let field = alias.field;
        let aliases = || table.iter().filter(move |a| a.field == field);

        let index = headers
            .iter()
            .position(|h| aliases().any(|a| !a.fallback && a.matches(h)))
            .or_else(|| {
                headers
                    .iter()
                    .position(|h| aliases().any(|a| a.fallback && a.matches(h)))
            });

        if let Some(index) = index {
            columns.insert(field, index);
        }
    }

    columns
}

/// First header containing any of the keyword groups (all words of a group).
pub fn find_column(headers: &[String], groups: &[&[&str]]) -> Option<usize> {
    headers
        .iter()
        .position(|h| groups.iter().any(|g| !g.is_empty() && g.iter().all(|k| h.contains(k))))
}

/// Type a raw token for `field`. `None` means "no value": the caller must
/// leave the field out of the update.
pub fn map_value(field: Field, raw: &str) -> Option<Value> {
    match field.kind() {
        FieldKind::Text => {
            let text = raw.trim();
            if text.is_empty() {
                None
            } else {
                Some(Value::Text(text.to_string()))
            }
        }
        FieldKind::Decimal => parse_number(raw).map(Value::Decimal),
        FieldKind::Integer => parse_integer(raw).map(Value::Integer),
        FieldKind::Liquidity => parse_liquidity(raw).map(Value::Integer),
    }
}

/// Route label/value pairs through `table` into `update`. Returns how many
/// pairs produced a value. Unknown labels are dropped.
pub fn map_pairs(pairs: &[(String, String)], table: &[Alias], update: &mut InstrumentUpdate) -> usize {
    let mut mapped = 0;
    for (label, raw) in pairs {
        let Some(field) = resolve_label(label, table) else {
            continue;
        };
        if let Some(value) = map_value(field, raw) {
            update.set(field, value);
            mapped += 1;
        }
    }
    mapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InstrumentKind;
    use rust_decimal_macros::dec;

    fn headers(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|h| normalize_text(h)).collect()
    }

    #[test]
    fn test_resolve_label_first_alias_wins() {
        assert_eq!(resolve_label("?Subsetor", STOCK_DETAIL_ALIASES), Some(Field::Segment));
        assert_eq!(resolve_label("?Setor", STOCK_DETAIL_ALIASES), Some(Field::Sector));
        assert_eq!(resolve_label("Gestão", FUND_DETAIL_ALIASES), Some(Field::Manager));
        assert_eq!(resolve_label("Público-alvo", FUND_DETAIL_ALIASES), Some(Field::TargetAudience));
        assert_eq!(resolve_label("Data últ cot", FUND_DETAIL_ALIASES), None);
        assert_eq!(resolve_label("", FUND_DETAIL_ALIASES), None);
    }

    #[test]
    fn test_resolve_columns_fund_listing() {
        let hs = headers(&[
            "Papel", "Segmento", "Cotação", "FFO Yield", "Dividend Yield", "P/VP",
            "Valor de Mercado", "Liquidez", "Qtd de imóveis", "Preço do m2",
            "Aluguel por m2", "Cap Rate", "Vacância Média",
        ]);
        let cols = resolve_columns(&hs, FUND_LISTING_ALIASES);
        assert_eq!(cols.get(&Field::Segment), Some(&1));
        assert_eq!(cols.get(&Field::Price), Some(&2));
        assert_eq!(cols.get(&Field::FfoYield), Some(&3));
        assert_eq!(cols.get(&Field::DividendYield), Some(&4));
        assert_eq!(cols.get(&Field::PriceToBook), Some(&5));
        assert_eq!(cols.get(&Field::MarketValue), Some(&6));
        assert_eq!(cols.get(&Field::DailyLiquidity), Some(&7));
        assert_eq!(cols.get(&Field::PropertyCount), Some(&8));
        // only the ("preco", "m2") fallback matches "preco do m2"
        assert_eq!(cols.get(&Field::PricePerM2), Some(&9));
        assert_eq!(cols.get(&Field::RentPerM2), Some(&10));
        assert_eq!(cols.get(&Field::CapRate), Some(&11));
        assert_eq!(cols.get(&Field::Vacancy), Some(&12));
        assert!(!cols.contains_key(&Field::Name));
    }

    #[test]
    fn test_primary_alias_beats_earlier_fallback_header() {
        let hs = headers(&["Imóveis (lista)", "Qtd imóveis"]);
        let cols = resolve_columns(&hs, FUND_LISTING_ALIASES);
        assert_eq!(cols.get(&Field::PropertyCount), Some(&1));
    }

    #[test]
    fn test_map_value_by_kind() {
        assert_eq!(map_value(Field::PriceToBook, "1,05"), Some(Value::Decimal(dec!(1.05))));
        assert_eq!(map_value(Field::PropertyCount, "12"), Some(Value::Integer(12)));
        assert_eq!(map_value(Field::DailyLiquidity, "1.500.000"), Some(Value::Integer(1_500_000)));
        assert_eq!(map_value(Field::Segment, "  Logística "), Some(Value::Text("Logística".into())));
        assert_eq!(map_value(Field::Segment, "   "), None);
        assert_eq!(map_value(Field::PriceToBook, "-"), None);
    }

    #[test]
    fn test_map_pairs_skips_unknown_and_empty() {
        let pairs = vec![
            ("P/VP".to_string(), "0,98".to_string()),
            ("Segmento".to_string(), "Híbrido".to_string()),
            ("Data últ cot".to_string(), "05/01/2024".to_string()),
            ("Patrimônio Líquido".to_string(), "-".to_string()),
        ];
        let mut update = InstrumentUpdate::new("ABCD11", InstrumentKind::RealEstateFund);
        let mapped = map_pairs(&pairs, FUND_DETAIL_ALIASES, &mut update);
        assert_eq!(mapped, 2);
        assert_eq!(update.fields.get(&Field::PriceToBook), Some(&Some(Value::Decimal(dec!(0.98)))));
        assert!(!update.fields.contains_key(&Field::NetWorth));
    }
}
