use crate::errors::ParseError;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;

// 数字部分 + 可选的量级后缀（k / mil / m / mi / mm / b / bi）
static MAGNITUDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9.,]+)\s*([a-z]{1,3})?$").unwrap());

/// Parse a Brazilian-locale number into a decimal.
///
/// - both `,` and `.` present: `.` groups thousands, `,` is the decimal mark
/// - only `,`: decimal mark
/// - only `.` and more than one of them: thousands grouping (`1.234.567`)
/// - anything else is parsed as-is
///
/// After that, everything that is not a digit, `.` or `-` is dropped
/// (currency symbols, `%`, stray spaces).
pub fn try_number(text: &str) -> Result<Decimal, ParseError> {
    let trimmed = strip_currency(text.trim());
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    let normalized = normalize_separators(trimmed);
    let cleaned: String = normalized
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    if matches!(cleaned.as_str(), "" | "-" | ".") {
        return Err(ParseError::Empty);
    }

    Decimal::from_str(&cleaned).map_err(|_| ParseError::Malformed(text.to_string()))
}

/// Same as [`try_number`], collapsing every failure into "no value".
pub fn parse_number(text: &str) -> Option<Decimal> {
    try_number(text).ok()
}

/// Integer-valued fields (property counts, traded volume): truncated toward zero.
pub fn parse_integer(text: &str) -> Option<i64> {
    parse_number(text).and_then(|d| d.trunc().to_i64())
}

/// Parse a liquidity/volume figure that may carry a magnitude suffix.
///
/// `R$ 1,2M` -> 1_200_000, `850 K` -> 850_000, `3,4 mi`, `2,1 bi`,
/// `123.456` -> 123_456.
pub fn parse_liquidity(text: &str) -> Option<i64> {
    let lowered = text.trim().to_lowercase();
    let stripped = lowered.replace("r$", "");
    let s = stripped.trim();

    let (mut number, multiplier) = match MAGNITUDE_RE.captures(s) {
        Some(caps) => {
            let number = caps.get(1).map(|m| m.as_str()).unwrap_or(s);
            let suffix = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            (number.to_string(), magnitude(suffix))
        }
        None => (s.to_string(), None),
    };

    // 1.355.850 -> 1355850（无逗号且无后缀时，点号是千位分隔符）
    if multiplier.is_none() && !number.contains(',') && number.contains('.') {
        number = number.replace('.', "");
    }

    let value = parse_number(&number)?;
    // 溢出视为无值
    let total = value.checked_mul(multiplier.unwrap_or(Decimal::ONE))?;
    total.trunc().to_i64()
}

/// Canonical text form of a parsed decimal; feeding it back through
/// [`parse_number`] yields the same value.
pub fn format_number(value: Decimal) -> String {
    value.normalize().to_string()
}

fn magnitude(suffix: &str) -> Option<Decimal> {
    match suffix {
        "k" | "mil" => Some(Decimal::from(1_000)),
        "m" | "mi" | "mm" => Some(Decimal::from(1_000_000)),
        "b" | "bi" => Some(Decimal::from(1_000_000_000)),
        _ => None,
    }
}

fn strip_currency(s: &str) -> &str {
    let upper_prefix = s.get(..2).map(|p| p.eq_ignore_ascii_case("r$")).unwrap_or(false);
    if upper_prefix {
        s[2..].trim_start()
    } else {
        s
    }
}

fn normalize_separators(s: &str) -> String {
    let has_comma = s.contains(',');
    let dots = s.matches('.').count();

    if has_comma && dots > 0 {
        s.replace('.', "").replace(',', ".")
    } else if has_comma {
        s.replace(',', ".")
    } else if dots > 1 {
        s.replace('.', "")
    } else {
        s.to_string()
    }
}
