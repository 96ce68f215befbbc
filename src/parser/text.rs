use unicode_normalization::UnicodeNormalization;

/// Lowercase, strip diacritics, collapse whitespace.
///
/// Used to compare header and label text against alias keywords:
/// `"  Preço  do m²"` becomes `"preco do m2"`.
pub fn normalize_text(value: &str) -> String {
    let ascii: String = value.nfkd().filter(|c| c.is_ascii()).collect();
    ascii
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Preço  do m²"), "preco do m2");
        assert_eq!(normalize_text("Vacância Média"), "vacancia media");
        assert_eq!(normalize_text("Liquidez\u{a0}Diária"), "liquidez diaria");
        assert_eq!(normalize_text("P/VP"), "p/vp");
        assert_eq!(normalize_text(""), "");
    }
}
