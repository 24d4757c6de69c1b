//! Price and text normalisation shared by every site parser.
//!
//! Prices come out in one canonical form, `¥` + thousands-separated integer.
//! The pattern table is ordered; the first pattern that matches anywhere in
//! the text wins, even if a later pattern matches earlier in the text.

use regex::Regex;
use std::sync::LazyLock;

use crate::utils::fmt_number;

// ── Price patterns ────────────────────────────────────────────────────────────

pub struct PricePattern {
    pub label: &'static str,
    regex: Regex,
}

impl PricePattern {
    fn new(label: &'static str, pattern: &str) -> Self {
        Self {
            label,
            regex: Regex::new(pattern).expect("static price pattern"),
        }
    }

    /// Canonical price from the first match of this pattern, if any.
    pub fn extract(&self, text: &str) -> Option<String> {
        let caps = self.regex.captures(text)?;
        canonical_price(caps.get(1)?.as_str())
    }
}

/// Ordered price pattern table. Order is part of the contract.
pub static PRICE_PATTERNS: LazyLock<Vec<PricePattern>> = LazyLock::new(|| {
    vec![
        PricePattern::new("yen-symbol", r"¥\s*(\d[\d,]*)"),
        PricePattern::new("yen-suffix", r"(\d{1,3}(?:,\d{3})+)円"),
        PricePattern::new("price-label", r"価格[：:]?\s*[¥￥]?\s*(\d[\d,]*)"),
        PricePattern::new("tax-included", r"(\d{1,3}(?:,\d{3})+)\s*[\(（]税込[\)）]"),
        PricePattern::new("fullwidth-yen", r"￥\s*(\d[\d,]*)"),
    ]
});

static SYMBOL_PRICE: LazyLock<PricePattern> =
    LazyLock::new(|| PricePattern::new("symbol", r"[¥￥]\s*(\d[\d,]*)"));

static TAX_INCLUDED_PRICE: LazyLock<PricePattern> =
    LazyLock::new(|| PricePattern::new("yen-tax-included", r"(\d[\d,]*)円\s*[\(（]税込[\)）]"));

static DIGIT_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*").expect("static digit pattern"));

/// First match of the ordered pattern table, as `¥<digits-with-commas>`.
/// "販売価格：¥35,000(税込)" → "¥35,000" | "128,000円" → "¥128,000"
pub fn extract_price(text: &str) -> Option<String> {
    PRICE_PATTERNS.iter().find_map(|p| p.extract(text))
}

/// Only `¥`/`￥`-prefixed amounts.
pub fn extract_symbol_price(text: &str) -> Option<String> {
    SYMBOL_PRICE.extract(text)
}

/// Only `…円(税込)` amounts.
pub fn extract_tax_included_price(text: &str) -> Option<String> {
    TAX_INCLUDED_PRICE.extract(text)
}

/// Numeric value of the first digit group in a price string.
/// "¥1,280,000" → 1280000
pub fn price_value(price: &str) -> Option<u64> {
    let group = DIGIT_GROUP.find(price)?;
    digits(group.as_str()).parse().ok()
}

fn digits(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

/// "35,000" → "¥35,000"; None when there are no digits or it overflows.
fn canonical_price(raw: &str) -> Option<String> {
    let n: u64 = digits(raw).parse().ok()?;
    Some(format!("¥{}", fmt_number(n)))
}

// ── Text ──────────────────────────────────────────────────────────────────────

/// Non-empty trimmed lines of a text blob.
pub fn text_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// Collapse runs of whitespace into single spaces.
pub fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_pattern() {
        assert_eq!(extract_price("¥35,000"), Some("¥35,000".into()));
        assert_eq!(extract_price("¥ 35000"), Some("¥35,000".into()));
        assert_eq!(extract_price("128,000円"), Some("¥128,000".into()));
        assert_eq!(extract_price("価格：98000"), Some("¥98,000".into()));
        assert_eq!(extract_price("1,650,000 (税込)"), Some("¥1,650,000".into()));
        assert_eq!(extract_price("￥220,000"), Some("¥220,000".into()));
    }

    #[test]
    fn test_pattern_order_beats_position() {
        // "円" appears first in the text but the ¥ pattern ranks higher.
        assert_eq!(
            extract_price("通常 2,000円 → セール ¥1,500"),
            Some("¥1,500".into())
        );
    }

    #[test]
    fn test_capture_stops_at_digit_group() {
        assert_eq!(extract_price("¥35,000(税込)"), Some("¥35,000".into()));
        assert_eq!(extract_price("¥35,000～¥40,000"), Some("¥35,000".into()));
    }

    #[test]
    fn test_no_match() {
        assert_eq!(extract_price("SOLD OUT"), None);
        assert_eq!(extract_price("5000円"), None);
        assert_eq!(extract_price(""), None);
    }

    #[test]
    fn test_canonical_form_is_fixed_point() {
        for text in ["¥35,000", "¥1,280,000", "¥900", "128,000円", "￥5,500"] {
            let once = extract_price(text).unwrap();
            let twice = extract_price(&once).unwrap();
            assert_eq!(once, twice, "{}", text);
        }
    }

    #[test]
    fn test_overflow_is_no_match() {
        assert_eq!(extract_symbol_price("¥99999999999999999999999"), None);
    }

    #[test]
    fn test_narrow_extractors() {
        assert_eq!(extract_symbol_price("価格 ¥12,000"), Some("¥12,000".into()));
        assert_eq!(extract_symbol_price("12,000円"), None);
        assert_eq!(
            extract_tax_included_price("販売価格 330,000円(税込)"),
            Some("¥330,000".into())
        );
        assert_eq!(extract_tax_included_price("330,000円"), None);
    }

    #[test]
    fn test_price_value() {
        assert_eq!(price_value("¥1,280,000"), Some(1_280_000));
        assert_eq!(price_value("98,000円"), Some(98_000));
        assert_eq!(price_value("価格確認中"), None);
    }

    #[test]
    fn test_text_lines() {
        let lines = text_lines("\n  YAMAHA \n\n\t¥35,000\n  ");
        assert_eq!(lines, vec!["YAMAHA", "¥35,000"]);
        assert_eq!(squash_whitespace(" a \n b\tc "), "a b c");
    }
}
