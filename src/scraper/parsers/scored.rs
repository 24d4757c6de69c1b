//! Marketing-heavy listings. Lines are scored as possible product names,
//! every plausible price line is collected separately, and each name is
//! paired with the closest price.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::{Candidates, Document};
use crate::models::Candidate;
use crate::scraper::cleaner::{extract_price, price_value};

static YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9])(?:19[3-9][0-9]|20[0-4][0-9])(?:[^0-9]|$)").expect("year pattern")
});

static MODEL_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9])[A-Za-z]{1,4}-?[0-9]{2,4}[A-Za-z]?(?:[^0-9]|$)")
        .expect("model pattern")
});

pub struct ScoreRules {
    pub brands: &'static [&'static str],
    /// Materials, sizes and other terms that only show up in product names.
    pub domain_terms: &'static [&'static str],
    /// Operational lines; never a name regardless of score.
    pub noise: &'static [&'static str],
    pub min_chars: usize,
    pub max_chars: usize,
    /// Accepted unit price band, inclusive, in yen.
    pub price_floor: u64,
    pub price_ceiling: u64,
    /// Max line distance between a name and its price.
    pub pair_window: usize,
    pub max_results: usize,
    /// Anchors with these in the href are used to find a product link.
    pub link_markers: &'static [&'static str],
}

pub static JGUITAR: ScoreRules = ScoreRules {
    brands: &[
        "yamaha", "gibson", "fender", "martin", "taylor", "ibanez", "ramirez", "hernandez",
        "cordoba", "godin", "alhambra", "河野", "桜井", "黒澤", "中村", "kohno", "sakurai",
    ],
    domain_terms: &[
        "classical", "flamenco", "guitar", "ギター", "クラシック", "フラメンコ", "nylon",
        "ナイロン", "cedar", "spruce", "rosewood", "ebony", "セダー", "スプルース",
        "ローズウッド", "エボニー", "vintage", "ヴィンテージ", "650mm", "640mm", "630mm",
    ],
    noise: &[
        "送料", "shipping", "在庫", "stock", "売り切れ", "sold out", "ログイン", "login",
        "メニュー", "menu", "カート", "cart", "検索", "search", "お問い合わせ", "contact",
        "ページ", "page", "詳細", "detail", "価格", "price",
    ],
    min_chars: 10,
    max_chars: 150,
    price_floor: 1_000,
    price_ceiling: 10_000_000,
    pair_window: 10,
    max_results: 15,
    link_markers: &["detail", "product"],
};

impl ScoreRules {
    /// How many independent signals mark this line as a product name.
    pub fn score(&self, line: &str) -> usize {
        let lower = line.to_lowercase();
        [
            self.brands.iter().any(|b| lower.contains(b)),
            YEAR.is_match(line),
            self.domain_terms.iter().any(|t| lower.contains(t)),
            MODEL_NUMBER.is_match(line),
        ]
        .into_iter()
        .filter(|hit| *hit)
        .count()
    }

    pub fn is_name(&self, line: &str) -> bool {
        let len = line.chars().count();
        if len < self.min_chars || len > self.max_chars {
            return false;
        }
        let lower = line.to_lowercase();
        if self.noise.iter().any(|n| lower.contains(n)) {
            return false;
        }
        self.score(line) > 0
    }

    /// Canonical price on this line if it falls inside the band.
    pub fn plausible_price(&self, line: &str) -> Option<String> {
        let price = extract_price(line)?;
        let value = price_value(&price)?;
        (self.price_floor..=self.price_ceiling)
            .contains(&value)
            .then_some(price)
    }
}

pub fn jguitar(doc: &Document) -> Candidates<'_> {
    let links = doc
        .links_containing(JGUITAR.link_markers)
        .into_iter()
        .map(|(href, text)| (href.to_string(), text))
        .collect();
    score_scan(doc.lines(), links, &JGUITAR)
}

/// Names paired with their nearest price, deduplicated by name, capped.
pub fn score_scan(
    lines: Vec<String>,
    links: Vec<(String, String)>,
    rules: &ScoreRules,
) -> Candidates<'_> {
    let prices: Vec<(usize, String)> = lines
        .iter()
        .enumerate()
        .filter_map(|(i, l)| rules.plausible_price(l).map(|p| (i, p)))
        .collect();
    let mut seen = HashSet::new();

    Box::new(
        lines
            .into_iter()
            .enumerate()
            .filter(move |(_, line)| rules.is_name(line))
            .filter_map(move |(i, name)| {
                let price = nearest_price(&prices, i, rules.pair_window)?;
                let href = link_for(&links, &name);
                Some(Candidate::new(name, Some(price), href))
            })
            .filter(move |c| seen.insert(c.name.clone()))
            .take(rules.max_results),
    )
}

/// Closest price within `window` lines; on a tie the one below wins.
fn nearest_price(prices: &[(usize, String)], at: usize, window: usize) -> Option<String> {
    prices
        .iter()
        .filter(|(j, _)| j.abs_diff(at) <= window)
        .min_by_key(|(j, _)| (j.abs_diff(at), *j < at))
        .map(|(_, p)| p.clone())
}

/// Href of an anchor whose text overlaps the product name.
fn link_for(links: &[(String, String)], name: &str) -> Option<String> {
    links
        .iter()
        .filter(|(_, text)| text.chars().count() >= 5)
        .find(|(_, text)| name.contains(text.as_str()) || text.contains(name))
        .map(|(href, _)| href.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scoring_signals() {
        assert_eq!(JGUITAR.score("Ramirez 1a Cedar 1975"), 3);
        assert_eq!(JGUITAR.score("Model CG-180 spruce top"), 2);
        assert_eq!(JGUITAR.score("年末年始のお知らせ"), 0);
        assert!(JGUITAR.is_name("河野賢 No.20 1971年製"));
        assert!(!JGUITAR.is_name("Gibson"));
        assert!(!JGUITAR.is_name("送料無料 Yamaha guitar フェア開催中"));
    }

    #[test]
    fn test_price_band() {
        assert_eq!(JGUITAR.plausible_price("¥680,000"), Some("¥680,000".into()));
        assert_eq!(JGUITAR.plausible_price("ポイント ¥500"), None);
        assert_eq!(JGUITAR.plausible_price("¥12,000,000"), None);
        assert_eq!(JGUITAR.plausible_price("お問い合わせください"), None);
    }

    #[test]
    fn test_pairs_with_nearest_price() {
        let page = lines(&[
            "Jose Ramirez 1a 1968 Cedar",
            "¥1,650,000",
            "説明",
            "説明",
            "Hermanos Conde Flamenco 1985",
            "¥880,000",
        ]);
        let found: Vec<Candidate> = score_scan(page, vec![], &JGUITAR).collect();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].price.as_deref(), Some("¥1,650,000"));
        assert_eq!(found[1].name, "Hermanos Conde Flamenco 1985");
        assert_eq!(found[1].price.as_deref(), Some("¥880,000"));
    }

    #[test]
    fn test_tie_prefers_price_below() {
        let page = lines(&["¥300,000", "Yamaha GC-31 Spruce 1980", "¥450,000"]);
        let found: Vec<Candidate> = score_scan(page, vec![], &JGUITAR).collect();
        assert_eq!(found[0].price.as_deref(), Some("¥450,000"));
    }

    #[test]
    fn test_unpaired_names_dropped() {
        let mut raw = vec!["Alhambra 10 Premier Cedar"];
        raw.extend(std::iter::repeat_n("-", 11));
        raw.push("¥390,000");
        let found: Vec<Candidate> = score_scan(lines(&raw), vec![], &JGUITAR).collect();
        assert!(found.is_empty());
    }

    #[test]
    fn test_dedup_and_cap() {
        let mut raw = Vec::new();
        for n in 0..20 {
            raw.push(format!("Cordoba C{} Cedar classical", 10 + n));
            raw.push(format!("Cordoba C{} Cedar classical", 10 + n));
            raw.push("¥99,000".to_string());
        }
        let found: Vec<Candidate> = score_scan(raw, vec![], &JGUITAR).collect();

        assert_eq!(found.len(), 15);
        let unique: HashSet<&str> = found.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(unique.len(), 15);
    }

    #[test]
    fn test_link_matched_by_anchor_text() {
        let page = lines(&["Kohno No.30 1985 Spruce", "¥1,100,000"]);
        let links = vec![
            ("/products/detail.php?product_id=88".to_string(), "Kohno No.30".to_string()),
            ("/cart".to_string(), "カート".to_string()),
        ];
        let found: Vec<Candidate> = score_scan(page, links, &JGUITAR).collect();
        assert_eq!(
            found[0].href.as_deref(),
            Some("/products/detail.php?product_id=88")
        );
    }
}
