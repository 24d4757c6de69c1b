//! Flat-text listings without usable markup. The page is flattened to lines
//! and walked with a cursor: find a head line, look a few lines ahead for a
//! price, emit, then jump past what was consumed.

use super::{Candidates, Document};
use crate::models::Candidate;
use crate::scraper::cleaner::{extract_symbol_price, extract_tax_included_price, squash_whitespace};

/// Line-walk settings for brand-led listings.
pub struct BrandRules {
    pub brands: &'static [&'static str],
    /// A brand line has at most this many words.
    pub max_words: usize,
    /// A name line containing one of these is a status line, not a name.
    pub skip_name: &'static [&'static str],
    /// Lines after the brand line searched for a price.
    pub lookahead: usize,
    /// Product anchors are matched to emitted candidates in page order.
    pub link_marker: &'static str,
}

impl BrandRules {
    pub fn is_brand_line(&self, line: &str) -> bool {
        line.split_whitespace().count() <= self.max_words
            && self.brands.iter().any(|b| line.contains(b))
    }
}

pub static KUROSAWA: BrandRules = BrandRules {
    brands: &["Juan Hernandez", "Gibson", "Cordoba", "ARIA", "YAMAHA", "その他", "桜井 正毅"],
    max_words: 4,
    skip_name: &["在庫", "状態", "ポイント", "送料"],
    lookahead: 7,
    link_marker: "/items/",
};

/// Line-walk settings for listings where a fixed marker tags the name line.
pub struct MarkerRules {
    pub marker: &'static str,
    /// Lines after the name line searched for a price.
    pub lookahead: usize,
}

pub static QSIC: MarkerRules = MarkerRules {
    marker: "【返品OK】",
    lookahead: 3,
};

pub fn kurosawa(doc: &Document) -> Candidates<'_> {
    brand_scan(doc, &KUROSAWA)
}

pub fn qsic(doc: &Document) -> Candidates<'_> {
    marker_scan(doc.lines(), &QSIC)
}

/// First price in `lines[from..from + len]`, with its line index.
fn find_price(
    lines: &[String],
    from: usize,
    len: usize,
    extract: fn(&str) -> Option<String>,
) -> Option<(usize, String)> {
    let end = from.saturating_add(len).min(lines.len());
    (from..end).find_map(|j| extract(&lines[j]).map(|p| (j, p)))
}

// ── Brand lines ───────────────────────────────────────────────────────────────

pub fn brand_scan<'a>(doc: &'a Document, rules: &'a BrandRules) -> Candidates<'a> {
    let links: Vec<&str> = doc
        .links_containing(&[rules.link_marker])
        .into_iter()
        .map(|(href, _)| href)
        .collect();
    brand_walk(doc.lines(), links, rules)
}

fn brand_walk<'a>(lines: Vec<String>, links: Vec<&'a str>, rules: &'a BrandRules) -> Candidates<'a> {
    let mut cursor = 0;
    let mut emitted = 0;

    Box::new(std::iter::from_fn(move || {
        while cursor < lines.len() {
            let i = cursor;
            let brand = &lines[i];

            if !rules.is_brand_line(brand) {
                cursor += 1;
                continue;
            }
            let Some(name) = lines.get(i + 1) else {
                cursor += 1;
                continue;
            };
            let name_lower = name.to_lowercase();
            if rules.skip_name.iter().any(|s| name_lower.contains(s)) {
                cursor += 1;
                continue;
            }

            let Some((j, price)) = find_price(&lines, i + 1, rules.lookahead, extract_symbol_price)
            else {
                cursor += 1;
                continue;
            };

            cursor = (j + 1).max(i + 2);
            let href = links.get(emitted).map(|h| h.to_string());
            emitted += 1;
            return Some(Candidate::new(
                format!("{} {}", brand, name).trim().to_string(),
                Some(price),
                href,
            ));
        }
        None
    }))
}

// ── Marker lines ──────────────────────────────────────────────────────────────

/// `<name>【返品OK】…` followed by an optional `[condition] description`
/// line and a `…円(税込)` price line. No per-product link.
pub fn marker_scan(lines: Vec<String>, rules: &MarkerRules) -> Candidates<'_> {
    let mut cursor = 0;

    Box::new(std::iter::from_fn(move || {
        while cursor < lines.len() {
            let i = cursor;
            let line = &lines[i];

            if !(line.contains(rules.marker) && line.contains('[') && line.contains(']')) {
                cursor += 1;
                continue;
            }

            let head = line.split(rules.marker).next().unwrap_or_default().trim();
            let mut name = head.to_string();
            if let Some(next) = lines.get(i + 1).filter(|l| l.starts_with('[')) {
                if let Some((condition, description)) = next[1..].split_once(']') {
                    name.push_str(&format!(" [{}]", condition.trim()));
                    let description = description.trim();
                    if !description.is_empty() {
                        name.push(' ');
                        name.push_str(description);
                    }
                }
            }

            let Some((j, price)) =
                find_price(&lines, i + 1, rules.lookahead, extract_tax_included_price)
            else {
                cursor += 1;
                continue;
            };

            cursor = (j + 1).max(i + 2);
            return Some(Candidate::new(squash_whitespace(&name), Some(price), None));
        }
        None
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_brand_line_detection() {
        assert!(KUROSAWA.is_brand_line("YAMAHA"));
        assert!(KUROSAWA.is_brand_line("桜井 正毅"));
        assert!(!KUROSAWA.is_brand_line("YAMAHA のクラシックギターを多数取り揃えております 店頭 でも 販売中"));
        assert!(!KUROSAWA.is_brand_line("Ramirez"));
    }

    #[test]
    fn test_brand_walk_pairs_name_and_price() {
        let page = lines(&[
            "クラシックギター一覧",
            "YAMAHA",
            "GC22C 2019年製",
            "状態：A",
            "¥330,000",
            "ARIA",
            "A-20 Cedar",
            "¥28,600",
        ]);
        let found: Vec<Candidate> = brand_walk(page, vec!["/items/1", "/items/2"], &KUROSAWA).collect();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "YAMAHA GC22C 2019年製");
        assert_eq!(found[0].price.as_deref(), Some("¥330,000"));
        assert_eq!(found[0].href.as_deref(), Some("/items/1"));
        assert_eq!(found[1].name, "ARIA A-20 Cedar");
        assert_eq!(found[1].href.as_deref(), Some("/items/2"));
    }

    #[test]
    fn test_price_beyond_lookahead_is_ignored() {
        let mut raw = vec!["Gibson", "C-1 Classical"];
        raw.extend(std::iter::repeat_n("説明文", 6));
        raw.push("¥198,000");
        let page = lines(&raw);
        // name line + 6 filler = 7 lines ahead, price sits on the 8th
        assert_eq!(page.iter().position(|l| l == "¥198,000"), Some(8));

        let found: Vec<Candidate> = brand_walk(page.clone(), vec![], &KUROSAWA).collect();
        assert!(found.is_empty());

        // one filler line fewer and the price is inside the window
        let mut near = page;
        near.remove(2);
        let found: Vec<Candidate> = brand_walk(near, vec![], &KUROSAWA).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].price.as_deref(), Some("¥198,000"));
    }

    #[test]
    fn test_status_name_line_skipped() {
        let page = lines(&["Cordoba", "在庫あり", "¥50,000"]);
        let found: Vec<Candidate> = brand_walk(page, vec![], &KUROSAWA).collect();
        assert!(found.is_empty());
    }

    #[test]
    fn test_marker_scan() {
        let page = lines(&[
            "Jose Ramirez 1a 1975 [S/N 1234]【返品OK】",
            "[中古] 杉単板 トップ小傷あり",
            "1,280,000円(税込)",
            "Kohno No.20 [2001]【返品OK】",
            "SOLD",
            "Hauser Model [1990]【返品OK】",
            "[美品]",
            "990,000円(税込)",
        ]);
        let found: Vec<Candidate> = marker_scan(page, &QSIC).collect();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "Jose Ramirez 1a 1975 [S/N 1234] [中古] 杉単板 トップ小傷あり");
        assert_eq!(found[0].price.as_deref(), Some("¥1,280,000"));
        assert_eq!(found[0].href, None);
        assert_eq!(found[1].name, "Hauser Model [1990] [美品]");
        assert_eq!(found[1].price.as_deref(), Some("¥990,000"));
    }

    #[test]
    fn test_kurosawa_on_markup() {
        let html = r#"<html><body>
            <div class="item"><a href="/items/5501">
              <p>Juan Hernandez</p>
              <p>Concierto Cedar</p>
              <p>¥264,000</p>
            </a></div>
        </body></html>"#;
        let d = Document::parse(html, Url::parse("https://shop.kurosawagakki.com").unwrap());
        let found: Vec<Candidate> = kurosawa(&d).collect();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Juan Hernandez Concierto Cedar");
        assert_eq!(found[0].href.as_deref(), Some("/items/5501"));
    }
}
