//! Per-store parsing strategies.
//!
//! Each strategy is a plain function from a parsed [`Document`] to a lazy
//! stream of [`Candidate`]s. Strategies never decide whether a candidate is
//! good enough to keep; that is the validator's job.
//!
//! Adding a store means adding a row to [`STRATEGIES`].

pub mod anchor;
pub mod lines;
pub mod scored;

use scraper::{ElementRef, Html, Node, Selector};
use std::sync::LazyLock;
use url::Url;

use crate::models::Candidate;
use crate::scraper::cleaner::text_lines;

pub type Candidates<'a> = Box<dyn Iterator<Item = Candidate> + 'a>;

pub type ParseFn = for<'a> fn(&'a Document) -> Candidates<'a>;

/// Strategy table: parser key → parse function.
pub static STRATEGIES: &[(&str, ParseFn)] = &[
    ("ikebe", anchor::ikebe),
    ("kurosawa", lines::kurosawa),
    ("shimamura", anchor::shimamura),
    ("qsic", lines::qsic),
    ("jguitar", scored::jguitar),
];

pub fn strategy_for(key: &str) -> Option<ParseFn> {
    STRATEGIES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, f)| *f)
}

pub(crate) static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("anchor selector"));

/// Elements whose start begins a new text line when flattening.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "br", "dd", "div", "dl", "dt", "figcaption", "figure",
    "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "section", "table", "tbody", "td", "th", "thead", "tr", "ul",
];

/// Elements whose text is never visible.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

// ── Document ──────────────────────────────────────────────────────────────────

/// A fetched listing page, parsed once and shared by the strategy.
pub struct Document {
    html: Html,
    base_url: Url,
}

impl Document {
    pub fn parse(body: &str, base_url: Url) -> Self {
        Self {
            html: Html::parse_document(body),
            base_url,
        }
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Visible text of the whole page.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for node in self.html.tree.root().descendants() {
            match node.value() {
                Node::Element(el) if BLOCK_ELEMENTS.contains(&el.name()) => text.push('\n'),
                Node::Text(t) => {
                    let hidden = node
                        .parent()
                        .and_then(|p| p.value().as_element().map(|e| e.name()))
                        .is_some_and(|name| HIDDEN_ELEMENTS.contains(&name));
                    if !hidden {
                        text.push_str(t);
                    }
                }
                _ => {}
            }
        }
        text
    }

    /// Page text flattened to non-empty trimmed lines.
    pub fn lines(&self) -> Vec<String> {
        text_lines(&self.text())
    }

    /// (href, text) of every anchor whose href contains one of `markers`.
    pub fn links_containing(&self, markers: &[&str]) -> Vec<(&str, String)> {
        self.html
            .select(&ANCHOR)
            .filter_map(|a| {
                let href = a.value().attr("href")?;
                markers
                    .iter()
                    .any(|m| href.contains(m))
                    .then(|| (href, element_text(a)))
            })
            .collect()
    }
}

/// Text of an element with each text node trimmed, joined without separator.
pub fn element_text(el: ElementRef<'_>) -> String {
    el.text().map(str::trim).collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> Document {
        Document::parse(body, Url::parse("https://shop.example").unwrap())
    }

    #[test]
    fn test_every_default_site_has_a_strategy() {
        for key in ["ikebe", "kurosawa", "shimamura", "qsic", "jguitar"] {
            assert!(strategy_for(key).is_some(), "{}", key);
        }
        assert!(strategy_for("unknown").is_none());
    }

    #[test]
    fn test_lines_split_on_blocks_and_skip_scripts() {
        let d = doc(
            "<html><head><style>.x{}</style></head><body>\
             <div>YAMAHA</div><div>CG142S <b>Cedar</b></div>\
             <script>var price = '¥1';</script><p>¥35,000</p></body></html>",
        );
        assert_eq!(d.lines(), vec!["YAMAHA", "CG142S Cedar", "¥35,000"]);
    }

    #[test]
    fn test_links_containing() {
        let d = doc(
            r#"<a href="/items/1"> ARIA <span>A-20</span></a><a href="/cart">cart</a>"#,
        );
        let links = d.links_containing(&["/items/"]);
        assert_eq!(links, vec![("/items/1", "ARIAA-20".to_string())]);
    }
}
