//! Link-driven listings: every anchor is classified by its href, and the
//! price is looked up in the closest enclosing containers.

use scraper::ElementRef;

use super::{element_text, Candidates, Document, ANCHOR};
use crate::models::Candidate;
use crate::scraper::cleaner::extract_price;

/// How many enclosing elements are searched for a price, innermost first.
pub const PRICE_SEARCH_DEPTH: usize = 3;

/// Which anchors count as product links.
pub struct LinkRules {
    /// Any of these in the (lowercased) href marks a product link.
    pub include: &'static [&'static str],
    /// Any of these in the (lowercased) href disqualifies it, checked first.
    pub exclude: &'static [&'static str],
    /// Same-site links whose text names one of these brands are accepted
    /// even without an include marker.
    pub brands: &'static [&'static str],
    /// Link text containing one of these is not a product.
    pub skip_text: &'static [&'static str],
    /// Link text must be longer than this many chars.
    pub min_text_chars: usize,
}

impl LinkRules {
    pub fn accepts(&self, href: &str, text: &str, host: &str) -> bool {
        let href_lower = href.to_lowercase();
        let text_lower = text.to_lowercase();

        if self.exclude.iter().any(|m| href_lower.contains(m)) {
            return false;
        }
        if text.chars().count() <= self.min_text_chars {
            return false;
        }
        if self.skip_text.iter().any(|s| text_lower.contains(s)) {
            return false;
        }
        if self.include.iter().any(|m| href_lower.contains(m)) {
            return true;
        }

        let same_site = href.starts_with('/') || (!host.is_empty() && href_lower.contains(host));
        same_site
            && text.chars().count() > 1
            && self.brands.iter().any(|b| text_lower.contains(b))
    }
}

pub static IKEBE: LinkRules = LinkRules {
    include: &["pid=", "/detail", "productdetail", "/item/"],
    exclude: &[
        "javascript:", "mailto:", "#", "/search", "/category", "/cart", "/login", "/register",
        "/help", "/contact", "/company", "/privacy", "facebook.com", "twitter.com",
        "instagram.com", "youtube.com", "sort=", "page=", "pno=", "img=", "dpcnt=",
    ],
    brands: &[
        "yamaha", "fender", "gibson", "martin", "taylor", "hernandez", "yacopi", "yairi",
    ],
    skip_text: &[],
    min_text_chars: 0,
};

pub static SHIMAMURA: LinkRules = LinkRules {
    include: &["/ec/pro/disp/"],
    exclude: &["javascript:", "mailto:"],
    brands: &[],
    skip_text: &["送料", "出品", "webshop"],
    min_text_chars: 5,
};

pub fn ikebe(doc: &Document) -> Candidates<'_> {
    scan(doc, &IKEBE)
}

pub fn shimamura(doc: &Document) -> Candidates<'_> {
    scan(doc, &SHIMAMURA)
}

/// Accepted anchors, each paired with the nearest price found around it.
pub fn scan<'a>(doc: &'a Document, rules: &'a LinkRules) -> Candidates<'a> {
    let host = doc.base_url().host_str().unwrap_or_default();

    Box::new(doc.html().select(&ANCHOR).filter_map(move |a| {
        let href = a.value().attr("href")?;
        let text = element_text(a);
        if !rules.accepts(href, &text, host) {
            return None;
        }
        let price = nearby_price(a, PRICE_SEARCH_DEPTH);
        Some(Candidate::new(text, price, Some(href.to_string())))
    }))
}

/// Walk up to `depth` enclosing elements and return the first price found.
pub fn nearby_price(el: ElementRef<'_>, depth: usize) -> Option<String> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .take(depth)
        .find_map(|container| extract_price(&container.text().collect::<String>()))
}
