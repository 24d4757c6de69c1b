//! Keeps only records that are complete and look like real products.
//! Pure: a record is either accepted as-is or rejected, never repaired.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::models::{Product, PRICE_UNKNOWN};

/// `¥12,000` or `12,000円`, nothing else around it.
static CANONICAL_PRICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:¥\s*[0-9][0-9,]*|[0-9][0-9,]*円)$").expect("canonical price pattern")
});

pub const MIN_NAME_CHARS: usize = 5;

/// Names containing any of these (case-insensitive) are navigation,
/// marketing or placeholder text.
pub const NOISE_PHRASES: &[&str] = &[
    "more", "読み込み中", "loading", "...", "詳細", "detail", "もっと見る", "view more",
    "show more", "続きを見る", "next", "prev", "previous", "次へ", "前へ", "ページ", "page",
    "カート", "cart", "ログイン", "login", "menu", "メニュー", "search", "検索", "category",
    "カテゴリ", "home", "ホーム", "top", "トップ", "back", "戻る", "help", "ヘルプ", "contact",
    "お問い合わせ", "unknown", "不明", "n/a", "none", "null", "送料", "出品", "webshop",
    "キャンペーン", "発送予定", "買い取り", "下取り", "ポイント", "査定", "商品ピックアップ情報",
    "pickup item", "検索該当件数", "全17件", "全件", "件数",
];

const PUNCTUATION: &str = ".,;:!?()-[]{}/*+=・";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    ShortName,
    BadLink,
    MissingPrice,
    MalformedPrice,
    NoisePhrase,
    SymbolsOnly,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rejection::ShortName => "name too short",
            Rejection::BadLink => "link not absolute http(s)",
            Rejection::MissingPrice => "no price",
            Rejection::MalformedPrice => "price not canonical",
            Rejection::NoisePhrase => "noise phrase in name",
            Rejection::SymbolsOnly => "name is punctuation only",
        };
        f.write_str(s)
    }
}

pub fn validate(product: &Product) -> bool {
    rejection(product).is_none()
}

/// The first rule a record breaks, if any.
pub fn rejection(product: &Product) -> Option<Rejection> {
    let name = product.name.trim();
    if name.chars().filter(|c| !c.is_whitespace()).count() < MIN_NAME_CHARS {
        return Some(Rejection::ShortName);
    }

    let link = product.link.trim();
    if !(link.starts_with("http://") || link.starts_with("https://")) {
        return Some(Rejection::BadLink);
    }

    let price = product.price.trim();
    if price.is_empty() || price == PRICE_UNKNOWN {
        return Some(Rejection::MissingPrice);
    }
    if !CANONICAL_PRICE.is_match(price) {
        return Some(Rejection::MalformedPrice);
    }

    // Substring match subsumes the exact and prefix cases.
    let lower = name.to_lowercase();
    if NOISE_PHRASES.iter().any(|noise| lower.contains(noise)) {
        return Some(Rejection::NoisePhrase);
    }

    if name
        .chars()
        .filter(|c| *c != ' ')
        .all(|c| PUNCTUATION.contains(c))
    {
        return Some(Rejection::SymbolsOnly);
    }

    None
}
