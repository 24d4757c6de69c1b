//! Turns a run's new records into one plain-text mail and hands it to a
//! [`Notifier`]. Rendering is pure; delivery is the notifier's business.

pub mod smtp;

pub use self::smtp::SmtpNotifier;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::fmt::Write as _;
use thiserror::Error;
use tracing::info;

use crate::models::{NewProducts, Product};
use crate::scraper::cleaner::price_value;
use crate::utils::fmt_number;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Writes the mail to the log instead of sending it.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!("[dry-run] mail subject: {}", subject);
        for line in body.lines() {
            info!("[dry-run] | {}", line);
        }
        Ok(())
    }
}

// ── Rendering ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub subject: String,
    pub body: String,
}

const RULE: usize = 60;

/// Drop records priced below `min_price` yen, and sites left with none.
pub fn filter_min_price(new: &NewProducts, min_price: u64) -> NewProducts {
    if min_price == 0 {
        return new.clone();
    }
    new.iter()
        .filter_map(|(site, products)| {
            let kept: Vec<Product> = products
                .iter()
                .filter(|p| price_value(&p.price).is_some_and(|v| v >= min_price))
                .cloned()
                .collect();
            (!kept.is_empty()).then(|| (site.to_string(), kept))
        })
        .collect()
}

fn highlighted(name: &str, keywords: &[String]) -> bool {
    let lower = name.to_lowercase();
    keywords.iter().any(|k| lower.contains(&k.to_lowercase()))
}

/// Subject and body for a set of new records; `None` when there is nothing
/// to report.
pub fn render(new: &NewProducts, keywords: &[String], sent_at: NaiveDateTime) -> Option<Mail> {
    let total = new.total();
    if total == 0 {
        return None;
    }
    let sites = new.iter().filter(|(_, p)| !p.is_empty()).count();

    let subject = format!("🎸 新着商品が{}件見つかりました ({}サイト)", total, sites);
    let mut body = String::new();

    let featured: Vec<&Product> = new
        .iter()
        .flat_map(|(_, products)| products)
        .filter(|p| highlighted(&p.name, keywords))
        .collect();
    if !featured.is_empty() {
        let _ = writeln!(body, "🌟 注目キーワード ({}) を含む商品", keywords.join(" / "));
        for p in &featured {
            let _ = writeln!(body, "  {}: {} ({})", p.store_name, p.name, p.price);
        }
        let _ = writeln!(body, "\n{}\n", "=".repeat(RULE));
    }

    let _ = writeln!(body, "{}サイトで新着商品 {}件を検出しました。\n", sites, total);

    for (_, products) in new.iter() {
        let Some(first) = products.first() else {
            continue;
        };
        let _ = writeln!(body, "【{}】 {}件", first.store_name, products.len());
        let _ = writeln!(body, "{}", "-".repeat(RULE / 2));
        for (i, p) in products.iter().enumerate() {
            let _ = writeln!(body, "{}. {}", i + 1, p.name);
            let _ = writeln!(body, "   価格: {}", p.price);
            if highlighted(&p.name, keywords) {
                let _ = writeln!(body, "   🌟 注目キーワード");
            }
            let _ = writeln!(body, "   {}", p.link);
        }
        body.push('\n');
    }

    let _ = writeln!(body, "{}", "=".repeat(RULE));
    let _ = write!(body, "実行時刻: {}", sent_at.format("%Y-%m-%d %H:%M:%S"));

    Some(Mail { subject, body })
}

/// Sum of prices in a set, for log lines.
pub fn total_value(new: &NewProducts) -> String {
    let sum: u64 = new
        .iter()
        .flat_map(|(_, products)| products)
        .filter_map(|p| price_value(&p.price))
        .sum();
    format!("¥{}", fmt_number(sum))
}
