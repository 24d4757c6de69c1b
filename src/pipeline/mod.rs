//! Pipeline orchestrator: fetch → parse → validate per site, then diff
//! against the stored snapshot, notify, and overwrite the snapshot.
//!
//! Sites run one after another with a pause in between. A site that fails
//! to fetch contributes an empty list and the run carries on. The snapshot
//! is replaced with whatever this run collected, even when a site failed,
//! so the next successful fetch of that site reports its whole listing as
//! new.

use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, info_span, trace, warn, Instrument, Span};

use crate::config::{AppConfig, SiteConfig};
use crate::diff;
use crate::models::{NewProducts, Product, Snapshot};
use crate::notify::{self, Notifier};
use crate::scraper::parsers::{self, Document};
use crate::scraper::Fetcher;
use crate::storage::SnapshotStore;
use crate::utils::{truncate, Timer};
use crate::validator;

/// How many records per site are echoed to the log.
const LOG_SAMPLES: usize = 3;

// ── Run context ───────────────────────────────────────────────────────────────

/// Carried through every stage of one run.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Stamped on every record found in this run.
    pub started_at: NaiveDateTime,
    pub span: Span,
}

impl RunContext {
    pub fn new() -> Self {
        Self::at(Local::now().naive_local())
    }

    pub fn at(started_at: NaiveDateTime) -> Self {
        let span = info_span!("run", at = %started_at.format("%Y-%m-%d %H:%M:%S"));
        Self { started_at, span }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

// ── Report ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// Nothing qualified for a mail.
    Skipped,
    Sent { items: usize },
    Failed,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Skipped => f.write_str("skipped"),
            Notification::Sent { items } => write!(f, "sent ({} items)", items),
            Notification::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub sites: usize,
    pub failed_sites: Vec<String>,
    pub collected: usize,
    pub new_products: NewProducts,
    pub notification: Notification,
    pub saved: bool,
}

impl RunReport {
    pub fn new_items(&self) -> usize {
        self.new_products.total()
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

pub struct Pipeline {
    config: AppConfig,
    fetcher: Box<dyn Fetcher>,
    notifier: Box<dyn Notifier>,
    store: SnapshotStore,
    dry_run: bool,
}

impl Pipeline {
    pub fn new(
        config: AppConfig,
        fetcher: Box<dyn Fetcher>,
        notifier: Box<dyn Notifier>,
    ) -> Result<Self> {
        let store = SnapshotStore::open(&config.storage.snapshot_path)?;
        Ok(Self {
            config,
            fetcher,
            notifier,
            store,
            dry_run: false,
        })
    }

    /// Leave the stored snapshot untouched after the run.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn run(&self) -> RunReport {
        let ctx = RunContext::new();
        self.run_with(&ctx).await
    }

    pub async fn run_with(&self, ctx: &RunContext) -> RunReport {
        self.execute(ctx).instrument(ctx.span.clone()).await
    }

    async fn execute(&self, ctx: &RunContext) -> RunReport {
        let _t = Timer::start("store check");
        info!("=== Checking {} sites ===", self.config.sites.len());

        // ── 1. Collect ─────────────────────────────────────────────────────────
        let (current, failed_sites) = self.collect(ctx).await;
        let collected = current.total();
        info!(
            "Collected {} products from {} sites ({} failed)",
            collected,
            current.site_count(),
            failed_sites.len()
        );
        if collected == 0 {
            warn!("No products collected from any site");
        }

        // ── 2. Diff ────────────────────────────────────────────────────────────
        let previous = match self.store.load() {
            Ok(previous) => previous,
            Err(e) => {
                warn!("{:#}; comparing against an empty snapshot", e);
                Snapshot::new()
            }
        };
        let new_products = diff::new_products(&current, &previous);
        log_new_products(&new_products, &self.config);

        // ── 3. Notify ──────────────────────────────────────────────────────────
        let notification = self.notify(&new_products, ctx).await;

        // ── 4. Persist ─────────────────────────────────────────────────────────
        let saved = if self.dry_run {
            info!("Dry run: snapshot at {:?} left untouched", self.store.path());
            false
        } else {
            match self.store.save(&current) {
                Ok(()) => true,
                Err(e) => {
                    error!("Snapshot save failed: {:#}", e);
                    false
                }
            }
        };

        info!(
            "=== Done: {} collected | {} new | mail {} ===",
            collected,
            new_products.total(),
            notification
        );

        RunReport {
            sites: self.config.sites.len(),
            failed_sites,
            collected,
            new_products,
            notification,
            saved,
        }
    }

    /// Every configured site in order; failures become empty lists.
    async fn collect(&self, ctx: &RunContext) -> (Snapshot, Vec<String>) {
        let mut current = Snapshot::new();
        let mut failed = Vec::new();

        for (i, site) in self.config.sites.iter().enumerate() {
            if i > 0 {
                self.pause().await;
            }
            info!("{}: fetching {}", site.name, site.url);

            let products = match self.fetcher.fetch(site.url.as_str()).await {
                Ok(body) => extract(site, &body, ctx),
                Err(e) => {
                    warn!("{}: {}", site.name, e);
                    failed.push(site.key.clone());
                    Vec::new()
                }
            };
            current.insert(site.key.clone(), products);
        }

        (current, failed)
    }

    async fn pause(&self) {
        let cfg = &self.config.scraper;
        let jitter = if cfg.jitter_ms > 0 {
            rand::random_range(0..=cfg.jitter_ms)
        } else {
            0
        };
        let wait = cfg.request_delay_ms + jitter;
        if wait > 0 {
            debug!("Sleeping {} ms before next site", wait);
            tokio::time::sleep(Duration::from_millis(wait)).await;
        }
    }

    async fn notify(&self, new_products: &NewProducts, ctx: &RunContext) -> Notification {
        let cfg = &self.config.notify;
        let eligible = notify::filter_min_price(new_products, cfg.min_price);
        if eligible.total() < new_products.total() {
            info!(
                "{} of {} new products are at or above the ¥{} mail threshold",
                eligible.total(),
                new_products.total(),
                cfg.min_price
            );
        }

        let Some(mail) = notify::render(&eligible, &cfg.keywords, ctx.started_at) else {
            info!("Nothing to report; mail skipped");
            return Notification::Skipped;
        };

        match self.notifier.send(&mail.subject, &mail.body).await {
            Ok(()) => Notification::Sent {
                items: eligible.total(),
            },
            Err(e) => {
                error!("Mail delivery failed: {}", e);
                Notification::Failed
            }
        }
    }
}

// ── Per-site extraction ───────────────────────────────────────────────────────

/// Run a site's strategy over a fetched page and keep the records that pass
/// validation, up to the site's cap.
pub fn extract(site: &SiteConfig, body: &str, ctx: &RunContext) -> Vec<Product> {
    let Some(parse) = parsers::strategy_for(site.parser_key()) else {
        error!("{}: no parser named {}", site.key, site.parser_key());
        return Vec::new();
    };

    let doc = Document::parse(body, site.base_url.clone());
    let mut products = Vec::new();
    let mut rejected = 0usize;

    for candidate in parse(&doc) {
        let product = match Product::from_candidate(candidate, site, ctx.started_at) {
            Ok(p) => p,
            Err(e) => {
                debug!("{}: skipping candidate with unusable link: {}", site.key, e);
                continue;
            }
        };
        if let Some(reason) = validator::rejection(&product) {
            trace!(site = %site.key, name = %product.name, price = %product.price, "rejected: {}", reason);
            rejected += 1;
            continue;
        }
        products.push(product);
        if site.max_products.is_some_and(|max| products.len() >= max) {
            break;
        }
    }

    debug!("{}: {} candidates rejected", site.key, rejected);
    log_site(site, &products);
    products
}

fn log_site(site: &SiteConfig, products: &[Product]) {
    info!("{}: {} products with price", site.name, products.len());
    for p in products.iter().take(LOG_SAMPLES) {
        info!("  - {} ({})", truncate(&p.name, 50), p.price);
    }
    if products.len() > LOG_SAMPLES {
        info!("  …and {} more", products.len() - LOG_SAMPLES);
    }
}

fn log_new_products(new_products: &NewProducts, config: &AppConfig) {
    if new_products.is_empty() {
        info!("No new products since last run");
        return;
    }
    info!(
        "{} new products across {} sites (total {})",
        new_products.total(),
        new_products.site_count(),
        notify::total_value(new_products)
    );
    for (key, products) in new_products.iter() {
        let name = config.site(key).map_or(key, |s| s.name.as_str());
        info!("  {}: {}", name, products.len());
        for p in products.iter().take(LOG_SAMPLES) {
            info!("    + {} ({})", truncate(&p.name, 50), p.price);
        }
    }
}
