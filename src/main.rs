mod config;
mod diff;
mod models;
mod notify;
mod pipeline;
mod scraper;
mod storage;
mod utils;
mod validator;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{AppConfig, LoggingConfig};
use crate::notify::{LogNotifier, Notifier, SmtpNotifier};
use crate::pipeline::{Pipeline, RunContext};
use crate::scraper::HttpFetcher;
use crate::storage::SnapshotStore;

/// Written next to the process when a run aborts.
const ERROR_ARTIFACT: &str = "error_log.txt";

#[derive(Parser)]
#[command(name = "store-monitor", about = "Watch instrument store listings for new products", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Check every site, mail new products and replace the snapshot
    Run {
        /// Log the mail instead of sending it and keep the snapshot as is
        #[arg(long)]
        dry_run: bool,
    },

    /// Show what the stored snapshot holds per site
    Stats,

    /// List configured sites and their parser
    Sites,

    /// Run one site's parser and validator over a saved page
    Parse {
        /// Site key, e.g. `ikebe`
        #[arg(short, long)]
        site: String,

        /// Saved HTML of the listing page
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = AppConfig::load();
    let log_file = match &loaded {
        Ok(cfg) => cfg.logging.file.clone(),
        Err(_) => LoggingConfig::default().file,
    };
    let _guard = init_tracing(cli.verbose, &log_file);

    let result = match loaded {
        Ok(config) => execute(cli.command, config).await,
        Err(e) => Err(anyhow::Error::new(e).context("Failed to load configuration")),
    };

    if let Err(e) = &result {
        error!("{:#}", e);
        utils::write_error_artifact(Path::new(ERROR_ARTIFACT), e);
    }
    result
}

/// Console in compact form plus an append-only copy in the log file.
/// The returned guard flushes the file writer on drop.
fn init_tracing(verbose: u8, log_file: &Path) -> Option<WorkerGuard> {
    let default = match verbose {
        0 => "store_monitor=info,warn",
        1 => "store_monitor=debug,info",
        _ => "store_monitor=trace,debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let dir = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = log_file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("store-monitor.log");

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(dir);

    match appender {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_target(false))
                .with(fmt::layer().with_writer(writer).with_ansi(false).with_target(false))
                .init();
            Some(guard)
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_target(false))
                .init();
            warn!("Log file {:?} unavailable, console only: {}", log_file, e);
            None
        }
    }
}

async fn execute(command: Command, config: AppConfig) -> Result<()> {
    match command {
        Command::Run { dry_run } => {
            let notifier: Box<dyn Notifier> = if dry_run {
                Box::new(LogNotifier)
            } else {
                let mail = config.notify.mail_settings()?;
                Box::new(SmtpNotifier::new(&mail).context("Failed to set up mail transport")?)
            };
            let fetcher = Box::new(HttpFetcher::new(&config.scraper)?);

            let report = Pipeline::new(config, fetcher, notifier)?
                .dry_run(dry_run)
                .run()
                .await;

            info!(
                "Done: {} of {} sites answered, {} products, {} new",
                report.sites - report.failed_sites.len(),
                report.sites,
                report.collected,
                report.new_items()
            );
            if std::env::var_os("GITHUB_ACTIONS").is_some() {
                println!(
                    "::notice title=store-monitor::{} products collected, {} new, mail {}",
                    report.collected,
                    report.new_items(),
                    report.notification
                );
            }
        }

        Command::Stats => {
            let store = SnapshotStore::open(&config.storage.snapshot_path)?;
            let snapshot = store.load()?;
            println!("─────────────────────────────────────────────");
            println!("  Store Monitor — Snapshot {:?}", store.path());
            println!("─────────────────────────────────────────────");
            if snapshot.is_empty() {
                println!("  (empty — run `store-monitor run` first)");
            }
            for (key, products) in snapshot.iter() {
                let latest = products
                    .iter()
                    .map(|p| p.found_date)
                    .max()
                    .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "—".into());
                println!(
                    "  {:<12} {:>5} products   latest {}",
                    key,
                    utils::fmt_number(products.len() as u64),
                    latest
                );
            }
            println!("─────────────────────────────────────────────");
            println!("  Total        {:>5}", utils::fmt_number(snapshot.total() as u64));
        }

        Command::Sites => {
            println!("{} sites:", config.sites.len());
            for site in &config.sites {
                println!(
                    "  {:<12} {:<10} {}  ({})",
                    site.key,
                    site.parser_key(),
                    site.name,
                    site.url
                );
            }
        }

        Command::Parse { site, file } => {
            let site = config
                .site(&site)
                .with_context(|| format!("No site configured with key `{}`", site))?;
            let bytes = std::fs::read(&file).with_context(|| format!("Failed to read {:?}", file))?;
            let body = String::from_utf8_lossy(&bytes);

            let products = pipeline::extract(site, &body, &RunContext::new());
            println!("{} valid products from {:?}", products.len(), file);
            for (i, p) in products.iter().enumerate() {
                println!("{:>3}. {}", i + 1, p.name);
                println!("     {}  {}", p.price, p.link);
                println!("     id {}", p.id);
            }
        }
    }

    Ok(())
}
