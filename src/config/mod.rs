use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

use crate::scraper::parsers;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required mail settings: {}", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),

    #[error("site `{site}` uses unknown parser `{parser}`")]
    UnknownParser { site: String, parser: String },

    #[error(transparent)]
    Source(#[from] config::ConfigError),
}

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_sites")]
    pub sites: Vec<SiteConfig>,
}

/// Fetch behaviour shared by every site
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Pause between two sites.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
}

/// Mail delivery and what qualifies for it
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifyConfig {
    #[serde(default = "default_smtp_server")]
    pub smtp_server: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub sender_email: Option<String>,

    #[serde(default, skip_serializing)]
    pub sender_password: Option<String>,

    #[serde(default)]
    pub recipient_email: Option<String>,

    /// New records priced below this (yen) are left out of the mail.
    #[serde(default)]
    pub min_price: u64,

    /// Names containing one of these are highlighted.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

/// One monitored store
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    pub key: String,
    pub name: String,
    pub url: Url,
    pub base_url: Url,

    /// Strategy table entry; the site key when unset.
    #[serde(default)]
    pub parser: Option<String>,

    /// Query parameter carrying the store's own product id.
    #[serde(default)]
    pub id_param: Option<String>,

    /// Cap on validated records kept per run.
    #[serde(default)]
    pub max_products: Option<usize>,
}

impl SiteConfig {
    pub fn parser_key(&self) -> &str {
        self.parser.as_deref().unwrap_or(&self.key)
    }
}

/// Everything needed to log in and address the mail.
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub sender_email: String,
    pub sender_password: String,
    pub recipient_email: String,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    2000
}
fn default_jitter_ms() -> u64 {
    500
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}
fn default_snapshot_path() -> PathBuf {
    PathBuf::from("data/multi_store_products.json")
}
fn default_smtp_server() -> String {
    "smtp.gmail.com".to_string()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_keywords() -> Vec<String> {
    ["ダブルトップ", "ラティス", "doubletop", "lattice"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_log_file() -> PathBuf {
    PathBuf::from("logs/store-monitor.log")
}

fn site(key: &str, name: &str, url: &str, base_url: &str) -> SiteConfig {
    SiteConfig {
        key: key.to_string(),
        name: name.to_string(),
        url: Url::parse(url).expect("built-in site url"),
        base_url: Url::parse(base_url).expect("built-in base url"),
        parser: None,
        id_param: None,
        max_products: None,
    }
}

pub fn default_sites() -> Vec<SiteConfig> {
    vec![
        SiteConfig {
            id_param: Some("pid".to_string()),
            ..site(
                "ikebe",
                "イケベ楽器店",
                "https://www.ikebe-gakki.com/Form/Product/ProductList.aspx?shop=0&cat=agt003&bid=ec&dpcnt=20&img=1&sort=07&udns=1&fpfl=0&sfl=0&pno=1",
                "https://www.ikebe-gakki.com",
            )
        },
        SiteConfig {
            max_products: Some(15),
            ..site(
                "kurosawa",
                "黒澤楽器店",
                "https://shop.kurosawagakki.com/items/search/classic-guitar",
                "https://shop.kurosawagakki.com",
            )
        },
        site(
            "shimamura",
            "島村楽器",
            "https://store.shimamura.co.jp/ec/Facet?category_0=11040000000",
            "https://store.shimamura.co.jp",
        ),
        site(
            "qsic",
            "QSic",
            "https://www.qsic.jp/?mode=cate&cbid=790427&csid=0&sort=n",
            "https://www.qsic.jp",
        ),
        SiteConfig {
            max_products: Some(15),
            ..site(
                "jguitar",
                "J-Guitar",
                "https://www.j-guitar.com/products/list.php?category_id=103&category_id1=1",
                "https://www.j-guitar.com",
            )
        },
    ]
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            jitter_ms: default_jitter_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            smtp_server: default_smtp_server(),
            smtp_port: default_smtp_port(),
            sender_email: None,
            sender_password: None,
            recipient_email: None,
            min_price: 0,
            keywords: default_keywords(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scraper: ScraperConfig::default(),
            storage: StorageConfig::default(),
            notify: NotifyConfig::default(),
            logging: LoggingConfig::default(),
            sites: default_sites(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("MONITOR").separator("__"))
            // Plain secret names as exported by CI runners
            .set_override_option("notify.smtp_server", std::env::var("SMTP_SERVER").ok())?
            .set_override_option("notify.smtp_port", std::env::var("SMTP_PORT").ok())?
            .set_override_option("notify.sender_email", std::env::var("SENDER_EMAIL").ok())?
            .set_override_option("notify.sender_password", std::env::var("SENDER_PASSWORD").ok())?
            .set_override_option("notify.recipient_email", std::env::var("RECIPIENT_EMAIL").ok())?
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize()?;
        app_cfg.validate()?;
        Ok(app_cfg)
    }

    /// Every site must map onto a parser strategy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for site in &self.sites {
            if parsers::strategy_for(site.parser_key()).is_none() {
                return Err(ConfigError::UnknownParser {
                    site: site.key.clone(),
                    parser: site.parser_key().to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn site(&self, key: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.key == key)
    }
}

impl NotifyConfig {
    /// Mail settings for a real run; all three secrets must be present.
    pub fn mail_settings(&self) -> Result<MailSettings, ConfigError> {
        let present = |v: &Option<String>| v.as_deref().filter(|s| !s.trim().is_empty()).map(String::from);

        let sender = present(&self.sender_email);
        let password = present(&self.sender_password);
        let recipient = present(&self.recipient_email);

        match (sender, password, recipient) {
            (Some(sender_email), Some(sender_password), Some(recipient_email)) => Ok(MailSettings {
                smtp_server: self.smtp_server.clone(),
                smtp_port: self.smtp_port,
                sender_email,
                sender_password,
                recipient_email,
            }),
            (s, p, r) => {
                let mut missing = Vec::new();
                if s.is_none() {
                    missing.push("SENDER_EMAIL");
                }
                if p.is_none() {
                    missing.push("SENDER_PASSWORD");
                }
                if r.is_none() {
                    missing.push("RECIPIENT_EMAIL");
                }
                Err(ConfigError::MissingCredentials(missing))
            }
        }
    }
}
