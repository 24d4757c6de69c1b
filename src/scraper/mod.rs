pub mod cleaner;
pub mod http_client;
pub mod parsers;

use async_trait::async_trait;
use thiserror::Error;

pub use self::http_client::HttpFetcher;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

// ── Source trait ──────────────────────────────────────────────────────────────

/// Retrieves the raw listing document for one site.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}
