use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use url::Url;

use crate::config::SiteConfig;

/// Price placeholder carried by records whose listing showed no price.
/// Never survives validation.
pub const PRICE_UNKNOWN: &str = "価格確認中";

// ── Candidate ─────────────────────────────────────────────────────────────────

/// Raw parser output: a name, maybe a price, maybe a (relative) href.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub price: Option<String>,
    pub href: Option<String>,
}

impl Candidate {
    pub fn new(name: impl Into<String>, price: Option<String>, href: Option<String>) -> Self {
        Self {
            name: name.into(),
            price,
            href,
        }
    }
}

// ── Product ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: String,
    pub link: String,
    pub store: String,
    pub store_name: String,
    pub found_date: NaiveDateTime,
}

impl Product {
    /// Resolve a candidate against its site. Fails only when the href
    /// cannot be joined onto the site's base URL.
    pub fn from_candidate(
        candidate: Candidate,
        site: &SiteConfig,
        found_date: NaiveDateTime,
    ) -> Result<Self, url::ParseError> {
        let link = match candidate.href.as_deref().map(str::trim) {
            Some(href) if !href.is_empty() => site.base_url.join(href)?,
            _ => site.base_url.clone(),
        };
        let name = candidate.name.trim().to_string();
        let id = product_id(&site.key, &name, &link, site.id_param.as_deref());

        Ok(Self {
            id,
            name,
            price: candidate.price.unwrap_or_else(|| PRICE_UNKNOWN.to_string()),
            link: link.to_string(),
            store: site.key.clone(),
            store_name: site.name.clone(),
            found_date,
        })
    }
}

/// Stable across runs and machines: either the site's own product parameter
/// or a truncated SHA-256 of name + link.
pub fn product_id(store: &str, name: &str, link: &Url, id_param: Option<&str>) -> String {
    if let Some(param) = id_param {
        let value = link
            .query_pairs()
            .find(|(k, v)| k == param && !v.is_empty())
            .map(|(_, v)| v.into_owned());
        if let Some(value) = value {
            return format!("{}_{}", store, value);
        }
    }

    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(link.as_str().as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}_{}", store, &digest[..16])
}

// ── Snapshot ──────────────────────────────────────────────────────────────────

/// Records keyed by site key. Used both for the full current/persisted
/// state and for the per-run set of new records.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Snapshot {
    sites: BTreeMap<String, Vec<Product>>,
}

/// Records present now but not in the persisted snapshot.
pub type NewProducts = Snapshot;

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a site's records wholesale.
    pub fn insert(&mut self, site: impl Into<String>, products: Vec<Product>) {
        self.sites.insert(site.into(), products);
    }

    pub fn get(&self, site: &str) -> Option<&[Product]> {
        self.sites.get(site).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Product])> {
        self.sites.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    /// Total records across sites.
    pub fn total(&self) -> usize {
        self.sites.values().map(Vec::len).sum()
    }

    /// No site keys at all (an empty list under a key still counts as a key).
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

impl FromIterator<(String, Vec<Product>)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Product>)>>(iter: I) -> Self {
        Self {
            sites: iter.into_iter().collect(),
        }
    }
}
