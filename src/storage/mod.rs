use crate::models::Snapshot;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

// ── Snapshot store ────────────────────────────────────────────────────────────

/// The previous run's records, kept as one JSON file.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Previous snapshot; empty when no file exists yet.
    pub fn load(&self) -> Result<Snapshot> {
        if !self.path.exists() {
            info!("No snapshot at {:?} (first run)", self.path);
            return Ok(Snapshot::new());
        }
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {:?}", self.path))?;
        let snapshot: Snapshot = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse {:?}", self.path))?;
        Ok(snapshot)
    }

    /// Replace the stored snapshot with `current`, whatever it contains.
    pub fn save(&self, current: &Snapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(current).context("Failed to encode snapshot")?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).with_context(|| format!("Failed to write {:?}", tmp))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {:?}", self.path))?;

        info!(
            "Saved snapshot: {} products across {} sites",
            current.total(),
            current.site_count()
        );
        Ok(())
    }
}
