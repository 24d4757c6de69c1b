use chrono::Local;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// A simple wall-clock timer for logging elapsed time.
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        info!("⏱  Starting: {}", label);
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!(
            "⏱  Finished: {} (took {:.2?})",
            self.label,
            self.elapsed()
        );
    }
}

/// Format an integer with thousands separators.
/// 35000 → "35,000"
pub fn fmt_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

/// Cut a display string to `max` chars, marking the cut with "…".
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push('…');
    out
}

/// Write the failure of a run to a small text file next to the process,
/// so schedulers that only keep artifacts still see why the run aborted.
pub fn write_error_artifact(path: &Path, err: &anyhow::Error) {
    let body = format!(
        "time: {}\nerror: {}\n\ndetail:\n{:?}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        err,
        err,
    );
    if let Err(e) = std::fs::write(path, body) {
        warn!("Could not write error artifact {:?}: {}", path, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_number() {
        assert_eq!(fmt_number(1_234_567), "1,234,567");
        assert_eq!(fmt_number(0), "0");
        assert_eq!(fmt_number(35_000), "35,000");
        assert_eq!(fmt_number(999), "999");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("YAMAHA", 10), "YAMAHA");
        assert_eq!(truncate("ホセ・ラミレス 1a", 3), "ホセ・…");
    }

    #[test]
    fn test_error_artifact_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error_log.txt");
        let err = anyhow::anyhow!("missing secret").context("configuration");
        write_error_artifact(&path, &err);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("configuration"));
        assert!(text.contains("missing secret"));
    }
}
