//! Runtime settings resolved from the command line

use crate::custody::Schedule;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use url::Url;

/// Row key shared by all devices of one household
pub const DEFAULT_SYNC_ID: &str = "household";

/// Address that share links point at
pub const DEFAULT_BASE_URL: &str = "http://localhost:5173/";

#[derive(Debug, Clone)]
pub struct Settings {
    /// Local ledger file (TOML)
    pub storage_path: PathBuf,
    pub schedule: Schedule,
    pub sync_id: String,
    pub base_url: Url,
}

impl Settings {
    pub fn new(storage_path: impl AsRef<Path>) -> Result<Self> {
        let base_url = Url::parse(DEFAULT_BASE_URL).context("Invalid default base URL")?;
        Ok(Self {
            storage_path: storage_path.as_ref().to_path_buf(),
            schedule: Schedule::default(),
            sync_id: DEFAULT_SYNC_ID.to_string(),
            base_url,
        })
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_sync_id(mut self, sync_id: &str) -> Self {
        self.sync_id = sync_id.trim().to_string();
        self
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::{Custodian, DEFAULT_EPOCH_DATE};

    #[test]
    fn test_defaults() {
        let settings = Settings::new("ledger.toml").unwrap();
        assert_eq!(settings.storage_path, PathBuf::from("ledger.toml"));
        assert_eq!(settings.sync_id, DEFAULT_SYNC_ID);
        assert_eq!(settings.schedule.epoch_date, DEFAULT_EPOCH_DATE);
        assert_eq!(settings.schedule.epoch_custodian, Custodian::Mamae);
        assert_eq!(settings.base_url.as_str(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_builders() {
        let base = Url::parse("https://kids.example.org/").unwrap();
        let settings = Settings::new("ledger.toml")
            .unwrap()
            .with_sync_id("  family  ")
            .with_base_url(base.clone())
            .with_schedule(Schedule::new(DEFAULT_EPOCH_DATE, Custodian::Papai));
        assert_eq!(settings.sync_id, "family");
        assert_eq!(settings.base_url, base);
        assert_eq!(settings.schedule.epoch_custodian, Custodian::Papai);
    }
}
