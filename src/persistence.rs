//! Local and remote persistence for the switch ledger
//!
//! The local file is authoritative. The remote store is optional and best
//! effort: failures are logged, never retried, and never block local use for
//! longer than `REMOTE_TIMEOUT`.

use crate::custody::SwitchLedger;
use crate::remote::{RemoteRecord, RemoteStore};
use crate::storage::Storage;
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// Upper bound on a single remote call
pub const REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// How many of this device's own row timestamps are remembered
const OWN_WRITE_MEMORY: usize = 32;

pub struct PersistenceAdapter {
    storage: Storage,
    remote: Option<Arc<dyn RemoteStore>>,
    sync_id: String,
    own_writes: Mutex<VecDeque<DateTime<Utc>>>,
}

impl PersistenceAdapter {
    pub fn new(storage: Storage, remote: Option<Arc<dyn RemoteStore>>, sync_id: &str) -> Self {
        Self {
            storage,
            remote,
            sync_id: sync_id.to_string(),
            own_writes: Mutex::new(VecDeque::with_capacity(OWN_WRITE_MEMORY)),
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn sync_id(&self) -> &str {
        &self.sync_id
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn load(&self) -> SwitchLedger {
        self.storage.load()
    }

    pub fn save(&self, ledger: &SwitchLedger) -> Result<()> {
        self.storage.save(ledger)
    }

    /// Read the shared row, falling back to the local ledger on any failure
    pub async fn fetch_remote(&self) -> SwitchLedger {
        match self.try_fetch_remote().await {
            Some(ledger) => ledger,
            None => self.load(),
        }
    }

    /// Read the shared row
    ///
    /// # Returns
    /// `None` when there is no remote, no row yet, or the call failed (logged)
    pub async fn try_fetch_remote(&self) -> Option<SwitchLedger> {
        let remote = self.remote.clone()?;

        let id = self.sync_id.clone();
        match run_blocking(move || remote.fetch(&id)).await {
            Ok(Some(record)) => Some(record.to_ledger()),
            Ok(None) => {
                tracing::info!(sync_id = %self.sync_id, "No remote row yet, keeping local ledger");
                None
            }
            Err(e) => {
                tracing::warn!(
                    sync_id = %self.sync_id,
                    error = %format!("{:#}", e),
                    "Failed to fetch remote ledger, keeping local ledger"
                );
                None
            }
        }
    }

    /// Upsert the shared row
    ///
    /// # Returns
    /// `true` when the row was written; failures are logged only
    pub async fn push_remote(&self, ledger: &SwitchLedger) -> bool {
        let Some(remote) = self.remote.clone() else {
            return false;
        };

        let record = RemoteRecord::from_ledger(&self.sync_id, ledger);
        // Watchers may see the row before upsert returns
        self.remember_own_write(record.updated_at);
        match run_blocking(move || remote.upsert(&record)).await {
            Ok(()) => {
                tracing::debug!(sync_id = %self.sync_id, "Pushed ledger to remote");
                true
            }
            Err(e) => {
                tracing::warn!(
                    sync_id = %self.sync_id,
                    error = %format!("{:#}", e),
                    "Failed to push ledger to remote"
                );
                false
            }
        }
    }

    /// Whether `record` was written by this adapter
    pub fn is_own_write(&self, record: &RemoteRecord) -> bool {
        record.id == self.sync_id
            && self
                .own_writes
                .lock()
                .is_ok_and(|writes| writes.contains(&record.updated_at))
    }

    fn remember_own_write(&self, updated_at: DateTime<Utc>) {
        if let Ok(mut writes) = self.own_writes.lock() {
            if writes.len() == OWN_WRITE_MEMORY {
                writes.pop_front();
            }
            writes.push_back(updated_at);
        }
    }

    /// Change notifications from the remote, if one is configured
    pub fn watch_remote(&self) -> Result<Option<broadcast::Receiver<RemoteRecord>>> {
        match &self.remote {
            Some(remote) => remote.watch().map(Some),
            None => Ok(None),
        }
    }
}

/// Run a blocking remote call on the blocking pool under `REMOTE_TIMEOUT`
async fn run_blocking<T, F>(call: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(call);
    match tokio::time::timeout(REMOTE_TIMEOUT, task).await {
        Ok(joined) => joined.context("Remote call panicked")?,
        Err(_) => Err(anyhow!(
            "Remote call timed out after {}s",
            REMOTE_TIMEOUT.as_secs()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn sample_ledger() -> SwitchLedger {
        let mut ledger = SwitchLedger::new();
        ledger
            .switches
            .insert(NaiveDate::from_ymd_opt(2026, 2, 4).unwrap());
        ledger.debt = -1;
        ledger
    }

    fn adapter(temp_dir: &TempDir, remote: Option<Arc<MemoryRemote>>) -> PersistenceAdapter {
        let storage = Storage::new(temp_dir.path().join("ledger.toml"));
        let remote = remote.map(|r| r as Arc<dyn RemoteStore>);
        PersistenceAdapter::new(storage, remote, "household")
    }

    #[tokio::test]
    async fn test_fetch_without_remote_reads_local() {
        let temp_dir = TempDir::new().unwrap();
        let adapter = adapter(&temp_dir, None);
        adapter.save(&sample_ledger()).unwrap();

        assert_eq!(adapter.fetch_remote().await, sample_ledger());
        assert!(adapter.try_fetch_remote().await.is_none());
        assert!(!adapter.push_remote(&sample_ledger()).await);
        assert!(adapter.watch_remote().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_push_then_fetch() {
        let temp_dir = TempDir::new().unwrap();
        let remote = Arc::new(MemoryRemote::new());
        let adapter = adapter(&temp_dir, Some(remote.clone()));

        assert!(adapter.push_remote(&sample_ledger()).await);
        assert_eq!(adapter.fetch_remote().await, sample_ledger());
        // Fetching does not touch the local file
        assert_eq!(adapter.load(), SwitchLedger::new());
    }

    #[tokio::test]
    async fn test_remote_failure_falls_back_to_local() {
        let temp_dir = TempDir::new().unwrap();
        let remote = Arc::new(MemoryRemote::new());
        let adapter = adapter(&temp_dir, Some(remote.clone()));
        adapter.save(&sample_ledger()).unwrap();

        remote.set_offline(true);
        assert_eq!(adapter.fetch_remote().await, sample_ledger());
        assert!(adapter.try_fetch_remote().await.is_none());
        assert!(!adapter.push_remote(&SwitchLedger::new()).await);
    }

    #[tokio::test]
    async fn test_own_writes_are_recognized() {
        let temp_dir = TempDir::new().unwrap();
        let remote = Arc::new(MemoryRemote::new());
        let adapter = adapter(&temp_dir, Some(remote.clone()));
        let mut changes = adapter.watch_remote().unwrap().unwrap();

        assert!(adapter.push_remote(&sample_ledger()).await);
        let echo = changes.recv().await.unwrap();
        assert!(adapter.is_own_write(&echo));

        // 別の端末が書いた行は自分の書き込みではない
        let foreign = RemoteRecord::from_ledger("household", &SwitchLedger::new());
        assert!(!adapter.is_own_write(&foreign));
    }
}
