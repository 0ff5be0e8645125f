//! Common test utilities for integration tests

#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use custody_day::{
    CustodyServerHandler, LedgerHandle, MemoryRemote, PersistenceAdapter, RemoteRecord,
    RemoteStore, Schedule, Settings, Storage,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;

/// In-memory remote with a slow first upsert and slow fetch responses
pub struct SluggishRemote {
    pub rows: MemoryRemote,
    first_upsert_delay: Duration,
    fetch_delay: Duration,
    upserted: AtomicBool,
}

impl SluggishRemote {
    pub fn new(first_upsert_delay: Duration, fetch_delay: Duration) -> Self {
        Self {
            rows: MemoryRemote::new(),
            first_upsert_delay,
            fetch_delay,
            upserted: AtomicBool::new(false),
        }
    }
}

impl RemoteStore for SluggishRemote {
    /// Reads the row first, then waits, like a response still in flight
    fn fetch(&self, id: &str) -> Result<Option<RemoteRecord>> {
        let row = self.rows.fetch(id);
        std::thread::sleep(self.fetch_delay);
        row
    }

    fn upsert(&self, record: &RemoteRecord) -> Result<()> {
        if !self.upserted.swap(true, Ordering::SeqCst) {
            std::thread::sleep(self.first_upsert_delay);
        }
        self.rows.upsert(record)
    }

    fn watch(&self) -> Result<broadcast::Receiver<RemoteRecord>> {
        self.rows.watch()
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn ledger_path(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("custody.toml")
}

/// Ledger task backed by a temporary file and an optional shared remote
pub fn spawn_device(remote: Option<Arc<dyn RemoteStore>>) -> (LedgerHandle, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let storage = Storage::new(ledger_path(&temp_dir));
    let adapter = PersistenceAdapter::new(storage, remote, "household");
    (LedgerHandle::spawn(adapter, Schedule::default()), temp_dir)
}

/// Create a test handler with temporary storage and a fixed "today"
pub fn get_test_handler(
    today: NaiveDate,
    remote: Option<Arc<dyn RemoteStore>>,
) -> (CustodyServerHandler, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let settings = Settings::new(ledger_path(&temp_dir)).unwrap();
    let handler = CustodyServerHandler::new(settings, remote)
        .unwrap()
        .with_today(today);
    (handler, temp_dir)
}

/// Poll `check` until it returns true or two seconds pass
pub async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
