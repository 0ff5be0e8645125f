//! Remote synchronization stores
//!
//! A remote store keeps one row per household, keyed by a sync id, and
//! notifies watchers whenever a row changes. Rows are replaced whole; the
//! last writer wins.

use crate::custody::SwitchLedger;
use crate::git_ops::GitChannel;
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;

/// Capacity of the change notification channel
const NOTIFY_CAPACITY: usize = 16;

/// Default polling interval for `GitRemote` change detection
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// One synchronized ledger row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: String,
    #[serde(default)]
    pub switches: Vec<NaiveDate>,
    #[serde(default)]
    pub debt: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub absorbed: Vec<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

impl RemoteRecord {
    /// Build a row stamped with the current time
    pub fn from_ledger(id: &str, ledger: &SwitchLedger) -> Self {
        Self {
            id: id.to_string(),
            switches: ledger.switches.iter().copied().collect(),
            debt: ledger.debt,
            absorbed: ledger.absorbed.iter().copied().collect(),
            updated_at: Utc::now(),
        }
    }

    pub fn to_ledger(&self) -> SwitchLedger {
        SwitchLedger {
            switches: self.switches.iter().copied().collect(),
            debt: self.debt,
            absorbed: self.absorbed.iter().copied().collect::<BTreeSet<_>>(),
        }
        .normalized()
    }
}

/// Backend holding synchronized ledger rows
///
/// Calls may block on I/O; async callers run them on the blocking pool.
pub trait RemoteStore: Send + Sync {
    /// Read the row for `id`, `None` if it was never written
    fn fetch(&self, id: &str) -> Result<Option<RemoteRecord>>;

    /// Insert or replace the row keyed by `record.id`
    fn upsert(&self, record: &RemoteRecord) -> Result<()>;

    /// Receive every row change seen by this store, for all ids
    fn watch(&self) -> Result<broadcast::Receiver<RemoteRecord>>;
}

/// In-process row table
///
/// Every `upsert` is broadcast to watchers. Can be taken offline to make
/// every call fail, which is how backend outages are exercised.
pub struct MemoryRemote {
    rows: Mutex<HashMap<String, RemoteRecord>>,
    notify: broadcast::Sender<RemoteRecord>,
    offline: AtomicBool,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            rows: Mutex::new(HashMap::new()),
            notify,
            offline: AtomicBool::new(false),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(anyhow!("Remote store is offline"));
        }
        Ok(())
    }
}

impl RemoteStore for MemoryRemote {
    fn fetch(&self, id: &str) -> Result<Option<RemoteRecord>> {
        self.ensure_online()?;
        let rows = self
            .rows
            .lock()
            .map_err(|_| anyhow!("Remote row table lock poisoned"))?;
        Ok(rows.get(id).cloned())
    }

    fn upsert(&self, record: &RemoteRecord) -> Result<()> {
        self.ensure_online()?;
        self.rows
            .lock()
            .map_err(|_| anyhow!("Remote row table lock poisoned"))?
            .insert(record.id.clone(), record.clone());
        // No watchers is fine
        let _ = self.notify.send(record.clone());
        Ok(())
    }

    fn watch(&self) -> Result<broadcast::Receiver<RemoteRecord>> {
        self.ensure_online()?;
        Ok(self.notify.subscribe())
    }
}

/// Row stored as a TOML file inside a git working copy
///
/// `fetch` pulls before reading; `upsert` writes, commits and pushes. Other
/// devices' writes are detected by polling once somebody watches.
pub struct GitRemote {
    inner: Arc<GitRow>,
}

struct GitRow {
    file_path: PathBuf,
    channel: GitChannel,
    notify: broadcast::Sender<RemoteRecord>,
    poll_interval: Duration,
    polling: AtomicBool,
    last_seen: Mutex<Option<DateTime<Utc>>>,
    /// Held for a whole pull/read or pull/write/commit/push sequence
    working_copy: Mutex<()>,
}

impl GitRemote {
    pub fn new(file_path: impl AsRef<Path>) -> Self {
        Self::with_poll_interval(file_path, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(file_path: impl AsRef<Path>, poll_interval: Duration) -> Self {
        let file_path = file_path.as_ref().to_path_buf();
        let (notify, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            inner: Arc::new(GitRow {
                channel: GitChannel::new(&file_path),
                file_path,
                notify,
                poll_interval,
                polling: AtomicBool::new(false),
                last_seen: Mutex::new(None),
                working_copy: Mutex::new(()),
            }),
        }
    }

    pub fn is_git_managed(&self) -> bool {
        self.inner.channel.is_git_managed()
    }

    /// Start the polling task the first time someone watches
    fn start_polling(&self) -> Result<()> {
        if self.inner.polling.load(Ordering::SeqCst) {
            return Ok(());
        }
        let runtime = tokio::runtime::Handle::try_current()
            .context("Watching a git remote requires a Tokio runtime")?;
        if self.inner.polling.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let weak = Arc::downgrade(&self.inner);
        let interval = self.inner.poll_interval;
        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(row) = weak.upgrade() else {
                    break;
                };
                if row.notify.receiver_count() == 0 {
                    continue;
                }
                if tokio::task::spawn_blocking(move || row.poll_once())
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });
        Ok(())
    }
}

impl GitRow {
    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.working_copy
            .lock()
            .map_err(|_| anyhow!("Git working copy lock poisoned"))
    }

    fn read(&self) -> Result<Option<RemoteRecord>> {
        if !self.file_path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.file_path)
            .with_context(|| format!("Failed to read {}", self.file_path.display()))?;
        let record: RemoteRecord = toml::from_str(&content).context("Malformed remote row")?;
        Ok(Some(record))
    }

    /// Record `updated_at` as seen; `true` if it differs from the previous one
    fn remember(&self, record: &RemoteRecord) -> bool {
        match self.last_seen.lock() {
            Ok(mut last_seen) => {
                let changed = *last_seen != Some(record.updated_at);
                *last_seen = Some(record.updated_at);
                changed
            }
            Err(_) => false,
        }
    }

    /// Pull once and broadcast the row if it changed since last seen
    fn poll_once(&self) {
        let _guard = match self.lock() {
            Ok(guard) => guard,
            Err(e) => {
                tracing::warn!(error = %e, "Git remote poll skipped");
                return;
            }
        };
        if let Err(e) = self.channel.pull() {
            tracing::warn!(error = %format!("{:#}", e), "Git remote poll failed");
            return;
        }
        match self.read() {
            Ok(Some(record)) => {
                if self.remember(&record) {
                    let _ = self.notify.send(record);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %format!("{:#}", e), "Git remote row unreadable"),
        }
    }
}

impl RemoteStore for GitRemote {
    fn fetch(&self, id: &str) -> Result<Option<RemoteRecord>> {
        let row = &self.inner;
        let _guard = row.lock()?;
        row.channel.pull().context("Failed to pull changes")?;
        let record = row.read()?;
        if let Some(record) = &record {
            row.remember(record);
        }
        Ok(record.filter(|r| r.id == id))
    }

    fn upsert(&self, record: &RemoteRecord) -> Result<()> {
        let row = &self.inner;
        let _guard = row.lock()?;
        // Another device may have pushed since the last poll
        if let Err(e) = row.channel.pull() {
            tracing::warn!(error = %format!("{:#}", e), "Pull before upsert failed");
        }

        let content = toml::to_string_pretty(record)?;
        if let Some(dir) = row.file_path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)?;
        }
        fs::write(&row.file_path, content)
            .with_context(|| format!("Failed to write {}", row.file_path.display()))?;
        row.remember(record);

        row.channel
            .commit(&row.file_path, &format!("Sync ledger {}", record.id))
            .context("Failed to commit changes")?;
        row.channel.push().context("Failed to push changes")?;
        Ok(())
    }

    fn watch(&self) -> Result<broadcast::Receiver<RemoteRecord>> {
        let receiver = self.inner.notify.subscribe();
        self.start_polling()?;
        Ok(receiver)
    }
}
