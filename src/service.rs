//! Single owner of the working ledger
//!
//! One task holds the ledger and applies every change in arrival order:
//! local switches, imported codes and rows delivered by the remote store.
//! Each change is saved locally before the caller is answered. Pushing to
//! the remote happens afterwards on a single worker that always sends the
//! latest ledger, so the row ends at the last local state.

use crate::custody::{Schedule, SwitchLedger, Toggle};
use crate::persistence::PersistenceAdapter;
use crate::sync_code::{self, SyncCodeError};
use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

const COMMAND_CAPACITY: usize = 32;

/// Callback invoked with the ledger applied from a remote notification
pub type ChangeCallback = Arc<dyn Fn(&SwitchLedger) + Send + Sync>;

/// Where a replacement ledger came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Delivered by the remote store; saved locally, not pushed back
    Remote,
    /// Decoded from a sync code; saved locally and pushed
    Import,
}

/// Result of a `switch_day` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchOutcome {
    pub toggle: Toggle,
    pub ledger: SwitchLedger,
}

enum Command {
    Snapshot {
        reply: oneshot::Sender<SwitchLedger>,
    },
    SwitchDay {
        today: NaiveDate,
        reply: oneshot::Sender<SwitchOutcome>,
    },
    Version {
        reply: oneshot::Sender<u64>,
    },
    Replace {
        ledger: SwitchLedger,
        origin: Origin,
        /// Skip the replacement if the ledger changed since this version
        if_version: Option<u64>,
        notify: Option<ChangeCallback>,
        reply: oneshot::Sender<bool>,
    },
}

/// Cloneable handle to the ledger task
#[derive(Clone)]
pub struct LedgerHandle {
    commands: mpsc::Sender<Command>,
    adapter: Arc<PersistenceAdapter>,
}

/// Active remote subscription; dropping it stops delivery
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Stop delivery (same as dropping the subscription)
    pub fn unsubscribe(self) {}

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct LedgerTask {
    ledger: SwitchLedger,
    /// Bumped on every applied change
    version: u64,
    schedule: Schedule,
    adapter: Arc<PersistenceAdapter>,
    pushes: Option<watch::Sender<Option<SwitchLedger>>>,
}

impl LedgerTask {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Snapshot { reply } => {
                    let _ = reply.send(self.ledger.clone());
                }
                Command::Version { reply } => {
                    let _ = reply.send(self.version);
                }
                Command::SwitchDay { today, reply } => {
                    let toggle = self.ledger.toggle(&self.schedule, today);
                    self.version += 1;
                    tracing::info!(
                        date = %today,
                        ?toggle,
                        debt = self.ledger.debt,
                        "Switched day"
                    );
                    self.persist();
                    self.push();
                    let _ = reply.send(SwitchOutcome {
                        toggle,
                        ledger: self.ledger.clone(),
                    });
                }
                Command::Replace {
                    ledger,
                    origin,
                    if_version,
                    notify,
                    reply,
                } => {
                    if if_version.is_some_and(|v| v != self.version) {
                        tracing::info!(?origin, "Ledger changed meanwhile, skipping replacement");
                        let _ = reply.send(false);
                        continue;
                    }
                    tracing::info!(?origin, debt = ledger.debt, "Replacing ledger");
                    self.ledger = ledger;
                    self.version += 1;
                    self.persist();
                    if origin == Origin::Import {
                        self.push();
                    }
                    if let Some(notify) = notify {
                        notify(&self.ledger);
                    }
                    let _ = reply.send(true);
                }
            }
        }
        tracing::debug!("Ledger task stopped");
    }

    fn persist(&self) {
        if let Err(e) = self.adapter.save(&self.ledger) {
            tracing::warn!(error = %format!("{:#}", e), "Failed to save ledger locally");
        }
    }

    fn push(&self) {
        if let Some(pushes) = &self.pushes {
            pushes.send_replace(Some(self.ledger.clone()));
        }
    }
}

/// Push ledgers one at a time; intermediate states queued behind a slow push are skipped
async fn push_worker(
    adapter: Arc<PersistenceAdapter>,
    mut pending: watch::Receiver<Option<SwitchLedger>>,
) {
    while pending.changed().await.is_ok() {
        let ledger = pending.borrow_and_update().clone();
        if let Some(ledger) = ledger {
            adapter.push_remote(&ledger).await;
        }
    }
    tracing::debug!("Push worker stopped");
}

impl LedgerHandle {
    /// Load the local ledger and start the owning task
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(adapter: PersistenceAdapter, schedule: Schedule) -> Self {
        let adapter = Arc::new(adapter);
        let (commands, receiver) = mpsc::channel(COMMAND_CAPACITY);
        let pushes = adapter.has_remote().then(|| {
            let (pushes, pending) = watch::channel(None);
            tokio::spawn(push_worker(adapter.clone(), pending));
            pushes
        });
        let task = LedgerTask {
            ledger: adapter.load(),
            version: 0,
            schedule,
            adapter: adapter.clone(),
            pushes,
        };
        tokio::spawn(task.run(receiver));
        Self { commands, adapter }
    }

    pub fn adapter(&self) -> &PersistenceAdapter {
        &self.adapter
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| anyhow!("Ledger task is not running"))?;
        response
            .await
            .map_err(|_| anyhow!("Ledger task dropped the request"))
    }

    /// Current ledger
    pub async fn snapshot(&self) -> Result<SwitchLedger> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Toggle today's switch and persist
    pub async fn switch_day(&self, today: NaiveDate) -> Result<SwitchOutcome> {
        self.request(|reply| Command::SwitchDay { today, reply }).await
    }

    /// Replace the whole ledger
    pub async fn replace(&self, ledger: SwitchLedger, origin: Origin) -> Result<()> {
        self.request(|reply| Command::Replace {
            ledger,
            origin,
            if_version: None,
            notify: None,
            reply,
        })
        .await?;
        Ok(())
    }

    /// Decode `code` and replace the ledger with it
    ///
    /// # Returns
    /// `false` when the code is malformed; the ledger is left untouched
    pub async fn import_code(&self, code: &str) -> bool {
        match self.try_import_code(code).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected sync code");
                false
            }
        }
    }

    async fn try_import_code(&self, code: &str) -> Result<(), ImportError> {
        let ledger = sync_code::decode_code(code)?;
        self.replace(ledger, Origin::Import)
            .await
            .map_err(ImportError::Apply)
    }

    /// Replace the local ledger with the remote row, if it can be read
    ///
    /// The row is not applied when a local change landed while it was being
    /// fetched. Returns the ledger in effect afterwards.
    pub async fn fetch_remote(&self) -> Result<SwitchLedger> {
        let version = self.request(|reply| Command::Version { reply }).await?;
        if let Some(ledger) = self.adapter.try_fetch_remote().await {
            self.request(|reply| Command::Replace {
                ledger,
                origin: Origin::Remote,
                if_version: Some(version),
                notify: None,
                reply,
            })
            .await?;
        }
        self.snapshot().await
    }

    /// Apply remote row changes for this ledger as they arrive
    ///
    /// Every matching row goes through the ledger task (saved locally, not
    /// pushed back) and is then handed to `on_change`. Echoes of this
    /// device's own pushes are dropped. Returns `None` when no remote store is
    /// configured.
    pub fn subscribe(&self, on_change: ChangeCallback) -> Result<Option<Subscription>> {
        let Some(mut changes) = self.adapter.watch_remote()? else {
            return Ok(None);
        };
        let sync_id = self.adapter.sync_id().to_string();
        let adapter = self.adapter.clone();
        let commands = self.commands.clone();

        let task = tokio::spawn(async move {
            loop {
                let record = match changes.recv().await {
                    Ok(record) => record,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Remote notifications lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if record.id != sync_id || adapter.is_own_write(&record) {
                    continue;
                }

                let (reply, applied) = oneshot::channel();
                let command = Command::Replace {
                    ledger: record.to_ledger(),
                    origin: Origin::Remote,
                    if_version: None,
                    notify: Some(on_change.clone()),
                    reply,
                };
                if commands.send(command).await.is_err() || applied.await.is_err() {
                    break;
                }
            }
            tracing::debug!(sync_id = %sync_id, "Remote subscription ended");
        });

        Ok(Some(Subscription { task }))
    }
}

#[derive(Debug, thiserror::Error)]
enum ImportError {
    #[error(transparent)]
    Code(#[from] SyncCodeError),
    #[error("{0:#}")]
    Apply(anyhow::Error),
}
