//! Custody Day MCP Server Library
//!
//! This library provides a Model Context Protocol (MCP) server that answers
//! "whose day is it?" for two co-parents sharing an alternating schedule.
//! Days can be switched on demand; every switch creates a small debt that is
//! paid back automatically on the owed parent's next days.
//!
//! # Architecture
//!
//! The library follows a 3-layer architecture:
//! - **MCP Layer**: `CustodyServerHandler` - Handles MCP protocol communication
//! - **Domain Layer**: `custody` module - Schedule, switch ledger and assignment rules
//! - **Persistence Layer**: `storage`, `remote` and `persistence` modules - Local TOML
//!   file plus optional shared row, owned by the ledger task in `service`
//!
//! # Example
//!
//! ```no_run
//! use custody_day::{CustodyServerHandler, Settings};
//! use anyhow::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let handler = CustodyServerHandler::new(Settings::new("custody.toml")?, None)?;
//!     // Use handler with MCP server...
//!     Ok(())
//! }
//! ```

pub mod calendar;
pub mod config;
pub mod custody;
mod formatting;
mod git_ops;
pub mod handlers;
pub mod logging;
pub mod persistence;
pub mod remote;
pub mod service;
pub mod storage;
pub mod sync_code;
pub mod validation;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use mcp_attr::Result as McpResult;
use mcp_attr::server::{McpServer, mcp_server};
use std::sync::{Arc, Mutex};
use url::Url;

// Re-export commonly used types
pub use config::Settings;
pub use custody::{Custodian, DayStatus, DebtInfo, Schedule, SwitchLedger};
pub use git_ops::GitChannel;
pub use persistence::PersistenceAdapter;
pub use remote::{GitRemote, MemoryRemote, RemoteRecord, RemoteStore};
pub use service::{LedgerHandle, Origin, Subscription};
pub use storage::Storage;

/// MCP Server handler for the custody schedule
///
/// Wraps the ledger task and exposes the user-facing actions as MCP tools.
/// All changes are persisted to a local TOML file and optionally pushed to a
/// shared remote row.
pub struct CustodyServerHandler {
    pub(crate) ledger: LedgerHandle,
    pub(crate) schedule: Schedule,
    pub(crate) base_url: Url,
    fixed_today: Option<NaiveDate>,
    subscription: Mutex<Option<Subscription>>,
}

impl CustodyServerHandler {
    /// Create a new handler and start its ledger task
    ///
    /// # Arguments
    /// * `settings` - Storage path, schedule, sync id and share link base
    /// * `remote` - Optional shared store for cross-device sync
    ///
    /// # Returns
    /// Result containing the handler, or an error outside a Tokio runtime
    pub fn new(settings: Settings, remote: Option<Arc<dyn RemoteStore>>) -> Result<Self> {
        tokio::runtime::Handle::try_current()
            .context("CustodyServerHandler must be created inside a Tokio runtime")?;

        let storage = Storage::new(&settings.storage_path);
        let adapter = PersistenceAdapter::new(storage, remote, &settings.sync_id);
        let ledger = LedgerHandle::spawn(adapter, settings.schedule);

        Ok(Self {
            ledger,
            schedule: settings.schedule,
            base_url: settings.base_url,
            fixed_today: None,
            subscription: Mutex::new(None),
        })
    }

    /// Pin "today" to a fixed date instead of the local clock
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    pub fn current_date(&self) -> NaiveDate {
        self.fixed_today.unwrap_or_else(calendar::today)
    }

    pub fn ledger(&self) -> &LedgerHandle {
        &self.ledger
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Replace the local ledger with the remote row, keeping it when the row cannot be read
    pub async fn pull_remote_state(&self) -> Result<SwitchLedger> {
        self.ledger.fetch_remote().await
    }

    /// Start applying remote row changes as they arrive
    ///
    /// # Returns
    /// `false` when no remote store is configured
    pub fn start_remote_subscription(&self) -> Result<bool> {
        let on_change: service::ChangeCallback = Arc::new(|ledger: &SwitchLedger| {
            tracing::info!(
                switches = ledger.switches.len(),
                debt = ledger.debt,
                "Applied remote ledger"
            );
        });
        let Some(subscription) = self.ledger.subscribe(on_change)? else {
            return Ok(false);
        };

        let mut slot = self
            .subscription
            .lock()
            .map_err(|_| anyhow::anyhow!("Subscription lock poisoned"))?;
        *slot = Some(subscription);
        Ok(true)
    }

    /// Import the sync code carried by a share link
    ///
    /// # Returns
    /// The link without its `sync` parameter
    pub async fn open_share_link(&self, link: &str) -> Result<Url> {
        let code = sync_code::code_from_url(link)?;
        if !self.ledger.import_code(&code).await {
            anyhow::bail!("Share link carries an invalid sync code");
        }
        let url = Url::parse(link)?;
        Ok(sync_code::strip_sync_param(&url))
    }
}

/// Shared custody calendar: tells which parent has the child today.
///
/// Days alternate strictly between Mamãe and Papai. A parent can switch
/// today's custody with `switch_day`; the parent who gave up the day is owed
/// it back (at most 2 days). Owed days are repaid automatically on the next
/// day(s) that parent would have anyway, after the most recent switch.
///
/// Dates use YYYY-MM-DD.
#[mcp_server]
impl McpServer for CustodyServerHandler {
    /// **Today**: Whose day is it today, whether it is a payback day, and who is owed days.
    #[tool]
    async fn today(&self) -> McpResult<String> {
        self.handle_today().await
    }

    /// **Assignment**: Whose day a given date is, with switches and payback applied.
    #[tool]
    async fn assignment(
        &self,
        /// Date: YYYY-MM-DD
        date: String,
    ) -> McpResult<String> {
        self.handle_assignment(&date).await
    }

    /// **Upcoming**: Preview the schedule for the next days starting today.
    #[tool]
    async fn upcoming(
        &self,
        /// Number of days, 1-31 (default 7)
        days: Option<u32>,
    ) -> McpResult<String> {
        self.handle_upcoming(days).await
    }

    /// **Switch day**: Give today to the other parent. Calling it again on the same day undoes the switch.
    #[tool]
    async fn switch_day(&self) -> McpResult<String> {
        self.handle_switch_day().await
    }

    /// **Payback**: Whether today is handed back to the parent who is owed days.
    #[tool]
    async fn is_payback_day(&self) -> McpResult<String> {
        self.handle_is_payback_day().await
    }

    /// **Debt**: Which parent is owed days and how many (0-2).
    #[tool]
    async fn debt_info(&self) -> McpResult<String> {
        self.handle_debt_info().await
    }

    /// **Export**: Sync code carrying the full schedule state, for another device.
    #[tool]
    async fn export_code(&self) -> McpResult<String> {
        self.handle_export_code().await
    }

    /// **Import**: Replace the schedule state with a sync code from another device.
    #[tool]
    async fn import_code(
        &self,
        /// Sync code produced by export_code
        code: String,
    ) -> McpResult<String> {
        self.handle_import_code(&code).await
    }

    /// **Share link**: URL that imports the current state when opened.
    #[tool]
    async fn sync_url(&self) -> McpResult<String> {
        self.handle_sync_url().await
    }

    /// **Refresh**: Reload the schedule state from the shared remote store.
    #[tool]
    async fn pull_remote(&self) -> McpResult<String> {
        self.handle_pull_remote().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn get_test_handler(today: NaiveDate) -> (CustodyServerHandler, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::new(temp_dir.path().join("custody.toml")).unwrap();
        let handler = CustodyServerHandler::new(settings, None)
            .unwrap()
            .with_today(today);
        (handler, temp_dir)
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::new(temp_dir.path().join("custody.toml")).unwrap();
        assert!(CustodyServerHandler::new(settings, None).is_err());
    }

    #[tokio::test]
    async fn test_today_follows_base_schedule() {
        let (handler, _temp_dir) = get_test_handler(date(2026, 2, 3));
        let text = handler.handle_today().await.unwrap();
        assert!(text.starts_with("2026-02-03: Papai's day"));
        assert!(text.contains("Nobody is owed days"));
    }

    #[tokio::test]
    async fn test_today_tool_uses_current_date() {
        let (handler, _temp_dir) = get_test_handler(date(2026, 2, 4));
        assert_eq!(handler.current_date(), date(2026, 2, 4));

        let text = handler.today().await.unwrap();
        assert_eq!(text, handler.handle_today().await.unwrap());
        assert!(text.starts_with("2026-02-04: Mamãe's day"));
    }

    #[tokio::test]
    async fn test_switch_day_and_undo() {
        let (handler, temp_dir) = get_test_handler(date(2026, 2, 3));

        let text = handler.handle_switch_day().await.unwrap();
        assert!(text.starts_with("Day switched"));
        assert!(text.contains("Mamãe's day"));
        assert!(text.contains("Papai is owed 1 day"));

        // Saved before the response
        let stored = Storage::new(temp_dir.path().join("custody.toml")).load();
        assert_eq!(stored.debt, 1);
        assert!(stored.is_switched(date(2026, 2, 3)));

        let text = handler.handle_switch_day().await.unwrap();
        assert!(text.starts_with("Switch undone"));
        assert!(text.contains("Papai's day"));
        assert_eq!(handler.ledger().snapshot().await.unwrap(), SwitchLedger::new());
    }

    #[tokio::test]
    async fn test_payback_day_reported() {
        let (handler, _temp_dir) = get_test_handler(date(2026, 2, 3));
        handler.handle_switch_day().await.unwrap();

        let later = CustodyServerHandler {
            fixed_today: Some(date(2026, 2, 5)),
            ..handler
        };
        let text = later.handle_is_payback_day().await.unwrap();
        assert!(text.starts_with("Yes"));
        assert!(text.contains("starts 2026-02-05"));

        let today = later.handle_today().await.unwrap();
        assert!(today.contains("Papai's day"));
        assert!(today.contains("Payback day"));
    }

    #[tokio::test]
    async fn test_assignment_rejects_bad_date() {
        let (handler, _temp_dir) = get_test_handler(date(2026, 2, 3));
        assert!(handler.handle_assignment("tomorrow").await.is_err());
        let text = handler.handle_assignment("2026-02-04").await.unwrap();
        assert!(text.contains("Mamãe's day"));
    }

    #[tokio::test]
    async fn test_upcoming() {
        let (handler, _temp_dir) = get_test_handler(date(2026, 2, 2));
        let text = handler.handle_upcoming(Some(3)).await.unwrap();
        assert!(text.contains("- 2026-02-02 Mamãe"));
        assert!(text.contains("- 2026-02-03 Papai"));
        assert!(text.contains("- 2026-02-04 Mamãe"));
        assert!(!text.contains("2026-02-05"));
        assert!(handler.handle_upcoming(Some(0)).await.is_err());
    }

    #[tokio::test]
    async fn test_export_import_between_handlers() {
        let (source, _source_dir) = get_test_handler(date(2026, 2, 4));
        source.handle_switch_day().await.unwrap();
        let code = source.handle_export_code().await.unwrap();

        let (target, _target_dir) = get_test_handler(date(2026, 2, 4));
        let text = target.handle_import_code(&code).await.unwrap();
        assert!(text.starts_with("Sync code imported"));
        assert_eq!(
            target.ledger().snapshot().await.unwrap(),
            source.ledger().snapshot().await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_import_invalid_code_keeps_state() {
        let (handler, _temp_dir) = get_test_handler(date(2026, 2, 3));
        handler.handle_switch_day().await.unwrap();
        let before = handler.ledger().snapshot().await.unwrap();

        assert!(handler.handle_import_code("%%%").await.is_err());
        assert!(handler.handle_import_code("  ").await.is_err());
        assert_eq!(handler.ledger().snapshot().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_sync_url_and_open_share_link() {
        let (source, _source_dir) = get_test_handler(date(2026, 2, 3));
        source.handle_switch_day().await.unwrap();
        let link = source.handle_sync_url().await.unwrap();
        assert!(link.starts_with("http://localhost:5173/?sync="));

        let (target, _target_dir) = get_test_handler(date(2026, 2, 3));
        let visible = target.open_share_link(&link).await.unwrap();
        assert_eq!(visible.as_str(), "http://localhost:5173/");
        assert_eq!(target.handle_debt_info().await.unwrap(), "Papai is owed 1 day");
    }

    #[tokio::test]
    async fn test_pull_remote_without_remote() {
        let (handler, _temp_dir) = get_test_handler(date(2026, 2, 3));
        assert!(handler.handle_pull_remote().await.is_err());
        assert!(!handler.start_remote_subscription().unwrap());
    }
}
