//! Device-to-device transfer handlers: sync codes, share links, remote refresh

use crate::CustodyServerHandler;
use crate::formatting;
use crate::sync_code;
use crate::validation;
use mcp_attr::{Result as McpResult, bail};

impl CustodyServerHandler {
    pub async fn handle_export_code(&self) -> McpResult<String> {
        let ledger = self.current_ledger().await?;
        match sync_code::export_code(&ledger) {
            Ok(code) => Ok(code),
            Err(e) => bail!("Failed to export sync code: {}", e),
        }
    }

    /// Replaces the ledger with a decoded code; a malformed code leaves it untouched.
    pub async fn handle_import_code(&self, code: &str) -> McpResult<String> {
        let code = validation::require_code(code)?;
        if !self.ledger.import_code(code).await {
            bail!("Invalid sync code. The schedule was not changed.");
        }

        let ledger = self.current_ledger().await?;
        let status = self.schedule.day_status(&ledger, self.current_date());
        Ok(format!(
            "Sync code imported\n{}",
            formatting::format_day_status(&status)
        ))
    }

    pub async fn handle_sync_url(&self) -> McpResult<String> {
        let ledger = self.current_ledger().await?;
        match sync_code::sync_url(&self.base_url, &ledger) {
            Ok(url) => Ok(url.to_string()),
            Err(e) => bail!("Failed to build share link: {}", e),
        }
    }

    /// Reloads the ledger from the remote store (falls back to the local file)
    pub async fn handle_pull_remote(&self) -> McpResult<String> {
        if !self.ledger.adapter().has_remote() {
            bail!("No remote store configured. Start the server with --remote.");
        }
        let ledger = match self.ledger.fetch_remote().await {
            Ok(ledger) => ledger,
            Err(e) => bail!("Failed to refresh from remote: {}", e),
        };

        let status = self.schedule.day_status(&ledger, self.current_date());
        Ok(format!(
            "Ledger refreshed\n{}",
            formatting::format_day_status(&status)
        ))
    }
}
