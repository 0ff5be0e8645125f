//! Switch day handler

use crate::CustodyServerHandler;
use crate::formatting;
use mcp_attr::{Result as McpResult, bail};

impl CustodyServerHandler {
    /// Toggles today's switch; the change is saved before the response is sent.
    pub async fn handle_switch_day(&self) -> McpResult<String> {
        let today = self.current_date();
        let outcome = match self.ledger.switch_day(today).await {
            Ok(outcome) => outcome,
            Err(e) => bail!("Failed to switch day: {}", e),
        };

        let status = self.schedule.day_status(&outcome.ledger, today);
        Ok(formatting::format_switch(outcome.toggle, &status))
    }
}
