//! Read-only schedule handlers

use crate::CustodyServerHandler;
use crate::custody::SwitchLedger;
use crate::formatting;
use crate::validation;
use mcp_attr::{Result as McpResult, bail};

impl CustodyServerHandler {
    pub(crate) async fn current_ledger(&self) -> McpResult<SwitchLedger> {
        match self.ledger.snapshot().await {
            Ok(ledger) => Ok(ledger),
            Err(e) => bail!("Failed to read ledger: {}", e),
        }
    }

    /// Today's custodian, payback badge and debt hint
    pub async fn handle_today(&self) -> McpResult<String> {
        let ledger = self.current_ledger().await?;
        let status = self.schedule.day_status(&ledger, self.current_date());
        Ok(formatting::format_day_status(&status))
    }

    /// Custodian for an arbitrary date
    pub async fn handle_assignment(&self, date: &str) -> McpResult<String> {
        let date = validation::parse_date_param(date)?;
        let ledger = self.current_ledger().await?;
        let status = self.schedule.day_status(&ledger, date);
        Ok(formatting::format_day_status(&status))
    }

    /// Schedule preview starting today
    pub async fn handle_upcoming(&self, days: Option<u32>) -> McpResult<String> {
        let days = validation::parse_days_param(days)?;
        let ledger = self.current_ledger().await?;
        let statuses = self.schedule.upcoming(&ledger, self.current_date(), days);
        Ok(formatting::format_upcoming(&statuses))
    }

    pub async fn handle_is_payback_day(&self) -> McpResult<String> {
        let ledger = self.current_ledger().await?;
        let today = self.current_date();
        let window = self.schedule.payback_window(&ledger);
        if self.schedule.is_payback_day(&ledger, today) {
            Ok(format!(
                "Yes, today is a payback day\n{}",
                formatting::format_payback_window(window.as_ref())
            ))
        } else {
            Ok(format!(
                "No, today is not a payback day\n{}",
                formatting::format_payback_window(window.as_ref())
            ))
        }
    }

    pub async fn handle_debt_info(&self) -> McpResult<String> {
        let ledger = self.current_ledger().await?;
        Ok(formatting::format_debt(&ledger.debt_info()))
    }
}
