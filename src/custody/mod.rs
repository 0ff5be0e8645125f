//! Custody domain models and business logic
//!
//! This module contains the schedule and ledger types and the rules that
//! combine them. It is split into submodules:
//! - `custodian`: The two parents
//! - `schedule`: Base alternating schedule anchored at an epoch day
//! - `ledger`: Switch history, debt counter, toggling and pruning
//! - `assignment`: Effective custodian resolution and payback windows

mod assignment;
mod custodian;
mod ledger;
mod schedule;

// Re-export all public types
pub use assignment::{DayStatus, MAX_UPCOMING_DAYS, PAYBACK_SCAN_LIMIT, PaybackWindow};
pub use custodian::Custodian;
pub use ledger::{DebtInfo, MAX_DEBT, PRUNE_WINDOW_DAYS, SwitchLedger, Toggle, clamp_debt};
pub use schedule::{DEFAULT_EPOCH_CUSTODIAN, DEFAULT_EPOCH_DATE, Schedule};
