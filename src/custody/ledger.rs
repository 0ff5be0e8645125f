use super::custodian::Custodian;
use super::schedule::Schedule;
use crate::calendar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Largest number of days either parent can be owed
pub const MAX_DEBT: i32 = 2;

/// Switches older than this many days before today are dropped on mutation
pub const PRUNE_WINDOW_DAYS: i64 = 30;

/// Clamp a debt value into `[-MAX_DEBT, MAX_DEBT]`
pub fn clamp_debt(debt: i32) -> i32 {
    debt.clamp(-MAX_DEBT, MAX_DEBT)
}

/// Switch history and debt counter
///
/// Positive `debt` means days are owed to Papai, negative to Mamãe.
///
/// Serialized shape: `{ switches = ["YYYY-MM-DD", ...], debt = N }`. The
/// `absorbed` set is only written when non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchLedger {
    /// Dates explicitly flipped away from the base schedule
    pub switches: BTreeSet<NaiveDate>,

    /// Signed day count owed, always within `[-MAX_DEBT, MAX_DEBT]`
    pub debt: i32,

    /// Switch dates whose debt step was swallowed by the clamp
    ///
    /// Lets a second toggle on the same day restore the previous debt exactly.
    /// Always a subset of `switches`.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub absorbed: BTreeSet<NaiveDate>,
}

/// What a toggle did to today's entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

/// Who is owed days and how many
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DebtInfo {
    pub owed_to: Option<Custodian>,
    pub amount: u32,
}

impl SwitchLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring a ledger from an untrusted source back within its invariants
    pub fn normalized(mut self) -> Self {
        self.debt = clamp_debt(self.debt);
        let switches = &self.switches;
        self.absorbed.retain(|d| switches.contains(d));
        self
    }

    /// Whether `date` was explicitly switched
    pub fn is_switched(&self, date: NaiveDate) -> bool {
        self.switches.contains(&date)
    }

    /// Latest switch date, if any
    pub fn most_recent_switch(&self) -> Option<NaiveDate> {
        self.switches.last().copied()
    }

    /// Parent who is owed days, if any
    pub fn owed_custodian(&self) -> Option<Custodian> {
        match self.debt.signum() {
            1 => Some(Custodian::Papai),
            -1 => Some(Custodian::Mamae),
            _ => None,
        }
    }

    pub fn debt_info(&self) -> DebtInfo {
        DebtInfo {
            owed_to: self.owed_custodian(),
            amount: self.debt.unsigned_abs(),
        }
    }

    /// Drop switches older than `today - PRUNE_WINDOW_DAYS` (the boundary day is kept)
    pub fn prune(&mut self, today: NaiveDate) {
        let cutoff = calendar::add_days(today, -PRUNE_WINDOW_DAYS);
        self.switches.retain(|d| *d >= cutoff);
        self.absorbed.retain(|d| *d >= cutoff);
    }

    /// Flip today's custodian, or undo today's flip
    ///
    /// Switching a day that belongs to Papai under the base schedule moves the
    /// debt one step towards Papai; a Mamãe day moves it towards Mamãe. Undoing
    /// reverses exactly the step that was applied. Stale entries are pruned
    /// afterwards.
    pub fn toggle(&mut self, schedule: &Schedule, today: NaiveDate) -> Toggle {
        let step = match schedule.base_custodian(today) {
            Custodian::Papai => 1,
            Custodian::Mamae => -1,
        };

        let toggle = if self.switches.remove(&today) {
            if !self.absorbed.remove(&today) {
                self.debt = clamp_debt(self.debt - step);
            }
            Toggle::Off
        } else {
            self.switches.insert(today);
            let next = clamp_debt(self.debt + step);
            if next == self.debt {
                self.absorbed.insert(today);
            }
            self.debt = next;
            Toggle::On
        };

        self.prune(today);
        toggle
    }
}
