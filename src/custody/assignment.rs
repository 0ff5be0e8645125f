//! Effective custodian resolution
//!
//! Layers explicit switches and the debt payback window over the base
//! schedule. These are methods on `Schedule` so the ledger and the date are
//! always explicit inputs.

use super::custodian::Custodian;
use super::ledger::{DebtInfo, SwitchLedger};
use super::schedule::Schedule;
use crate::calendar;
use chrono::NaiveDate;
use serde::Serialize;

/// How many days after the last switch to look for the owed parent's next base day
pub const PAYBACK_SCAN_LIMIT: usize = 10;

/// Longest run accepted by `Schedule::upcoming`
pub const MAX_UPCOMING_DAYS: u32 = 31;

/// Run of days handed back to the parent who is owed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaybackWindow {
    pub owed: Custodian,
    pub start: NaiveDate,
    pub days: u32,
}

impl PaybackWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        let offset = calendar::days_between(self.start, date);
        offset >= 0 && offset < i64::from(self.days)
    }
}

/// Everything a front end shows for one day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayStatus {
    pub date: NaiveDate,
    pub custodian: Custodian,
    pub base: Custodian,
    pub switched: bool,
    pub payback: bool,
    pub debt: DebtInfo,
}

impl Schedule {
    /// Custodian for `date` after switches and payback are applied
    ///
    /// Priority: an explicit switch on the date flips it; otherwise a date
    /// inside the payback window goes to the owed parent; otherwise the base
    /// schedule decides.
    pub fn resolve(&self, ledger: &SwitchLedger, date: NaiveDate) -> Custodian {
        let base = self.base_custodian(date);
        if ledger.is_switched(date) {
            return base.opposite();
        }
        match self.active_payback(ledger, date) {
            Some(window) => window.owed,
            None => base,
        }
    }

    /// Payback window currently implied by the ledger, if any
    ///
    /// The window opens on the first day after the most recent switch whose
    /// base custodian is the owed parent, and lasts `|debt|` days.
    pub fn payback_window(&self, ledger: &SwitchLedger) -> Option<PaybackWindow> {
        let owed = ledger.owed_custodian()?;
        let last = ledger.most_recent_switch()?;
        let start = self.payback_start(last, owed)?;
        Some(PaybackWindow {
            owed,
            start,
            days: ledger.debt.unsigned_abs(),
        })
    }

    /// Whether `date` is handed to the owed parent by the payback window
    ///
    /// Explicitly switched days never count, nor do days on or before the last switch.
    pub fn is_payback_day(&self, ledger: &SwitchLedger, date: NaiveDate) -> bool {
        !ledger.is_switched(date) && self.active_payback(ledger, date).is_some()
    }

    /// Window covering `date`, ignoring explicit switches
    fn active_payback(&self, ledger: &SwitchLedger, date: NaiveDate) -> Option<PaybackWindow> {
        let last = ledger.most_recent_switch()?;
        if date <= last {
            return None;
        }
        self.payback_window(ledger).filter(|window| window.contains(date))
    }

    pub fn day_status(&self, ledger: &SwitchLedger, date: NaiveDate) -> DayStatus {
        DayStatus {
            date,
            custodian: self.resolve(ledger, date),
            base: self.base_custodian(date),
            switched: ledger.is_switched(date),
            payback: self.is_payback_day(ledger, date),
            debt: ledger.debt_info(),
        }
    }

    /// Statuses for `days` consecutive days starting at `from` (capped at `MAX_UPCOMING_DAYS`)
    pub fn upcoming(&self, ledger: &SwitchLedger, from: NaiveDate, days: u32) -> Vec<DayStatus> {
        (0..days.min(MAX_UPCOMING_DAYS))
            .map(|offset| calendar::add_days(from, i64::from(offset)))
            .map(|date| self.day_status(ledger, date))
            .collect()
    }

    fn payback_start(&self, last_switch: NaiveDate, owed: Custodian) -> Option<NaiveDate> {
        let found = (1..=PAYBACK_SCAN_LIMIT as i64)
            .map(|offset| calendar::add_days(last_switch, offset))
            .find(|date| self.base_custodian(*date) == owed);
        if found.is_none() {
            tracing::debug!(%last_switch, %owed, "no base day for owed custodian within scan limit");
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::ledger::Toggle;
    use std::collections::BTreeSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ledger(switches: &[NaiveDate], debt: i32) -> SwitchLedger {
        SwitchLedger {
            switches: switches.iter().copied().collect(),
            debt,
            absorbed: BTreeSet::new(),
        }
    }

    #[test]
    fn test_empty_ledger_follows_base() {
        let schedule = Schedule::default();
        let empty = SwitchLedger::new();
        for offset in -5..5 {
            let d = calendar::add_days(date(2026, 2, 2), offset);
            assert_eq!(schedule.resolve(&empty, d), schedule.base_custodian(d));
            assert!(!schedule.is_payback_day(&empty, d));
        }
    }

    // 2026-02-03（パパの日）を切り替えると、その日はママ、02-05がパパへの返却日になる
    #[test]
    fn test_single_switch_pays_back_on_next_base_day() {
        let schedule = Schedule::default();
        let mut ledger = SwitchLedger::new();
        assert_eq!(ledger.toggle(&schedule, date(2026, 2, 3)), Toggle::On);

        assert_eq!(schedule.resolve(&ledger, date(2026, 2, 2)), Custodian::Mamae);
        assert_eq!(schedule.resolve(&ledger, date(2026, 2, 3)), Custodian::Mamae);
        assert_eq!(schedule.resolve(&ledger, date(2026, 2, 4)), Custodian::Mamae);
        assert_eq!(schedule.resolve(&ledger, date(2026, 2, 5)), Custodian::Papai);
        assert_eq!(schedule.resolve(&ledger, date(2026, 2, 6)), Custodian::Mamae);

        assert!(schedule.is_payback_day(&ledger, date(2026, 2, 5)));
        assert!(!schedule.is_payback_day(&ledger, date(2026, 2, 4)));
        assert!(!schedule.is_payback_day(&ledger, date(2026, 2, 6)));
        assert_eq!(
            schedule.payback_window(&ledger),
            Some(PaybackWindow {
                owed: Custodian::Papai,
                start: date(2026, 2, 5),
                days: 1
            })
        );
    }

    // 借りが2日なら返却日は連続する2日間
    #[test]
    fn test_window_spans_abs_debt_days() {
        let schedule = Schedule::default();
        // Mamae owed two days after a switch on a Mamae day
        let ledger = ledger(&[date(2026, 2, 4)], -2);

        let window = schedule.payback_window(&ledger).unwrap();
        assert_eq!(window.start, date(2026, 2, 6));
        assert_eq!(window.days, 2);

        assert_eq!(schedule.resolve(&ledger, date(2026, 2, 5)), Custodian::Papai);
        assert_eq!(schedule.resolve(&ledger, date(2026, 2, 6)), Custodian::Mamae);
        assert_eq!(schedule.resolve(&ledger, date(2026, 2, 7)), Custodian::Mamae);
        assert_eq!(schedule.resolve(&ledger, date(2026, 2, 8)), Custodian::Mamae);
        assert!(schedule.is_payback_day(&ledger, date(2026, 2, 7)));
        assert!(!schedule.is_payback_day(&ledger, date(2026, 2, 8)));
        assert_eq!(schedule.resolve(&ledger, date(2026, 2, 9)), Custodian::Papai);
    }

    #[test]
    fn test_no_payback_on_or_before_last_switch() {
        let schedule = Schedule::default();
        let ledger = ledger(&[date(2026, 2, 3), date(2026, 2, 9)], 2);

        // Window starts after the latest switch only
        assert_eq!(schedule.payback_window(&ledger).unwrap().start, date(2026, 2, 11));
        assert!(!schedule.is_payback_day(&ledger, date(2026, 2, 5)));
        assert_eq!(schedule.resolve(&ledger, date(2026, 2, 5)), Custodian::Papai);
        assert_eq!(schedule.resolve(&ledger, date(2026, 2, 8)), Custodian::Mamae);
    }

    #[test]
    fn test_explicit_switch_overrides_payback() {
        let schedule = Schedule::default();
        let ledger = ledger(&[date(2026, 2, 3)], 1);
        assert_eq!(schedule.resolve(&ledger, date(2026, 2, 5)), Custodian::Papai);

        // A later switch on the payback day itself flips it back
        let overridden = self::ledger(&[date(2026, 2, 3), date(2026, 2, 5)], 2);
        assert_eq!(schedule.resolve(&overridden, date(2026, 2, 5)), Custodian::Mamae);
        assert!(!schedule.is_payback_day(&overridden, date(2026, 2, 5)));
    }

    #[test]
    fn test_zero_debt_has_no_window() {
        let schedule = Schedule::default();
        let ledger = ledger(&[date(2026, 2, 3)], 0);
        assert_eq!(schedule.payback_window(&ledger), None);
        assert_eq!(schedule.resolve(&ledger, date(2026, 2, 5)), Custodian::Papai);
        assert_eq!(schedule.resolve(&ledger, date(2026, 2, 3)), Custodian::Mamae);
    }

    #[test]
    fn test_pruned_history_falls_back_to_base() {
        let schedule = Schedule::default();
        let ledger = ledger(&[], 1);
        assert_eq!(schedule.payback_window(&ledger), None);
        assert_eq!(schedule.resolve(&ledger, date(2026, 2, 4)), Custodian::Mamae);
    }

    #[test]
    fn test_day_status() {
        let schedule = Schedule::default();
        let ledger = ledger(&[date(2026, 2, 3)], 1);

        let status = schedule.day_status(&ledger, date(2026, 2, 5));
        assert_eq!(status.custodian, Custodian::Papai);
        assert_eq!(status.base, Custodian::Papai);
        assert!(status.payback);
        assert!(!status.switched);
        assert_eq!(status.debt.owed_to, Some(Custodian::Papai));
        assert_eq!(status.debt.amount, 1);

        let switched = schedule.day_status(&ledger, date(2026, 2, 3));
        assert!(switched.switched);
        assert_eq!(switched.custodian, Custodian::Mamae);
    }

    #[test]
    fn test_upcoming_is_capped() {
        let schedule = Schedule::default();
        let ledger = SwitchLedger::new();
        let days = schedule.upcoming(&ledger, date(2026, 2, 2), 100);
        assert_eq!(days.len(), MAX_UPCOMING_DAYS as usize);
        assert_eq!(days[0].date, date(2026, 2, 2));
        assert_eq!(days[1].custodian, Custodian::Papai);
    }
}
