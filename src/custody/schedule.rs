use super::custodian::Custodian;
use crate::calendar;
use chrono::NaiveDate;

/// First day of the alternating schedule
pub const DEFAULT_EPOCH_DATE: NaiveDate = NaiveDate::from_ymd_opt(2026, 2, 2).unwrap();

/// Parent who has the epoch day
pub const DEFAULT_EPOCH_CUSTODIAN: Custodian = Custodian::Mamae;

/// The unmodified alternating schedule
///
/// Days alternate strictly between the two parents, anchored at `epoch_date`
/// which belongs to `epoch_custodian`. Dates before the epoch alternate the
/// same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub epoch_date: NaiveDate,
    pub epoch_custodian: Custodian,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            epoch_date: DEFAULT_EPOCH_DATE,
            epoch_custodian: DEFAULT_EPOCH_CUSTODIAN,
        }
    }
}

impl Schedule {
    pub fn new(epoch_date: NaiveDate, epoch_custodian: Custodian) -> Self {
        Self {
            epoch_date,
            epoch_custodian,
        }
    }

    /// Custodian for `date` under the base schedule, ignoring any switches
    pub fn base_custodian(&self, date: NaiveDate) -> Custodian {
        let elapsed = calendar::days_between(self.epoch_date, date);
        if elapsed.rem_euclid(2) == 0 {
            self.epoch_custodian
        } else {
            self.epoch_custodian.opposite()
        }
    }
}
