//! Formatting helper functions for tool responses

use crate::calendar;
use crate::custody::{DayStatus, DebtInfo, PaybackWindow, Toggle};

/// Describe who is owed days, e.g. "Papai is owed 2 days"
pub fn format_debt(debt: &DebtInfo) -> String {
    match debt.owed_to {
        Some(custodian) if debt.amount > 0 => format!(
            "{} is owed {} {}",
            custodian.label(),
            debt.amount,
            if debt.amount == 1 { "day" } else { "days" }
        ),
        _ => "Nobody is owed days".to_string(),
    }
}

/// One-line summary of a day
pub fn format_day_line(status: &DayStatus) -> String {
    let mut line = format!(
        "{} {}",
        calendar::format(status.date),
        status.custodian.label()
    );
    if status.switched {
        line.push_str(" (switched)");
    } else if status.payback {
        line.push_str(" (payback)");
    }
    line
}

/// Full description of a day with the current debt
pub fn format_day_status(status: &DayStatus) -> String {
    let mut result = format!(
        "{}: {}'s day\n",
        calendar::format(status.date),
        status.custodian.label()
    );
    if status.switched {
        result.push_str(&format!("  Switched from {}\n", status.base.label()));
    }
    if status.payback {
        result.push_str("  Payback day\n");
    }
    result.push_str(&format!("  {}\n", format_debt(&status.debt)));
    result
}

/// List of days, one per line
pub fn format_upcoming(days: &[DayStatus]) -> String {
    let mut result = format!("Next {} day(s):\n\n", days.len());
    for status in days {
        result.push_str(&format!("- {}\n", format_day_line(status)));
    }
    result
}

/// Confirmation for a switch, followed by the resulting status
pub fn format_switch(toggle: Toggle, status: &DayStatus) -> String {
    let action = match toggle {
        Toggle::On => "Day switched",
        Toggle::Off => "Switch undone",
    };
    format!("{}\n{}", action, format_day_status(status))
}

pub fn format_payback_window(window: Option<&PaybackWindow>) -> String {
    match window {
        Some(w) => format!(
            "Payback for {} starts {} and lasts {} day(s)",
            w.owed.label(),
            calendar::format(w.start),
            w.days
        ),
        None => "No payback scheduled".to_string(),
    }
}
