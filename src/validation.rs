//! Validation helper functions for tool parameters

use crate::calendar;
use crate::custody::MAX_UPCOMING_DAYS;
use chrono::NaiveDate;
use mcp_attr::Result as McpResult;

/// Default length of the `upcoming` preview
pub const DEFAULT_UPCOMING_DAYS: u32 = 7;

fn invalid_params(message: String) -> mcp_attr::Error {
    mcp_attr::Error::new(mcp_attr::ErrorCode::INVALID_PARAMS).with_message(message, true)
}

/// Parse and validate a date parameter
///
/// # Arguments
/// * `date_str` - Date string in YYYY-MM-DD format
///
/// # Returns
/// Result containing parsed NaiveDate or error
pub fn parse_date_param(date_str: &str) -> McpResult<NaiveDate> {
    calendar::parse(date_str).map_err(|e| invalid_params(e.to_string()))
}

/// Resolve the `days` parameter of the upcoming preview
///
/// Missing means `DEFAULT_UPCOMING_DAYS`; zero or more than
/// `MAX_UPCOMING_DAYS` is rejected.
pub fn parse_days_param(days: Option<u32>) -> McpResult<u32> {
    match days {
        None => Ok(DEFAULT_UPCOMING_DAYS),
        Some(d) if (1..=MAX_UPCOMING_DAYS).contains(&d) => Ok(d),
        Some(d) => Err(invalid_params(format!(
            "Invalid days '{}'. Use a value between 1 and {}",
            d, MAX_UPCOMING_DAYS
        ))),
    }
}

/// Reject blank sync codes before they reach the decoder
pub fn require_code(code: &str) -> McpResult<&str> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return Err(invalid_params("Sync code must not be empty".to_string()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_param() {
        assert_eq!(
            parse_date_param("2026-02-05").unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 5).unwrap()
        );
        assert!(parse_date_param("5 Feb").is_err());
    }

    #[test]
    fn test_parse_days_param() {
        assert_eq!(parse_days_param(None).unwrap(), DEFAULT_UPCOMING_DAYS);
        assert_eq!(parse_days_param(Some(14)).unwrap(), 14);
        assert!(parse_days_param(Some(0)).is_err());
        assert!(parse_days_param(Some(MAX_UPCOMING_DAYS + 1)).is_err());
    }

    #[test]
    fn test_require_code() {
        assert_eq!(require_code("  abc ").unwrap(), "abc");
        assert!(require_code("   ").is_err());
    }
}
