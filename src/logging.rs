//! Tracing setup
//!
//! Logs go to stderr because stdout carries the MCP protocol.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::{Directive, LevelFilter};

/// Environment variable that overrides the log filter (e.g. `custody_day=debug`)
pub const LOG_ENV_VAR: &str = "CUSTODY_LOG";

/// Install the global subscriber
///
/// `default_level` applies when `CUSTODY_LOG` is unset; an unknown level
/// falls back to `info`. Calling this more than once keeps the first
/// subscriber.
pub fn init(default_level: &str) {
    let directive = default_level
        .parse::<Directive>()
        .unwrap_or_else(|_| LevelFilter::INFO.into());

    let filter = EnvFilter::builder()
        .with_default_directive(directive)
        .with_env_var(LOG_ENV_VAR)
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
