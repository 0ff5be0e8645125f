//! Custody Day MCP Server - Main Entry Point
//!
//! This is the main entry point for the custody schedule MCP server.
//! The actual implementation is in the `custody_day` library.

use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser};
use custody_day::config::DEFAULT_BASE_URL;
use custody_day::custody::{DEFAULT_EPOCH_CUSTODIAN, DEFAULT_EPOCH_DATE};
use custody_day::{
    Custodian, CustodyServerHandler, GitRemote, RemoteStore, Schedule, Settings, logging,
};
use mcp_attr::server::serve_stdio;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Custody Day MCP Server - shared alternating custody calendar via Model Context Protocol
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the local ledger file (TOML)
    file: PathBuf,

    /// Shared ledger row file inside a git working copy, synced through its origin
    #[arg(long)]
    remote: Option<PathBuf>,

    /// Row key shared by all devices of the household
    #[arg(long, default_value = custody_day::config::DEFAULT_SYNC_ID)]
    sync_id: String,

    /// First day of the alternating schedule (YYYY-MM-DD)
    #[arg(long, default_value_t = DEFAULT_EPOCH_DATE)]
    epoch_date: NaiveDate,

    /// Parent who has the epoch day (mamae/papai)
    #[arg(long, default_value_t = DEFAULT_EPOCH_CUSTODIAN)]
    epoch_custodian: Custodian,

    /// Address that share links point at
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: Url,

    /// Share link to import once at startup
    #[arg(long)]
    open: Option<String>,

    /// Log level when CUSTODY_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Check if no arguments were provided (except the program name)
    if std::env::args().len() == 1 {
        // No arguments provided, show help and exit with error code
        let mut cmd = Args::command();
        cmd.print_help().ok();
        println!(); // Add a newline after help
        std::process::exit(2);
    }

    let args = Args::parse();
    logging::init(&args.log_level);

    let settings = Settings::new(&args.file)?
        .with_schedule(Schedule::new(args.epoch_date, args.epoch_custodian))
        .with_sync_id(&args.sync_id)
        .with_base_url(args.base_url);

    let remote = args.remote.as_ref().map(|path| {
        let remote = GitRemote::new(path);
        if !remote.is_git_managed() {
            tracing::warn!(path = %path.display(), "Remote row is not inside a git repository");
        }
        Arc::new(remote) as Arc<dyn RemoteStore>
    });
    let has_remote = remote.is_some();

    let handler = CustodyServerHandler::new(settings, remote)?;

    if has_remote {
        handler.pull_remote_state().await?;
        handler.start_remote_subscription()?;
    }

    if let Some(link) = &args.open {
        match handler.open_share_link(link).await {
            Ok(url) => tracing::info!(url = %url, "Imported share link"),
            Err(e) => tracing::warn!(error = %format!("{:#}", e), "Ignored share link"),
        }
    }

    tracing::info!(file = %args.file.display(), "Starting custody-day MCP server");
    serve_stdio(handler).await?;
    Ok(())
}
