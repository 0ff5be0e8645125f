//! MCP tool handlers for the custody server
//!
//! Each tool on `CustodyServerHandler` delegates to a `handle_*` method
//! defined in one of these files.

pub mod status;
pub mod switch_day;
pub mod transfer;
