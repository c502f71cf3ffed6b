//! # mcp-homeseer
//!
//! MCP (Model Context Protocol) server that exposes a HomeSeer
//! home-automation controller's JSON API as callable tools. Runs as a stdio
//! JSON-RPC server — designed to be launched by an AI agent host
//! (e.g. Claude Code).
//!
//! ## Architecture
//!
//! ```text
//! main.rs     — entry point, config loading, MCP server launch
//! config.rs   — layered configuration (defaults / JSON file / env vars)
//! client.rs   — HTTP client for the HomeSeer JSON API, typed responses
//! homeseer.rs — controller handle: atomic config snapshot + reload
//! mcp.rs      — MCP JSON-RPC protocol handler (stdio)
//! tools.rs    — tool definitions and handlers
//! ```
//!
//! ## Tools
//!
//! - **Devices**: `list_all_devices`, `get_device_info`, `get_control`,
//!   `control_homeseer_device`, `control_homeseer_device_by_label`
//! - **Events**: `get_events`, `run_event`

mod client;
mod config;
mod homeseer;
mod mcp;
mod tools;

use clap::Parser;
use config::Cli;
use homeseer::HomeSeerHandle;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let config_path = config::resolve_config_path(&cli);
    let resolved = match config::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("mcp-homeseer: configuration error: {}", e);
            std::process::exit(1);
        }
    };

    eprintln!(
        "mcp-homeseer: controller={} source={} auth={}",
        resolved.base_url(),
        resolved.source,
        resolved.auth_mode()
    );
    if resolved.auth_mode() == "none" {
        eprintln!("mcp-homeseer: warning: no authentication configured");
    }

    let handle = match config_path {
        Some(path) => HomeSeerHandle::with_config_file(resolved, path),
        None => HomeSeerHandle::new(resolved),
    };

    mcp::run_stdio(handle).await;
}
