//! CLI definitions for fleetdesk.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// fleetdesk CLI.
#[derive(Parser)]
#[command(name = "fleetdesk")]
#[command(about = "Session and realtime diagnostics for the fleet monitoring console")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: <config dir>/fleetdesk/config.toml)
    #[arg(short, long, global = true, env = "FLEETDESK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Sign in and persist the session token
    Login {
        /// Account identifier, usually an email address
        identifier: String,

        /// Account secret
        #[arg(long, env = "FLEETDESK_SECRET", hide_env_values = true)]
        secret: String,
    },

    /// Check the persisted token against the server
    Verify,

    /// Sign out and forget the persisted token
    Logout,

    /// Show the cached session without contacting the server
    Whoami,

    /// Issue an authenticated GET and print the response data
    Get {
        /// Endpoint, relative to api.base_url or absolute
        endpoint: String,
    },

    /// Join a channel and print realtime events until interrupted
    Watch {
        /// Channel to join, e.g. device:42
        #[arg(long)]
        channel: Vec<String>,

        /// Topic to print, e.g. location.update
        #[arg(long, required = true)]
        topic: Vec<String>,
    },

    /// Download an endpoint through the transfer queue
    Download {
        /// Endpoint, relative to api.base_url or absolute
        endpoint: String,

        /// Destination file
        dest: PathBuf,
    },
}
