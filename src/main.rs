//! fleetdesk - session and realtime diagnostics for the fleet monitoring console
//!
//! Main entry point for the fleetdesk CLI.

mod cli;
mod cmd_api;
mod cmd_session;

use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use fleetdesk_config::{Config, ConfigLoader};
use fleetdesk_runtime::Runtime;

use crate::cli::{Cli, Commands};

/// Initialize tracing on stderr, plus a daily-rotated file under the storage
/// directory when `logging.file` is set.
fn init_tracing(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))?;

    let file_layer = if config.logging.file {
        let log_dir = config.storage.log_dir();
        std::fs::create_dir_all(&log_dir)?;

        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("fleetdesk")
            .filename_suffix("log")
            .max_log_files(14)
            .build(&log_dir)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // The guard flushes buffered lines on drop and must outlive main.
        static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
            std::sync::OnceLock::new();
        let _ = GUARD.set(guard);

        Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        // stdout carries command output only
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(ConfigLoader::default_path);
    let config = ConfigLoader::load_or_default(&config_path)?;
    init_tracing(&config)?;

    let runtime = Runtime::start(config).await?;

    let result = match cli.command {
        Commands::Login { identifier, secret } => {
            cmd_session::login(&runtime, &identifier, &secret).await
        }
        Commands::Verify => cmd_session::verify(&runtime).await,
        Commands::Logout => cmd_session::logout(&runtime).await,
        Commands::Whoami => cmd_session::whoami(&runtime),
        Commands::Get { endpoint } => cmd_api::get(&runtime, &endpoint).await,
        Commands::Watch { channel, topic } => cmd_api::watch(&runtime, channel, topic).await,
        Commands::Download { endpoint, dest } => cmd_api::download(&runtime, &endpoint, dest).await,
    };

    runtime.shutdown();
    result
}
