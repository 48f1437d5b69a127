#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod server;
mod telemetry;

use std::process;

use anyhow::Context;

use crate::config::{Cli, Command};
use crate::server::{ServerLifecycle, StartupError, migrate_once};

// Tracing target constants
pub const TRACING_TARGET_SERVER_STARTUP: &str = "tahitic_cli::server::startup";
pub const TRACING_TARGET_SERVER_SHUTDOWN: &str = "tahitic_cli::server::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "tahitic_cli::config";

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(()) => {
            tracing::info!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                "application terminated successfully"
            );
            0
        }
        Err(error) => {
            report(&error);
            1
        }
    };

    process::exit(exit_code);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    telemetry::init_tracing(&cli.telemetry)?;
    cli.log();
    cli.validate()?;

    match cli.command() {
        Command::Serve => {
            tracing::info!(
                target: TRACING_TARGET_SERVER_STARTUP,
                version = env!("CARGO_PKG_VERSION"),
                "starting tahitic server"
            );
            ServerLifecycle::new(cli).run().await?;
        }
        Command::Migrate => {
            tracing::info!(
                target: TRACING_TARGET_SERVER_STARTUP,
                version = env!("CARGO_PKG_VERSION"),
                "applying migration script"
            );
            migrate_once(&cli)
                .await
                .context("one-shot migration failed")?;
        }
    }

    Ok(())
}

/// Logs a fatal error with its code and recovery suggestion.
fn report(error: &anyhow::Error) {
    if !tracing::enabled!(tracing::Level::ERROR) {
        eprintln!("Error: {error:#}");
        return;
    }

    match error.downcast_ref::<StartupError>() {
        Some(startup) => {
            tracing::error!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                error = %error,
                code = startup.error_code(),
                stage = %startup.stage(),
                "application terminated with error"
            );

            if let Some(suggestion) = startup.suggestion() {
                tracing::info!(
                    target: TRACING_TARGET_SERVER_SHUTDOWN,
                    suggestion = %suggestion,
                    "Recovery suggestion"
                );
            }
        }
        None => {
            tracing::error!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                error = format!("{error:#}"),
                "application terminated with error"
            );
        }
    }
}
