//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── command: Command                # serve (default) | migrate
//! ├── server: ServerConfig            # Host, port
//! ├── database: DatabaseConfig        # DATABASE_URL or DB_*, pool tuning
//! ├── deployment: DeploymentConfig    # APP_ENV, MIGRATION_SCRIPT, probe period
//! ├── middleware: MiddlewareConfig    # CORS, request timeout
//! └── telemetry: TelemetryConfig      # Log format
//! ```
//!
//! All configuration can be provided via CLI arguments or environment variables.
//! Use `--help` to see all available options.
//!
//! # Example
//!
//! ```bash
//! tahitic --database-url "postgresql://..." --port 4000
//!
//! # Or via environment variables
//! DATABASE_URL="postgresql://..." PORT=4000 tahitic
//! ```

mod database;
mod deployment;
mod middleware;
mod server;
mod telemetry;

use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
pub use database::DatabaseConfig;
pub use deployment::DeploymentConfig;
pub use middleware::MiddlewareConfig;
use serde::{Deserialize, Serialize};
pub use server::ServerConfig;
pub use telemetry::{LogFormat, TelemetryConfig};

use crate::TRACING_TARGET_SERVER_STARTUP;

/// What the process does once configured.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(Subcommand, strum::Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Command {
    /// Bootstrap the schema and serve HTTP until terminated (default).
    #[default]
    Serve,
    /// Bootstrap the schema, then exit.
    Migrate,
}

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "tahitic")]
#[command(about = "Tahitic reviews and places backend")]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// HTTP listener configuration.
    #[clap(flatten)]
    pub server: ServerConfig,

    /// Database connection and pool configuration.
    #[clap(flatten)]
    pub database: DatabaseConfig,

    /// Deployment layout and background schedule.
    #[clap(flatten)]
    pub deployment: DeploymentConfig,

    /// HTTP middleware configuration (CORS, timeouts).
    #[clap(flatten)]
    pub middleware: MiddlewareConfig,

    /// Log output configuration.
    #[clap(flatten)]
    pub telemetry: TelemetryConfig,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// The .env file is loaded first so that clap's `env` fallbacks see its
    /// values.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    /// Loads environment variables from .env file if the dotenv feature is enabled.
    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    /// No-op when dotenv feature is disabled.
    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Returns the subcommand, defaulting to [`Command::Serve`].
    #[inline]
    pub fn command(&self) -> Command {
        self.command.unwrap_or_default()
    }

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server
            .validate()
            .context("invalid server configuration")?;
        self.database
            .validate()
            .context("invalid database configuration")?;
        self.deployment
            .validate()
            .context("invalid deployment configuration")?;
        self.middleware
            .validate()
            .context("invalid middleware configuration")?;
        Ok(())
    }

    /// Logs configuration (no sensitive information).
    pub fn log(&self) {
        Self::log_build_info();
        self.server.log();
        self.database.log();
        self.deployment.log();
        self.middleware.log();
    }

    /// Logs build information at debug level.
    fn log_build_info() {
        tracing::debug!(
            target: TRACING_TARGET_SERVER_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}
