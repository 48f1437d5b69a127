//! Middleware configuration for the HTTP server.
//!
//! The middleware configs are defined in `tahitic-server` and support both
//! CLI arguments and environment variables.
//!
//! # Example
//!
//! ```bash
//! # Restrict CORS origins and shorten the request timeout
//! tahitic --cors-origins "https://tahitic.com" --request-timeout 10
//! ```

use clap::Args;
use serde::{Deserialize, Serialize};
use tahitic_server::middleware::{CorsConfig, RecoveryConfig};

use crate::TRACING_TARGET_CONFIG;

/// Middleware configuration combining CORS and recovery settings.
#[derive(Debug, Clone, Default, Args, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// CORS (Cross-Origin Resource Sharing) configuration.
    #[clap(flatten)]
    pub cors: CorsConfig,

    /// Recovery middleware configuration.
    ///
    /// Controls request timeout and panic recovery behavior.
    #[clap(flatten)]
    pub recovery: RecoveryConfig,
}

impl MiddlewareConfig {
    /// Validates the middleware settings.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.recovery.validate()?;
        Ok(())
    }

    /// Logs middleware configuration at info level.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            origins = ?self.cors.allowed_origins,
            any_origin = self.cors.allows_any_origin(),
            credentials = self.cors.allow_credentials,
            "CORS configuration"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            request_timeout_secs = self.recovery.request_timeout,
            "Recovery configuration"
        );
    }
}
