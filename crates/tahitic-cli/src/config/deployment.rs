//! Deployment layout and background schedule configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use serde::{Deserialize, Serialize};
use tahitic_postgres::{DeploymentMode, MigrationLocator};

use crate::TRACING_TARGET_CONFIG;

const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 900;

/// Deployment configuration.
///
/// # Environment Variables
///
/// - `APP_ENV` - `production` (or `prod`) selects the packaged layout,
///   anything else the source checkout layout
/// - `MIGRATION_SCRIPT` - Explicit script path, disables the search
/// - `HEALTH_CHECK_INTERVAL_SECS` - Database probe period (default: 900)
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
#[must_use = "config does nothing unless you use it"]
pub struct DeploymentConfig {
    /// Deployment environment.
    #[arg(long, env = "APP_ENV", default_value = "development")]
    pub environment: DeploymentMode,

    /// Path of the bootstrap script.
    ///
    /// When set, only this path is tried. Relative paths are taken from the
    /// working directory.
    #[arg(long, env = "MIGRATION_SCRIPT")]
    pub migration_script: Option<PathBuf>,

    /// Seconds between two database liveness probes.
    #[arg(
        long,
        env = "HEALTH_CHECK_INTERVAL_SECS",
        default_value_t = DEFAULT_HEALTH_CHECK_INTERVAL_SECS
    )]
    pub health_check_interval_secs: u64,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            environment: DeploymentMode::default(),
            migration_script: None,
            health_check_interval_secs: DEFAULT_HEALTH_CHECK_INTERVAL_SECS,
        }
    }
}

impl DeploymentConfig {
    /// Builds the script locator for this deployment.
    pub fn locator(&self) -> MigrationLocator {
        MigrationLocator::new(self.environment).with_override(self.migration_script.clone())
    }

    /// Returns the health check period.
    #[must_use]
    pub const fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    /// Validates the deployment settings.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.health_check_interval_secs == 0 {
            anyhow::bail!("Health check interval must be at least 1 second.");
        }

        Ok(())
    }

    /// Logs the deployment settings.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            environment = %self.environment,
            migration_script = ?self.migration_script,
            health_check_interval_secs = self.health_check_interval_secs,
            "Deployment configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DeploymentConfig::default();
        assert_eq!(config.environment, DeploymentMode::Development);
        assert_eq!(config.health_check_interval(), Duration::from_secs(900));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn override_pins_single_candidate() {
        let config = DeploymentConfig {
            migration_script: Some(PathBuf::from("/srv/init-db.sql")),
            ..DeploymentConfig::default()
        };

        let candidates = config.locator().candidates();
        assert_eq!(candidates, vec![PathBuf::from("/srv/init-db.sql")]);
    }

    #[test]
    fn reject_zero_interval() {
        let config = DeploymentConfig {
            health_check_interval_secs: 0,
            ..DeploymentConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
