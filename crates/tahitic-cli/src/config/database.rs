//! Database connection and pool configuration.

use clap::Args;
use serde::{Deserialize, Serialize};
use tahitic_postgres::{ConnectionArgs, PgConfig, PgPoolConfig};

use crate::TRACING_TARGET_CONFIG;

/// Where to connect and how to pool.
///
/// `DATABASE_URL` wins over the discrete `DB_*` variables when it is set and
/// non-empty.
#[derive(Debug, Clone, Default, Args, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection parameters.
    #[clap(flatten)]
    pub connection: ConnectionArgs,

    /// Pool tuning.
    #[clap(flatten)]
    pub pool: PgPoolConfig,
}

impl DatabaseConfig {
    /// Resolves the connection parameters into a pool configuration.
    pub fn pg_config(&self) -> PgConfig {
        PgConfig::new(self.connection.resolve()).with_pool(self.pool.clone())
    }

    /// Validates the pool settings.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.pool.validate()?;
        Ok(())
    }

    /// Logs the resolved configuration with the password masked.
    pub fn log(&self) {
        let config = self.pg_config();
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            database_url = %config.database_url_masked(),
            url_based = config.connection.is_url_based(),
            tls_policy = %config.connection.tls_policy(),
            postgres_max_connections = self.pool.postgres_max_connections,
            postgres_connection_timeout_secs = ?self.pool.postgres_connection_timeout_secs,
            postgres_idle_timeout_secs = ?self.pool.postgres_idle_timeout_secs,
            "Database configuration"
        );
    }
}
