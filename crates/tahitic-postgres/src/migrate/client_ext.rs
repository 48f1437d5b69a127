//! Extension trait for PgClient providing schema bootstrap.

use std::future::Future;

use super::{MigrationError, MigrationLocator, MigrationScript, SchemaSnapshot, run_migration};
use crate::{PgClient, TRACING_TARGET_MIGRATION};

/// Extension trait providing schema bootstrap for [`PgClient`].
pub trait PgClientMigrationExt {
    /// Executes an already loaded script.
    fn run_migration_script(
        &self,
        script: MigrationScript,
    ) -> impl Future<Output = Result<SchemaSnapshot, MigrationError>>;

    /// Locates, loads and executes the bootstrap script.
    ///
    /// # Errors
    ///
    /// Returns the first failure among location, loading and execution.
    fn bootstrap_schema(
        &self,
        locator: &MigrationLocator,
    ) -> impl Future<Output = Result<SchemaSnapshot, MigrationError>>;
}

impl PgClientMigrationExt for PgClient {
    async fn run_migration_script(
        &self,
        script: MigrationScript,
    ) -> Result<SchemaSnapshot, MigrationError> {
        run_migration(self, script).await
    }

    async fn bootstrap_schema(
        &self,
        locator: &MigrationLocator,
    ) -> Result<SchemaSnapshot, MigrationError> {
        let path = locator.resolve()?;
        let script = MigrationScript::load(&path).await?;
        let snapshot = run_migration(self, script).await?;

        tracing::info!(
            target: TRACING_TARGET_MIGRATION,
            tables = %snapshot,
            "Schema bootstrap completed"
        );

        Ok(snapshot)
    }
}
