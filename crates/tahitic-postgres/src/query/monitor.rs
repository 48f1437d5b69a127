//! Liveness probe query.

use std::future::Future;

use diesel_async::RunQueryDsl;

use crate::{PgConnection, PgError, PgResult};

/// Touches a table created by the bootstrap script, so a probe fails both on
/// connectivity loss and on a schema that went missing.
const PROBE_LIVENESS: &str = "SELECT 1 FROM administradores LIMIT 1";

/// Repository for database liveness checks.
pub trait MonitorRepository {
    /// Runs the lightweight liveness query.
    ///
    /// An empty table still counts as alive.
    fn probe_liveness(&mut self) -> impl Future<Output = PgResult<()>> + Send;
}

impl MonitorRepository for PgConnection {
    async fn probe_liveness(&mut self) -> PgResult<()> {
        diesel::sql_query(PROBE_LIVENESS)
            .execute(self)
            .await
            .map_err(PgError::from)?;

        Ok(())
    }
}
