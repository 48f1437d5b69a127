use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use deadpool::managed::{Hook, Pool};
use derive_more::{Deref, DerefMut};
use diesel_async::pooled_connection::{AsyncDieselConnectionManager, ManagerConfig};

use super::{TlsPolicy, custom_hooks};
use crate::{
    ConnectionPool, PgConfig, PgError, PgResult, PooledConnection, TRACING_TARGET_CONNECTION,
};

/// Connection pool status information.
#[derive(Debug, Clone)]
pub struct PgPoolStatus {
    /// Maximum number of connections in the pool
    pub max_size: usize,
    /// Current number of connections in the pool
    pub size: usize,
    /// Number of available connections
    pub available: usize,
    /// Number of requests waiting for connections
    pub waiting: usize,
}

impl PgPoolStatus {
    /// Returns the utilization percentage of the pool (0.0 to 1.0).
    #[inline]
    pub fn utilization(&self) -> f64 {
        if self.max_size == 0 {
            0.0
        } else {
            self.size.saturating_sub(self.available) as f64 / self.max_size as f64
        }
    }

    /// Returns whether the pool is under pressure (high utilization or waiting requests).
    #[inline]
    pub fn is_under_pressure(&self) -> bool {
        self.waiting > 0 || self.utilization() > 0.8
    }
}

/// Owner of the shared database connection pool.
///
/// Cloning a `PgClient` shares the same pool. The pool is opened once by
/// [`PgClient::open`] and closed once by [`PgClient::close`]; leases taken
/// after closing fail with a connection error.
#[derive(Clone)]
pub struct PgClient {
    inner: Arc<PgClientInner>,
}

/// Inner data for PgClient
struct PgClientInner {
    pool: ConnectionPool,
    config: PgConfig,
    closed: AtomicBool,
}

impl PgClient {
    /// Allocates the connection pool for the given configuration.
    ///
    /// Connections are established lazily; use [`verify_connectivity`] to
    /// make sure the database is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be built from the configuration.
    ///
    /// [`verify_connectivity`]: PgClient::verify_connectivity
    #[tracing::instrument(
        skip(config),
        target = TRACING_TARGET_CONNECTION,
        fields(database_url = %config.database_url_masked())
    )]
    pub fn open(config: PgConfig) -> PgResult<Self> {
        let tls_policy = config.connection.tls_policy();
        tracing::info!(
            target: TRACING_TARGET_CONNECTION,
            tls_policy = %tls_policy,
            "Opening database connection pool"
        );

        let mut manager_config = ManagerConfig::default();
        match tls_policy {
            TlsPolicy::Disabled => {
                manager_config.custom_setup = Box::new(custom_hooks::setup_callback);
            }
            TlsPolicy::AcceptInvalidCerts => {
                manager_config.custom_setup = Box::new(custom_hooks::setup_tls_callback);
            }
        }

        let manager = AsyncDieselConnectionManager::new_with_config(
            config.connection.connection_string(),
            manager_config,
        );

        let pool = Pool::builder(manager)
            .max_size(config.pool.postgres_max_connections as usize)
            .wait_timeout(config.pool.connection_timeout())
            .create_timeout(config.pool.connection_timeout())
            .recycle_timeout(config.pool.idle_timeout())
            .runtime(deadpool::Runtime::Tokio1)
            .post_create(Hook::sync_fn(custom_hooks::post_create))
            .pre_recycle(Hook::sync_fn(custom_hooks::pre_recycle))
            .post_recycle(Hook::sync_fn(custom_hooks::post_recycle))
            .build()
            .map_err(|e| {
                tracing::error!(target: TRACING_TARGET_CONNECTION, error = %e, "Failed to create connection pool");
                PgError::Unexpected(format!("Failed to build connection pool: {}", e).into())
            })?;

        Ok(Self {
            inner: Arc::new(PgClientInner {
                pool,
                config,
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Issues a trivial round-trip query.
    ///
    /// # Errors
    ///
    /// Returns [`PgError::Connection`] or [`PgError::Timeout`] when the
    /// database is unreachable or rejects the credentials.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_CONNECTION)]
    pub async fn verify_connectivity(&self) -> PgResult<()> {
        use diesel_async::RunQueryDsl;

        tracing::debug!(target: TRACING_TARGET_CONNECTION, "Testing database connectivity");
        let mut conn = self.get_connection().await?;

        #[derive(diesel::QueryableByName)]
        struct ConnectivityTest {
            #[diesel(sql_type = diesel::sql_types::Integer)]
            #[allow(dead_code)]
            result: i32,
        }

        let _: ConnectivityTest = diesel::sql_query("SELECT 1 AS result")
            .get_result(&mut **conn)
            .await
            .map_err(|e| {
                tracing::error!(target: TRACING_TARGET_CONNECTION, error = %e, "Database connectivity test failed");
                PgError::from(e)
            })?;

        tracing::info!(
            target: TRACING_TARGET_CONNECTION,
            max_connections = self.inner.config.pool.postgres_max_connections,
            "Database connectivity verified"
        );

        Ok(())
    }

    /// Leases a connection from the pool.
    ///
    /// The lease returns to the pool when the [`PgConn`] is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection can be obtained, including after the
    /// pool was closed.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_CONNECTION)]
    pub async fn get_connection(&self) -> PgResult<PgConn> {
        let start = Instant::now();
        let conn = self.inner.pool.get().await.map_err(|e| {
            tracing::error!(
                target: TRACING_TARGET_CONNECTION,
                error = %e,
                elapsed = ?start.elapsed(),
                "Failed to acquire connection from pool"
            );
            PgError::from(e)
        })?;

        let elapsed = start.elapsed();
        if elapsed > Duration::from_millis(100) {
            tracing::warn!(
                target: TRACING_TARGET_CONNECTION,
                elapsed = ?elapsed,
                "Connection acquisition took longer than expected"
            );
        }

        Ok(PgConn::new(conn))
    }

    /// Closes the pool.
    ///
    /// Returns `true` when this call closed the pool and `false` when it had
    /// already been closed, in which case nothing happens.
    pub fn close(&self) -> bool {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(
                target: TRACING_TARGET_CONNECTION,
                "Connection pool already closed"
            );
            return false;
        }

        let status = self.pool_status();
        self.inner.pool.close();

        tracing::info!(
            target: TRACING_TARGET_CONNECTION,
            released = status.size,
            "Connection pool closed"
        );

        true
    }

    /// Returns whether the pool has been closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        AtomicBool::load(&self.inner.closed, Ordering::Acquire) || self.inner.pool.is_closed()
    }

    /// Gets the current pool status and statistics.
    #[inline]
    pub fn pool_status(&self) -> PgPoolStatus {
        let status = self.inner.pool.status();
        PgPoolStatus {
            max_size: status.max_size,
            size: status.size,
            available: status.available,
            waiting: status.waiting,
        }
    }

    /// Gets the database configuration used by this client.
    #[inline]
    pub fn config(&self) -> &PgConfig {
        &self.inner.config
    }
}

impl fmt::Debug for PgClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pool_status = self.pool_status();
        f.debug_struct("PgClient")
            .field("database_url", &self.inner.config.database_url_masked())
            .field(
                "pool_max_connections",
                &self.inner.config.pool.postgres_max_connections,
            )
            .field("pool_current_size", &pool_status.size)
            .field("pool_available", &pool_status.available)
            .field("pool_waiting", &pool_status.waiting)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A leased database connection.
///
/// Dereferences to the underlying [`AsyncPgConnection`]; the connection goes
/// back to the pool on drop.
///
/// [`AsyncPgConnection`]: crate::PgConnection
#[derive(Deref, DerefMut)]
pub struct PgConn {
    #[deref]
    #[deref_mut]
    conn: PooledConnection,
}

impl PgConn {
    /// Creates a new connection wrapper from a pooled connection.
    pub fn new(conn: PooledConnection) -> Self {
        Self { conn }
    }
}

impl fmt::Debug for PgConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConn").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConnectionConfig, PgPoolConfig};

    /// A configuration pointing at a port nothing listens on.
    fn unreachable_config() -> PgConfig {
        PgConfig::new(ConnectionConfig::DiscreteFields {
            host: "127.0.0.1".into(),
            port: 1,
            user: "root".into(),
            password: "root".into(),
            database: "tahiticc".into(),
            tls_enabled: false,
        })
        .with_pool(PgPoolConfig::default().with_connection_timeout_secs(2))
    }

    #[tokio::test]
    async fn open_does_not_connect() -> anyhow::Result<()> {
        let client = PgClient::open(unreachable_config())?;
        assert!(!client.is_closed());
        assert_eq!(client.pool_status().size, 0);
        Ok(())
    }

    #[tokio::test]
    async fn verify_connectivity_fails_when_unreachable() -> anyhow::Result<()> {
        let client = PgClient::open(unreachable_config())?;
        let error = client.verify_connectivity().await.unwrap_err();
        assert!(error.is_connection_error(), "unexpected error: {error}");
        Ok(())
    }

    #[tokio::test]
    async fn close_happens_exactly_once() -> anyhow::Result<()> {
        let client = PgClient::open(unreachable_config())?;
        let shared = client.clone();

        assert!(client.close());
        assert!(!shared.close());
        assert!(shared.is_closed());

        let error = shared.get_connection().await.unwrap_err();
        assert!(error.to_string().contains("closed"));
        Ok(())
    }

    #[tokio::test]
    async fn is_closed_tracks_close_across_clones() -> anyhow::Result<()> {
        let client = PgClient::open(unreachable_config())?;
        let shared = client.clone();
        assert!(!shared.is_closed());

        client.close();
        assert!(client.is_closed());
        assert!(shared.is_closed());
        assert!(format!("{shared:?}").contains("closed: true"));
        Ok(())
    }

    #[tokio::test]
    async fn debug_output_is_masked() -> anyhow::Result<()> {
        let client = PgClient::open(unreachable_config())?;
        let debug = format!("{client:?}");
        assert!(debug.contains("password=***"));
        assert!(!debug.contains("'root' dbname"));
        Ok(())
    }
}
