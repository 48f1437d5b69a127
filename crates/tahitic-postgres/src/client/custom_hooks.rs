//! Includes all callbacks and hooks for [`diesel`] and [`deadpool`].

use std::time::Instant;

use deadpool::managed::{HookResult, Metrics};
use diesel::{ConnectionError, ConnectionResult};
use diesel_async::pooled_connection::{PoolError, PoolableConnection};
use diesel_async::{AsyncConnection, AsyncPgConnection};
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio_postgres_rustls::MakeRustlsConnect;

use super::connection::mask_connection_string;
use super::tls;
use crate::TRACING_TARGET_CONNECTION;

/// Logs the outcome of a connection attempt started at `start`.
fn log_established<C>(hook: &str, masked_addr: &str, start: Instant, result: &ConnectionResult<C>) {
    let elapsed = start.elapsed();

    match result {
        Ok(_) => {
            tracing::info!(
                target: TRACING_TARGET_CONNECTION,
                hook,
                addr = %masked_addr,
                elapsed_ms = elapsed.as_millis(),
                "Database connection established successfully"
            );
        }
        Err(err) => {
            tracing::error!(
                target: TRACING_TARGET_CONNECTION,
                hook,
                addr = %masked_addr,
                elapsed_ms = elapsed.as_millis(),
                error = %err,
                "Failed to establish database connection"
            );
        }
    }
}

/// Setup procedure for plain (non-TLS) connections.
///
/// See [`ManagerConfig`] and [`SetupCallback`] for more details.
///
/// [`ManagerConfig`]: diesel_async::pooled_connection::ManagerConfig
/// [`SetupCallback`]: diesel_async::pooled_connection::SetupCallback
pub fn setup_callback<C>(addr: &str) -> BoxFuture<'_, ConnectionResult<C>>
where
    C: AsyncConnection + 'static,
{
    let start = Instant::now();
    let masked_addr = mask_connection_string(addr);

    tracing::debug!(
        target: TRACING_TARGET_CONNECTION,
        hook = "setup_callback",
        addr = %masked_addr,
        "Establishing new database connection"
    );

    async move {
        let result = C::establish(addr).await;
        log_established("setup_callback", &masked_addr, start, &result);
        result
    }
    .boxed()
}

/// Setup procedure for TLS connections that accept any server certificate.
///
/// TLS is negotiated according to the `sslmode` of the connection string
/// (`prefer` when absent).
pub fn setup_tls_callback(addr: &str) -> BoxFuture<'_, ConnectionResult<AsyncPgConnection>> {
    let start = Instant::now();
    let masked_addr = mask_connection_string(addr);

    tracing::debug!(
        target: TRACING_TARGET_CONNECTION,
        hook = "setup_tls_callback",
        addr = %masked_addr,
        "Establishing new TLS database connection"
    );

    async move {
        let result = establish_tls(addr).await;
        log_established("setup_tls_callback", &masked_addr, start, &result);
        result
    }
    .boxed()
}

async fn establish_tls(addr: &str) -> ConnectionResult<AsyncPgConnection> {
    let tls_config = tls::insecure_client_config()
        .map_err(|err| ConnectionError::BadConnection(format!("TLS configuration: {err}")))?;

    let (client, connection) = tokio_postgres::connect(addr, MakeRustlsConnect::new(tls_config))
        .await
        .map_err(|err| ConnectionError::BadConnection(err.to_string()))?;

    AsyncPgConnection::try_from_client_and_connection(client, connection).await
}

/// Custom hook called after a new connection has been established.
///
/// See [`PoolBuilder`] for more details.
///
/// [`PoolBuilder`]: deadpool::managed::PoolBuilder
pub fn post_create(conn: &mut AsyncPgConnection, metrics: &Metrics) -> HookResult<PoolError> {
    let is_broken = conn.is_broken();

    tracing::debug!(
        target: TRACING_TARGET_CONNECTION,
        hook = "post_create",
        is_broken = is_broken,
        created_at = ?metrics.created,
        "Connection created and added to pool"
    );

    if is_broken {
        tracing::warn!(
            target: TRACING_TARGET_CONNECTION,
            hook = "post_create",
            "Connection is broken after creation"
        );
    }

    Ok(())
}

/// Custom hook called before a connection has been recycled.
pub fn pre_recycle(conn: &mut AsyncPgConnection, metrics: &Metrics) -> HookResult<PoolError> {
    if conn.is_broken() {
        tracing::warn!(
            target: TRACING_TARGET_CONNECTION,
            hook = "pre_recycle",
            recycle_count = metrics.recycle_count,
            "Connection is broken before recycling"
        );
    }

    Ok(())
}

/// Custom hook called after a connection has been recycled.
pub fn post_recycle(conn: &mut AsyncPgConnection, metrics: &Metrics) -> HookResult<PoolError> {
    if conn.is_broken() {
        tracing::error!(
            target: TRACING_TARGET_CONNECTION,
            hook = "post_recycle",
            recycle_count = metrics.recycle_count,
            "Connection is broken after recycling, should be removed from pool"
        );
    }

    Ok(())
}
