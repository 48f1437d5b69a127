//! HTTP listener binding and serving.

use std::future::IntoFuture;
use std::net::SocketAddr;

use axum::Router;
use tahitic_server::handler::routes;
use tahitic_server::middleware::{RouterObservabilityExt, RouterRecoveryExt, RouterSecurityExt};
use tahitic_server::service::ServiceState;
use tokio::net::TcpListener;

use super::{ShutdownSignal, StartupError, StartupResult, TRACING_TARGET_STARTUP};
use crate::config::{MiddlewareConfig, ServerConfig};

/// Creates the router with all middleware layers applied.
///
/// Middleware is applied in reverse order (last added = outermost):
/// 1. Recovery (outermost) - catches panics and enforces timeouts
/// 2. Observability - request IDs and tracing spans
/// 3. Security - CORS and body limits
/// 4. Routes (innermost) - actual request handlers
pub fn create_router(state: ServiceState, middleware: &MiddlewareConfig) -> Router {
    routes(state)
        .with_security(&middleware.cors)
        .with_observability()
        .with_recovery(&middleware.recovery)
}

/// Binds the listener without accepting connections yet.
pub async fn bind(server_config: &ServerConfig) -> StartupResult<TcpListener> {
    let server_addr = server_config.server_addr();

    match TcpListener::bind(server_addr).await {
        Ok(listener) => {
            tracing::info!(
                target: TRACING_TARGET_STARTUP,
                addr = %server_addr,
                "Successfully bound to address"
            );

            if server_config.binds_to_all_interfaces() {
                tracing::warn!(
                    target: TRACING_TARGET_STARTUP,
                    "Server is bound to all interfaces. Ensure firewall rules are properly configured."
                );
            }

            Ok(listener)
        }
        Err(err) => {
            tracing::error!(
                target: TRACING_TARGET_STARTUP,
                addr = %server_addr,
                error = %err,
                "Failed to bind to address"
            );

            Err(StartupError::bind_error(server_addr, err))
        }
    }
}

/// Serves `app` until `signal` fires.
///
/// In-flight requests are not drained: the serving future is dropped as soon
/// as the signal wins.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    signal: &ShutdownSignal,
) -> StartupResult<()> {
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .into_future();

    tokio::select! {
        result = server => result.map_err(StartupError::Serve),
        () = signal.wait() => Ok(()),
    }
}
