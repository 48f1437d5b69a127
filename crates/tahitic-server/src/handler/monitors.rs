//! Process liveness endpoint.

use axum::Json;
use axum::Router;
use axum::routing::get;

use super::response::HealthResponse;
use crate::service::ServiceState;

/// Tracing target for monitor operations.
const TRACING_TARGET: &str = "tahitic_server::handler::monitors";

/// Reports that the HTTP service is up.
///
/// The route only exists once the listener is bound, which happens after the
/// schema bootstrap succeeded.
#[tracing::instrument(skip_all)]
async fn health_status() -> Json<HealthResponse> {
    tracing::trace!(target: TRACING_TARGET, "Health status requested");
    Json(HealthResponse::ok())
}

/// Returns a [`Router`] with all health monitoring routes.
pub fn routes() -> Router<ServiceState> {
    Router::new().route("/health", get(health_status))
}

#[cfg(test)]
mod tests {
    use crate::handler::response::HealthResponse;
    use crate::handler::test::create_test_server;

    #[tokio::test]
    async fn health_is_served_at_both_prefixes() -> anyhow::Result<()> {
        let server = create_test_server()?;

        for path in ["/health", "/api/health"] {
            let response = server.get(path).await;
            response.assert_status_ok();

            let body = response.json::<HealthResponse>();
            assert!(body.success);
            assert_eq!(body.status, "OK");
            assert_eq!(body.message, "Servidor Tahitic funcionando");
        }

        Ok(())
    }

    #[tokio::test]
    async fn health_does_not_need_the_database() -> anyhow::Result<()> {
        let server = create_test_server()?;
        server.get("/api/health").await.assert_status_ok();
        Ok(())
    }
}
