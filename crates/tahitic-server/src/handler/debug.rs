//! Schema inspection endpoint.

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::get;
use tahitic_postgres::PgClient;
use tahitic_postgres::query::CatalogRepository;

use super::response::TablesResponse;
use crate::handler::{Error, Result};
use crate::service::ServiceState;

/// Tracing target for debug operations.
const TRACING_TARGET: &str = "tahitic_server::handler::debug";

const TABLES_ERROR: &str = "Error obteniendo tablas de la BD";

/// Lists the tables of the `public` schema.
#[tracing::instrument(skip_all)]
async fn list_tables(State(pg_client): State<PgClient>) -> Result<Json<TablesResponse>> {
    let mut conn = pg_client
        .get_connection()
        .await
        .map_err(|err| Error::from(err).with_message(TABLES_ERROR))?;

    let tables = conn
        .list_public_tables()
        .await
        .map_err(|err| Error::from(err).with_message(TABLES_ERROR))?;

    tracing::debug!(
        target: TRACING_TARGET,
        total = tables.len(),
        "Listed database tables"
    );

    Ok(Json(TablesResponse::new(tables)))
}

/// Returns a [`Router`] with all debug routes.
pub fn routes() -> Router<ServiceState> {
    Router::new().route("/debug/tables", get(list_tables))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::handler::test::{create_test_server, create_test_server_from_env};

    #[tokio::test]
    async fn unreachable_database_yields_json_500() -> anyhow::Result<()> {
        let server = create_test_server()?;

        let response = server.get("/api/debug/tables").expect_failure().await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        response.assert_json(&serde_json::json!({
            "success": false,
            "error": "Error obteniendo tablas de la BD",
        }));
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL instance"]
    async fn lists_tables_in_order() -> anyhow::Result<()> {
        let server = create_test_server_from_env()?;

        let response = server.get("/debug/tables").await;
        response.assert_status_ok();

        let body = response.json::<crate::handler::response::TablesResponse>();
        assert!(body.success);
        assert_eq!(body.total, body.tables.len());

        let mut sorted = body.tables.clone();
        sorted.sort();
        assert_eq!(body.tables, sorted);
        Ok(())
    }
}
