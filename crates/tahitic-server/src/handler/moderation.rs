//! Moderation activity endpoint.

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::get;
use tahitic_postgres::PgClient;
use tahitic_postgres::query::ModerationRepository;

use super::response::ModerationStatusResponse;
use crate::handler::{Error, Result};
use crate::service::ServiceState;

/// Tracing target for moderation operations.
const TRACING_TARGET: &str = "tahitic_server::handler::moderation";

const STATUS_ERROR: &str = "Error obteniendo estado del sistema";

/// Summarizes text and image moderation over the trailing seven days.
#[tracing::instrument(skip_all)]
async fn moderation_status(
    State(pg_client): State<PgClient>,
) -> Result<Json<ModerationStatusResponse>> {
    let mut conn = pg_client
        .get_connection()
        .await
        .map_err(|err| Error::from(err).with_message(STATUS_ERROR))?;

    let summary = conn
        .moderation_summary()
        .await
        .map_err(|err| Error::from(err).with_message(STATUS_ERROR))?;

    tracing::debug!(
        target: TRACING_TARGET,
        total_analizadas = summary.total_analizadas(),
        "Moderation status prepared"
    );

    Ok(Json(ModerationStatusResponse::from(summary)))
}

/// Returns a [`Router`] with all moderation routes.
pub fn routes() -> Router<ServiceState> {
    Router::new().route("/moderacion/estado", get(moderation_status))
}
