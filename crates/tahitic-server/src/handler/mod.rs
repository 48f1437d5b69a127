//! All `axum::`[`Router`]s with related `axum::`[`Handler`]s.
//!
//! Every route is served twice: at the root and under `/api`.
//!
//! ```rust,no_run
//! use tahitic_postgres::PgConfig;
//! use tahitic_server::handler::routes;
//! use tahitic_server::service::ServiceState;
//!
//! # fn example() -> anyhow::Result<()> {
//! let pg_client = PgConfig::from_env().build()?;
//! let app: axum::Router = routes(ServiceState::new(pg_client));
//! # Ok(())
//! # }
//! ```
//!
//! [`Router`]: axum::routing::Router
//! [`Handler`]: axum::handler::Handler

mod debug;
mod error;
mod moderation;
mod monitors;
pub mod response;

use axum::Router;
use axum::http::{Method, Uri};

pub use crate::handler::error::{Error, ErrorKind, Result};
use crate::service::ServiceState;

/// Tracing target for unmatched routes.
const TRACING_TARGET: &str = "tahitic_server::handler::fallback";

/// Prefix under which every route is mounted a second time.
pub const API_PREFIX: &str = "/api";

/// Answers unknown routes with a JSON 404 naming the path and method.
async fn fallback(method: Method, uri: Uri) -> Error<'static> {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| uri.path().to_owned());

    tracing::debug!(
        target: TRACING_TARGET,
        method = %method,
        path = %path,
        "Route not found"
    );

    ErrorKind::NotFound
        .into_error()
        .with_path(path)
        .with_method(method.to_string())
}

fn api_routes() -> Router<ServiceState> {
    Router::new()
        .merge(monitors::routes())
        .merge(debug::routes())
        .merge(moderation::routes())
}

/// Returns a [`Router`] with all routes, bound to the given state.
///
/// [`Router`]: axum::routing::Router
pub fn routes(state: ServiceState) -> Router {
    Router::new()
        .merge(api_routes())
        .nest(API_PREFIX, api_routes())
        .fallback(fallback)
        .with_state(state)
}
