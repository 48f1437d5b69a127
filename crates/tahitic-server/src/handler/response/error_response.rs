use std::borrow::Cow;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// JSON body of every failed request.
///
/// Serializes as `{"success": false, "error": "...", "path"?, "method"?,
/// "detalle"?}`; the status code travels in the response line only.
#[must_use = "error responses do nothing unless serialized"]
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse<'a> {
    /// Always `false`.
    pub success: bool,
    /// User-facing error message.
    pub error: Cow<'a, str>,
    /// Requested path, reported for unknown routes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Cow<'a, str>>,
    /// Requested method, reported for unknown routes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<Cow<'a, str>>,
    /// Additional diagnostic detail.
    #[serde(rename = "detalle", skip_serializing_if = "Option::is_none")]
    pub context: Option<Cow<'a, str>>,
    /// Stable error identifier (not serialized in JSON).
    #[serde(skip)]
    pub name: Cow<'a, str>,
    /// HTTP status code (not serialized in JSON).
    #[serde(skip)]
    pub status: StatusCode,
}

impl<'a> ErrorResponse<'a> {
    pub const INTERNAL_SERVER_ERROR: Self = Self::new(
        "internal_server_error",
        "Error interno del servidor",
        StatusCode::INTERNAL_SERVER_ERROR,
    );
    pub const NOT_FOUND: Self = Self::new(
        "not_found",
        "Ruta no encontrada",
        StatusCode::NOT_FOUND,
    );

    /// Creates a new error response.
    #[inline]
    pub const fn new(name: &'a str, error: &'a str, status: StatusCode) -> Self {
        Self {
            success: false,
            error: Cow::Borrowed(error),
            path: None,
            method: None,
            context: None,
            name: Cow::Borrowed(name),
            status,
        }
    }

    /// Replaces the user-facing message.
    pub fn with_error(mut self, error: impl Into<Cow<'a, str>>) -> Self {
        self.error = error.into();
        self
    }

    /// Records the requested path.
    pub fn with_path(mut self, path: impl Into<Cow<'a, str>>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Records the requested method.
    pub fn with_method(mut self, method: impl Into<Cow<'a, str>>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Attaches diagnostic detail.
    /// If detail already exists, it merges them with a separator.
    pub fn with_context(mut self, context: impl Into<Cow<'a, str>>) -> Self {
        let new_context = context.into();
        self.context = Some(match self.context {
            Some(existing) => Cow::Owned(format!("{}; {}", existing, new_context)),
            None => new_context,
        });
        self
    }
}

impl Default for ErrorResponse<'_> {
    #[inline]
    fn default() -> Self {
        Self::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ErrorResponse<'_> {
    #[inline]
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_failure_flag_and_message() -> anyhow::Result<()> {
        let json = serde_json::to_value(ErrorResponse::INTERNAL_SERVER_ERROR)?;
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "error": "Error interno del servidor" })
        );
        Ok(())
    }

    #[test]
    fn not_found_reports_path_and_method() -> anyhow::Result<()> {
        let response = ErrorResponse::NOT_FOUND
            .with_path("/api/nada")
            .with_method("GET");

        let json = serde_json::to_value(&response)?;
        assert_eq!(json["path"], "/api/nada");
        assert_eq!(json["method"], "GET");
        assert!(json.get("name").is_none());
        assert!(json.get("status").is_none());
        Ok(())
    }

    #[test]
    fn context_is_merged() {
        let response = ErrorResponse::INTERNAL_SERVER_ERROR
            .with_context("Request timeout")
            .with_context("30s");

        assert_eq!(response.context.as_deref(), Some("Request timeout; 30s"));
    }
}
