use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Liveness response of the HTTP service.
///
/// Reports the process only; it does not query the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub success: bool,
    pub status: String,
    pub message: String,
    pub timestamp: Timestamp,
}

impl HealthResponse {
    /// Creates a healthy response stamped with the current time.
    pub fn ok() -> Self {
        Self {
            success: true,
            status: "OK".to_owned(),
            message: "Servidor Tahitic funcionando".to_owned(),
            timestamp: Timestamp::now(),
        }
    }
}
