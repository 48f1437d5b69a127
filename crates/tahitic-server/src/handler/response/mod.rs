//! Response types for HTTP handlers.

mod debug;
mod error_response;
mod moderation;
mod monitors;

pub use debug::TablesResponse;
pub use error_response::ErrorResponse;
pub use moderation::{
    ImageModerationStatistics, ModerationStatistics, ModerationStatusResponse,
    TextModerationStatistics,
};
pub use monitors::HealthResponse;
