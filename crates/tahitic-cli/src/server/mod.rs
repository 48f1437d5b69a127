//! Server lifecycle: staged startup, serving and the single teardown.

mod error;
mod http_server;
mod lifecycle;
mod shutdown;
mod state;

pub use error::{StartupError, StartupResult};
pub use lifecycle::{ServerLifecycle, migrate_once};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal, monitor_stop_timeout};
pub use state::{ServerState, StateTracker};

use crate::{
    TRACING_TARGET_SERVER_SHUTDOWN as TRACING_TARGET_SHUTDOWN,
    TRACING_TARGET_SERVER_STARTUP as TRACING_TARGET_STARTUP,
};
