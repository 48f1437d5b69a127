//! Background workers running next to the HTTP listener.

mod health_monitor;

pub use health_monitor::{
    DEFAULT_HEALTH_CHECK_INTERVAL, HealthMonitor, HealthMonitorHandle, HealthProbeResult,
    StopOutcome,
};
