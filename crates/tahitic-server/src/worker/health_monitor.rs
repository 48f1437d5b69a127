//! Periodic database liveness probe.
//!
//! The monitor is armed once the listener is live. Every period it leases a
//! connection and runs a lightweight query against a bootstrap table. Failures
//! are logged and swallowed: the service keeps answering requests while the
//! database is away.

use std::fmt;
use std::time::Duration;

use jiff::Timestamp;
use tahitic_postgres::PgClient;
use tahitic_postgres::query::MonitorRepository;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Tracing target for health monitor operations.
const TRACING_TARGET: &str = "tahitic_server::worker::health_monitor";

/// Default probe period (15 minutes).
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Outcome of a single liveness probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthProbeResult {
    /// When the probe finished.
    pub timestamp: Timestamp,
    /// Whether the database answered.
    pub ok: bool,
    /// Failure description, present only when `ok` is false.
    pub error_message: Option<String>,
}

impl HealthProbeResult {
    fn healthy() -> Self {
        Self {
            timestamp: Timestamp::now(),
            ok: true,
            error_message: None,
        }
    }

    fn unhealthy(error_message: impl Into<String>) -> Self {
        Self {
            timestamp: Timestamp::now(),
            ok: false,
            error_message: Some(error_message.into()),
        }
    }
}

impl fmt::Display for HealthProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_message {
            None => write!(f, "healthy at {}", self.timestamp),
            Some(message) => write!(f, "unhealthy at {}: {}", self.timestamp, message),
        }
    }
}

/// Database liveness worker.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    pg_client: PgClient,
    period: Duration,
}

impl HealthMonitor {
    /// Creates a monitor with the default period.
    pub fn new(pg_client: PgClient) -> Self {
        Self {
            pg_client,
            period: DEFAULT_HEALTH_CHECK_INTERVAL,
        }
    }

    /// Overrides the probe period.
    ///
    /// A zero period is raised to one second.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period.max(Duration::from_secs(1));
        self
    }

    /// Overrides the probe period with a sub-second value.
    #[cfg(test)]
    fn with_period_unchecked(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Returns the probe period.
    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Runs one probe and logs its outcome.
    ///
    /// Never fails: errors are folded into the returned result.
    pub async fn probe_once(&self) -> HealthProbeResult {
        let outcome = match self.pg_client.get_connection().await {
            Ok(mut conn) => conn.probe_liveness().await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(()) => {
                let result = HealthProbeResult::healthy();
                tracing::debug!(
                    target: TRACING_TARGET,
                    timestamp = %result.timestamp,
                    "Database liveness probe succeeded"
                );
                result
            }
            Err(err) => {
                let result = HealthProbeResult::unhealthy(err.to_string());
                tracing::error!(
                    target: TRACING_TARGET,
                    timestamp = %result.timestamp,
                    error = %err,
                    transient = err.is_transient(),
                    "Database liveness probe failed"
                );
                result
            }
        }
    }

    /// Probes every period until `cancel` fires.
    ///
    /// The first probe runs one period after the call. A probe that already
    /// started is allowed to finish; no new probe starts after cancellation.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            target: TRACING_TARGET,
            period_secs = self.period.as_secs_f64(),
            "Starting health monitor"
        );

        self.run_inner(cancel).await;

        tracing::info!(
            target: TRACING_TARGET,
            "Health monitor stopped"
        );
    }

    async fn run_inner(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(
                        target: TRACING_TARGET,
                        "Health monitor shutdown requested"
                    );
                    break;
                }
                _ = ticker.tick() => {}
            }

            // Outside the select so cancellation never interrupts a probe.
            let _ = self.probe_once().await;
        }
    }

    /// Spawns the monitor as a background task.
    ///
    /// The task runs inside the caller's current span.
    pub fn spawn(self) -> HealthMonitorHandle {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let join = tokio::spawn(
            async move { self.run(task_cancel).await }.in_current_span(),
        );

        HealthMonitorHandle { cancel, join }
    }
}

/// How a [`HealthMonitorHandle::stop`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The task observed cancellation and returned.
    Stopped,
    /// The task did not return in time and was aborted.
    Aborted,
    /// The task had already panicked or been aborted.
    Failed,
}

/// Handle to a spawned [`HealthMonitor`].
#[must_use = "dropping the handle leaves the monitor running"]
#[derive(Debug)]
pub struct HealthMonitorHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl HealthMonitorHandle {
    /// Returns the token that stops the monitor.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Returns whether the task is still running.
    pub fn is_running(&self) -> bool {
        !self.join.is_finished()
    }

    /// Cancels the monitor and waits up to `timeout` for it to return.
    ///
    /// A probe in flight gets the whole `timeout` to finish. Only a probe
    /// still stuck after that is aborted, so callers should pass a timeout
    /// longer than the pool's connection timeout.
    pub async fn stop(self, timeout: Duration) -> StopOutcome {
        self.cancel.cancel();

        let mut join = self.join;
        match tokio::time::timeout(timeout, &mut join).await {
            Ok(Ok(())) => StopOutcome::Stopped,
            Ok(Err(err)) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %err,
                    "Health monitor task failed"
                );
                StopOutcome::Failed
            }
            Err(_) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    timeout_ms = timeout.as_millis(),
                    "Health monitor did not stop in time, aborting"
                );
                join.abort();
                StopOutcome::Aborted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tahitic_postgres::{ConnectionConfig, PgConfig, PgPoolConfig};
    use tracing_test::traced_test;

    use super::*;

    fn unreachable_client() -> anyhow::Result<PgClient> {
        let config = PgConfig::new(ConnectionConfig::DiscreteFields {
            host: "127.0.0.1".into(),
            port: 1,
            user: "root".into(),
            password: "root".into(),
            database: "tahiticc".into(),
            tls_enabled: false,
        })
        .with_pool(PgPoolConfig::default().with_connection_timeout_secs(2));

        Ok(config.build()?)
    }

    #[tokio::test]
    async fn period_defaults_and_floor() -> anyhow::Result<()> {
        let monitor = HealthMonitor::new(unreachable_client()?);
        assert_eq!(monitor.period(), Duration::from_secs(900));

        let monitor = monitor.with_period(Duration::ZERO);
        assert_eq!(monitor.period(), Duration::from_secs(1));
        Ok(())
    }

    #[tokio::test]
    #[traced_test]
    async fn probe_failure_is_reported_not_raised() -> anyhow::Result<()> {
        let monitor = HealthMonitor::new(unreachable_client()?);

        let result = monitor.probe_once().await;
        assert!(!result.ok);
        assert!(result.error_message.is_some());
        assert!(result.to_string().starts_with("unhealthy"));
        assert!(logs_contain("Database liveness probe failed"));
        Ok(())
    }

    #[tokio::test]
    async fn probe_after_pool_closed_fails() -> anyhow::Result<()> {
        let pg_client = unreachable_client()?;
        pg_client.close();

        let result = HealthMonitor::new(pg_client).probe_once().await;
        assert!(!result.ok);
        assert!(result.error_message.unwrap_or_default().contains("closed"));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn stop_before_first_period_runs_no_probe() -> anyhow::Result<()> {
        let handle = HealthMonitor::new(unreachable_client()?).spawn();
        tokio::task::yield_now().await;
        assert!(handle.is_running());

        let outcome = handle.stop(Duration::from_secs(5)).await;
        assert_eq!(outcome, StopOutcome::Stopped);
        assert!(logs_contain("Health monitor stopped"));
        assert!(!logs_contain("liveness probe"));
        Ok(())
    }

    #[tokio::test]
    #[traced_test]
    async fn outage_keeps_monitor_alive() -> anyhow::Result<()> {
        let handle = HealthMonitor::new(unreachable_client()?)
            .with_period_unchecked(Duration::from_millis(20))
            .spawn();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(handle.is_running());

        let outcome = handle.stop(Duration::from_secs(5)).await;
        assert_eq!(outcome, StopOutcome::Stopped);
        assert!(logs_contain("Database liveness probe failed"));
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_token_stops_the_loop() -> anyhow::Result<()> {
        let handle = HealthMonitor::new(unreachable_client()?).spawn();
        handle.cancellation_token().cancel();

        let outcome = handle.stop(Duration::from_secs(1)).await;
        assert_eq!(outcome, StopOutcome::Stopped);
        Ok(())
    }

    /// Returns a client whose server accepts the TCP connection but never
    /// answers the startup message, so a lease hangs until the pool's
    /// one-second create timeout.
    fn silent_client(listener: &std::net::TcpListener) -> anyhow::Result<PgClient> {
        let port = listener.local_addr()?.port();
        let config = PgConfig::new(ConnectionConfig::DiscreteFields {
            host: "127.0.0.1".into(),
            port,
            user: "root".into(),
            password: "root".into(),
            database: "tahiticc".into(),
            tls_enabled: false,
        })
        .with_pool(PgPoolConfig::default().with_connection_timeout_secs(1));

        Ok(config.build()?)
    }

    #[tokio::test]
    #[traced_test]
    async fn in_flight_probe_finishes_within_grace_period() -> anyhow::Result<()> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let handle = HealthMonitor::new(silent_client(&listener)?)
            .with_period_unchecked(Duration::from_millis(20))
            .spawn();

        // Let the first probe start and block on the silent server.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!logs_contain("Database liveness probe failed"));

        let outcome = handle.stop(Duration::from_secs(5)).await;
        assert_eq!(outcome, StopOutcome::Stopped);
        assert!(logs_contain("Database liveness probe failed"));
        assert!(logs_contain("Health monitor stopped"));
        Ok(())
    }

    #[tokio::test]
    async fn stuck_probe_is_aborted_after_grace_period() -> anyhow::Result<()> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let handle = HealthMonitor::new(silent_client(&listener)?)
            .with_period_unchecked(Duration::from_millis(20))
            .spawn();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let outcome = handle.stop(Duration::from_millis(50)).await;
        assert_eq!(outcome, StopOutcome::Aborted);
        Ok(())
    }

    #[tokio::test]
    #[traced_test]
    async fn health_route_stays_up_during_outage() -> anyhow::Result<()> {
        let state = crate::handler::test::unreachable_state()?;
        let handle = HealthMonitor::new(state.postgres.clone())
            .with_period_unchecked(Duration::from_millis(20))
            .spawn();
        let server = axum_test::TestServer::new(crate::handler::routes(state))?;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(logs_contain("Database liveness probe failed"));
        assert!(handle.is_running());

        for path in ["/health", "/api/health"] {
            server.get(path).await.assert_status_ok();
        }

        assert_eq!(handle.stop(Duration::from_secs(5)).await, StopOutcome::Stopped);
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL instance"]
    async fn probe_succeeds_against_live_database() -> anyhow::Result<()> {
        let pg_client = PgConfig::from_env().build()?;
        let result = HealthMonitor::new(pg_client).probe_once().await;
        assert!(result.ok, "{result}");
        Ok(())
    }
}
