//! Termination signals and the single teardown routine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tahitic_postgres::{PgClient, PgPoolConfig};
use tahitic_server::worker::{HealthMonitorHandle, StopOutcome};
#[cfg(unix)]
use tokio::signal::unix;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::TRACING_TARGET_SHUTDOWN;

/// How long teardown waits for an in-flight health probe, on top of the
/// pool's connection timeout.
pub const MONITOR_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Returns the grace period given to an in-flight health probe.
///
/// A probe is bounded by the pool's connection timeout while it waits for a
/// lease, so the grace period covers that wait plus [`MONITOR_STOP_TIMEOUT`].
pub fn monitor_stop_timeout(pool: &PgPoolConfig) -> Duration {
    MONITOR_STOP_TIMEOUT + pool.connection_timeout().unwrap_or_default()
}

/// A one-shot shutdown request shared between signal listeners and the
/// serving loop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
    triggered: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown.
    ///
    /// Returns `true` only for the first request; later requests are logged
    /// and ignored.
    pub fn trigger(&self, reason: &str) -> bool {
        if self.triggered.swap(true, Ordering::AcqRel) {
            tracing::warn!(
                target: TRACING_TARGET_SHUTDOWN,
                reason,
                "Shutdown already in progress, ignoring duplicate request"
            );
            return false;
        }

        tracing::info!(
            target: TRACING_TARGET_SHUTDOWN,
            reason,
            "Received shutdown request, initiating shutdown"
        );
        self.token.cancel();
        true
    }

    /// Returns whether shutdown was requested.
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    /// Completes once shutdown was requested.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }

    /// Forwards SIGINT (Ctrl+C) and, on unix, SIGTERM into [`trigger`].
    ///
    /// The listener keeps running after the first signal so duplicates are
    /// reported instead of falling back to the default handler. A handler
    /// that cannot be installed is logged and the other one keeps working.
    ///
    /// [`trigger`]: ShutdownSignal::trigger
    pub fn listen_os_signals(&self) -> JoinHandle<()> {
        let signal = self.clone();

        tokio::spawn(async move {
            #[cfg(unix)]
            let mut terminate = match unix::signal(unix::SignalKind::terminate()) {
                Ok(stream) => Some(stream),
                Err(err) => {
                    tracing::error!(
                        target: TRACING_TARGET_SHUTDOWN,
                        error = %err,
                        "Failed to install SIGTERM handler"
                    );
                    None
                }
            };
            #[cfg(not(unix))]
            let mut terminate = ();

            let mut ctrl_c_installed = true;
            loop {
                let reason = tokio::select! {
                    result = tokio::signal::ctrl_c(), if ctrl_c_installed => match result {
                        Ok(()) => "SIGINT",
                        Err(err) => {
                            tracing::error!(
                                target: TRACING_TARGET_SHUTDOWN,
                                error = %err,
                                "Failed to install Ctrl+C handler"
                            );
                            ctrl_c_installed = false;
                            continue;
                        }
                    },
                    () = recv_terminate(&mut terminate) => "SIGTERM",
                };

                signal.trigger(reason);
            }
        })
    }
}

#[cfg(unix)]
async fn recv_terminate(stream: &mut Option<unix::Signal>) {
    let received = match stream.as_mut() {
        Some(stream) => stream.recv().await.is_some(),
        None => false,
    };

    if !received {
        *stream = None;
        std::future::pending::<()>().await;
    }
}

#[cfg(not(unix))]
async fn recv_terminate(_: &mut ()) {
    std::future::pending::<()>().await;
}

/// Runs the teardown exactly once: stop the health monitor, close the pool,
/// then stop listening for signals.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    torn_down: AtomicBool,
    pg_client: Mutex<Option<PgClient>>,
    monitor: Mutex<Option<HealthMonitorHandle>>,
    signal_listener: Mutex<Option<JoinHandle<()>>>,
    monitor_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            torn_down: AtomicBool::new(false),
            pg_client: Mutex::new(None),
            monitor: Mutex::new(None),
            signal_listener: Mutex::new(None),
            monitor_timeout: MONITOR_STOP_TIMEOUT,
        }
    }

    /// Sets how long teardown waits for an in-flight health probe.
    pub fn with_monitor_timeout(mut self, timeout: Duration) -> Self {
        self.monitor_timeout = timeout;
        self
    }

    /// Registers the pool closed by teardown.
    pub fn attach_pool(&self, pg_client: PgClient) {
        *lock(&self.pg_client) = Some(pg_client);
    }

    /// Registers the health monitor stopped by teardown.
    pub fn arm_monitor(&self, handle: HealthMonitorHandle) {
        *lock(&self.monitor) = Some(handle);
    }

    /// Registers the OS signal listener stopped at the end of teardown.
    pub fn arm_signal_listener(&self, handle: JoinHandle<()>) {
        *lock(&self.signal_listener) = Some(handle);
    }

    /// Returns whether teardown already ran.
    #[cfg(test)]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    /// Returns the registered pool, closed or not.
    #[cfg(test)]
    pub fn attached_pool(&self) -> Option<PgClient> {
        lock(&self.pg_client).clone()
    }

    /// Releases every resource acquired during startup.
    ///
    /// Returns `false`, without doing anything, when teardown already ran.
    pub async fn teardown(&self, reason: &str) -> bool {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            tracing::debug!(
                target: TRACING_TARGET_SHUTDOWN,
                reason,
                "Teardown already completed"
            );
            return false;
        }

        tracing::info!(
            target: TRACING_TARGET_SHUTDOWN,
            reason,
            "Tearing down"
        );

        let monitor = lock(&self.monitor).take();
        if let Some(handle) = monitor {
            let outcome = handle.stop(self.monitor_timeout).await;
            tracing::debug!(
                target: TRACING_TARGET_SHUTDOWN,
                outcome = ?outcome,
                "Health monitor stopped"
            );
            if outcome != StopOutcome::Stopped {
                tracing::warn!(
                    target: TRACING_TARGET_SHUTDOWN,
                    outcome = ?outcome,
                    "Health monitor did not stop cleanly"
                );
            }
        }

        // The handle stays registered; a closed pool rejects every lease.
        let pg_client = lock(&self.pg_client).clone();
        match pg_client {
            Some(pg_client) => {
                pg_client.close();
            }
            None => {
                tracing::debug!(
                    target: TRACING_TARGET_SHUTDOWN,
                    "No connection pool to close"
                );
            }
        }

        if let Some(listener) = lock(&self.signal_listener).take() {
            listener.abort();
        }

        tracing::info!(
            target: TRACING_TARGET_SHUTDOWN,
            reason,
            "Teardown completed"
        );

        true
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
