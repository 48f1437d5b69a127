//! Staged startup and shutdown of the server.
//!
//! ```text
//! Starting -> Connecting -> Migrating -> Verifying -> Listening -> Stopping -> Stopped
//! ```
//!
//! Each stage gates the next. Any failure jumps to `Stopping`, where the same
//! teardown runs as after a termination signal.

use std::time::Instant;

use tahitic_postgres::migrate::PgClientMigrationExt;
use tahitic_postgres::{MigrationScript, PgClient, SchemaSnapshot};
use tahitic_server::service::ServiceState;
use tahitic_server::worker::HealthMonitor;

use super::http_server::{bind, create_router, serve};
use super::{
    ServerState, ShutdownCoordinator, ShutdownSignal, StartupResult, StateTracker,
    TRACING_TARGET_SHUTDOWN, TRACING_TARGET_STARTUP, monitor_stop_timeout,
};
use crate::config::{Cli, DatabaseConfig, DeploymentConfig};

/// Drives one process run through every [`ServerState`].
#[derive(Debug)]
pub struct ServerLifecycle {
    cli: Cli,
    tracker: StateTracker,
    signal: ShutdownSignal,
    coordinator: ShutdownCoordinator,
}

impl ServerLifecycle {
    pub fn new(cli: Cli) -> Self {
        let coordinator = ShutdownCoordinator::new()
            .with_monitor_timeout(monitor_stop_timeout(&cli.database.pool));

        Self {
            cli,
            tracker: StateTracker::new(),
            signal: ShutdownSignal::new(),
            coordinator,
        }
    }

    /// Returns the state tracker, for subscribing to stage changes.
    #[cfg(test)]
    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    /// Returns a handle that stops the server when triggered.
    #[cfg(test)]
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    /// Runs startup, serves until a termination signal, then tears down.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error. The pool is closed before returning on
    /// every path.
    pub async fn run(&self) -> StartupResult<()> {
        let start_time = Instant::now();
        let result = self.start_and_serve().await;
        let reached = self.tracker.current();

        let reason = match &result {
            Ok(()) if self.signal.is_triggered() => "termination signal",
            Ok(()) => "server stopped",
            Err(_) => "fatal error",
        };

        self.enter(ServerState::Stopping);
        self.coordinator.teardown(reason).await;
        self.enter(ServerState::Stopped);

        let uptime_secs = start_time.elapsed().as_secs();
        tracing::debug!(
            target: TRACING_TARGET_SHUTDOWN,
            path = %self.tracker.path(),
            "Lifecycle transitions"
        );

        match &result {
            Ok(()) => {
                tracing::info!(
                    target: TRACING_TARGET_SHUTDOWN,
                    state = %self.tracker.current(),
                    uptime_secs,
                    "Shutdown completed"
                );
            }
            Err(err) => {
                tracing::error!(
                    target: TRACING_TARGET_SHUTDOWN,
                    error = %err,
                    code = err.error_code(),
                    stage = %err.stage(),
                    reached = %reached,
                    uptime_secs,
                    "Startup aborted"
                );
            }
        }

        result
    }

    async fn start_and_serve(&self) -> StartupResult<()> {
        self.tracker.transition(ServerState::Connecting)?;
        let pg_client = connect(&self.cli.database, &self.coordinator).await?;

        self.tracker.transition(ServerState::Migrating)?;
        let snapshot = migrate(&pg_client, &self.cli.deployment).await?;

        self.tracker.transition(ServerState::Verifying)?;
        tracing::info!(
            target: TRACING_TARGET_STARTUP,
            total = snapshot.len(),
            tables = %snapshot,
            "Database tables"
        );

        let listener = bind(&self.cli.server).await?;
        let router = create_router(ServiceState::new(pg_client.clone()), &self.cli.middleware);

        let monitor = HealthMonitor::new(pg_client)
            .with_period(self.cli.deployment.health_check_interval())
            .spawn();
        self.coordinator.arm_monitor(monitor);
        self.coordinator.arm_signal_listener(self.signal.listen_os_signals());

        self.tracker.transition(ServerState::Listening)?;
        tracing::info!(
            target: TRACING_TARGET_STARTUP,
            addr = %self.cli.server.server_addr(),
            environment = %self.cli.deployment.environment,
            version = env!("CARGO_PKG_VERSION"),
            "Server is ready and listening for connections"
        );

        serve(listener, router, &self.signal).await
    }

    /// Moves to a shutdown state; a rejected move is already logged.
    fn enter(&self, state: ServerState) {
        let _ = self.tracker.transition(state);
    }
}

/// Opens the pool and checks that the database answers.
///
/// The pool is handed to `coordinator` as soon as it exists so a failed
/// connectivity check still closes it.
async fn connect(
    database: &DatabaseConfig,
    coordinator: &ShutdownCoordinator,
) -> StartupResult<PgClient> {
    let pg_config = database.pg_config();
    tracing::info!(
        target: TRACING_TARGET_STARTUP,
        database_url = %pg_config.database_url_masked(),
        "Connecting to database"
    );

    let pg_client = pg_config.build()?;
    coordinator.attach_pool(pg_client.clone());
    pg_client.verify_connectivity().await?;

    tracing::info!(
        target: TRACING_TARGET_STARTUP,
        "Connected to database"
    );

    Ok(pg_client)
}

/// Locates, loads and executes the bootstrap script.
async fn migrate(
    pg_client: &PgClient,
    deployment: &DeploymentConfig,
) -> StartupResult<SchemaSnapshot> {
    let locator = deployment.locator();
    let path = locator.resolve()?;
    let script = MigrationScript::load(&path).await?;

    tracing::info!(
        target: TRACING_TARGET_STARTUP,
        path = %script.path().display(),
        bytes = script.len(),
        "Executing migration script"
    );

    let snapshot = pg_client.run_migration_script(script).await?;
    Ok(snapshot)
}

/// Applies the bootstrap script once and releases the pool.
///
/// # Errors
///
/// Returns the first failure among connection, location, loading and
/// execution.
pub async fn migrate_once(cli: &Cli) -> StartupResult<SchemaSnapshot> {
    migrate_with(cli, &ShutdownCoordinator::new()).await
}

async fn migrate_with(
    cli: &Cli,
    coordinator: &ShutdownCoordinator,
) -> StartupResult<SchemaSnapshot> {
    let result = async {
        let pg_client = connect(&cli.database, coordinator).await?;
        migrate(&pg_client, &cli.deployment).await
    }
    .await;

    let reason = match &result {
        Ok(_) => "migration completed",
        Err(_) => "migration failed",
    };
    coordinator.teardown(reason).await;

    if let Ok(snapshot) = &result {
        tracing::info!(
            target: TRACING_TARGET_STARTUP,
            total = snapshot.len(),
            tables = %snapshot,
            "Migration applied"
        );
    }

    result
}
