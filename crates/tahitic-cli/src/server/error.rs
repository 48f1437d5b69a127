//! Startup error types with error codes and recovery suggestions.

use std::borrow::Cow;
use std::io;

use tahitic_postgres::error::ErrorHint;
use tahitic_postgres::{MigrationError, PgError};
use thiserror::Error;

use super::state::{InvalidTransition, ServerState};

/// Result type for lifecycle operations.
pub type StartupResult<T> = std::result::Result<T, StartupError>;

/// Fatal error raised while bringing the server up or serving.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The pool configuration was rejected while opening the pool.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The database could not be reached.
    #[error("Database connection failed: {0}")]
    Connection(#[source] PgError),

    /// The bootstrap script could not be located, loaded or executed.
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// Failed to bind to the specified address.
    #[error("Failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The HTTP server failed while serving.
    #[error("Runtime error: {0}")]
    Serve(#[source] io::Error),

    /// The lifecycle attempted a forbidden state change.
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

impl From<PgError> for StartupError {
    fn from(err: PgError) -> Self {
        match err {
            PgError::Config(message) => Self::Config(message),
            other => Self::Connection(other),
        }
    }
}

impl StartupError {
    /// Creates a bind error with address context.
    pub fn bind_error(address: impl ToString, source: io::Error) -> Self {
        Self::Bind {
            address: address.to_string(),
            source,
        }
    }

    /// Returns a unique error code for this error type.
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "E001",
            Self::Connection(_) => "E002",
            Self::Migration(_) => "E003",
            Self::Bind { .. } => "E004",
            Self::Serve(_) => "E005",
            Self::Transition(_) => "E006",
        }
    }

    /// Returns the lifecycle stage that failed.
    pub const fn stage(&self) -> ServerState {
        match self {
            Self::Config(_) | Self::Connection(_) => ServerState::Connecting,
            Self::Migration(MigrationError::Catalog(_)) => ServerState::Verifying,
            Self::Migration(_) => ServerState::Migrating,
            Self::Bind { .. } => ServerState::Verifying,
            Self::Serve(_) => ServerState::Listening,
            Self::Transition(err) => err.from,
        }
    }

    /// Provides a human-readable suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<Cow<'static, str>> {
        match self {
            Self::Config(_) => Some(Cow::Borrowed(
                "Check the command-line flags and environment variables, see --help",
            )),
            Self::Connection(err) => err.hint().or(Some(Cow::Borrowed(
                "Check DATABASE_URL or the DB_* variables and that PostgreSQL is running",
            ))),
            Self::Migration(err) => Some(err.hint()),
            Self::Bind { source, .. } => Some(Cow::Borrowed(match source.kind() {
                io::ErrorKind::PermissionDenied => {
                    "Try using a port above 1024 or run with appropriate privileges"
                }
                io::ErrorKind::AddrInUse => {
                    "The port is already in use. Try a different port or stop the conflicting service"
                }
                io::ErrorKind::AddrNotAvailable => {
                    "The address is not available. Check network interface configuration"
                }
                _ => "Check network configuration and firewall settings",
            })),
            Self::Serve(err) => match err.kind() {
                io::ErrorKind::PermissionDenied => {
                    Some(Cow::Borrowed("Check file and network permissions"))
                }
                _ => None,
            },
            Self::Transition(_) => None,
        }
    }
}
