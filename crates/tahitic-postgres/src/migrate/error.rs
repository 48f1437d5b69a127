use std::borrow::Cow;
use std::io;
use std::path::{Path, PathBuf};

use crate::PgError;
use crate::error::ErrorHint;

/// Errors raised while locating, loading or executing the migration script.
#[derive(Debug, thiserror::Error)]
#[must_use = "migration errors should be handled appropriately"]
pub enum MigrationError {
    /// No candidate location holds the script.
    #[error("Migration script not found, searched: {}", join_paths(.candidates))]
    NotFound { candidates: Vec<PathBuf> },

    /// The script exists but could not be read.
    #[error("Failed to read migration script {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The script holds no statements.
    #[error("Migration script {} is empty", .path.display())]
    Empty { path: PathBuf },

    /// The database rejected the script.
    #[error("Migration script execution failed: {0}")]
    Execution(#[source] PgError),

    /// The schema could not be listed after a successful execution.
    #[error("Failed to list tables after migration: {0}")]
    Catalog(#[source] PgError),
}

impl MigrationError {
    /// Returns whether no script could be found.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns the script path involved, when the error concerns one file.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Read { path, .. } | Self::Empty { path } => Some(path),
            Self::NotFound { candidates } if candidates.len() == 1 => {
                candidates.first().map(PathBuf::as_path)
            }
            _ => None,
        }
    }
}

impl ErrorHint for MigrationError {
    fn hint(&self) -> Cow<'static, str> {
        match self {
            Self::NotFound { .. } => Cow::Borrowed(
                "Place init-db.sql in one of the searched locations or set MIGRATION_SCRIPT",
            ),
            Self::Read { .. } => {
                Cow::Borrowed("Check the file permissions and that the script is valid UTF-8")
            }
            Self::Empty { .. } => Cow::Borrowed("The migration script must contain SQL statements"),
            Self::Execution(_) => Cow::Borrowed(
                "The script is not idempotent; a second run against a migrated schema fails",
            ),
            Self::Catalog(err) => err
                .hint()
                .unwrap_or(Cow::Borrowed("Check the database connection")),
        }
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
