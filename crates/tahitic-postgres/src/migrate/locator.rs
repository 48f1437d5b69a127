//! Migration script discovery.
//!
//! [`MigrationLocator::candidates`] is a pure function of the deployment mode
//! and the directories it was built with; [`MigrationLocator::resolve`] adds a
//! single existence check per candidate.

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::MigrationError;
use crate::TRACING_TARGET_MIGRATION;

/// File name of the bootstrap script.
pub const MIGRATION_FILE_NAME: &str = "init-db.sql";

/// Absolute location of the script inside the container image.
const CONTAINER_SCRIPT_PATH: &str = "/app/scripts/init-db.sql";

/// Deployment layout the process runs in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::Display, strum::AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeploymentMode {
    /// Source checkout; the script lives under `migrations/`.
    #[default]
    Development,
    /// Packaged deployment; the script lives under `scripts/`.
    Production,
}

impl DeploymentMode {
    /// Parses a mode name; `production` and `prod` (any case) select
    /// [`DeploymentMode::Production`], everything else is development.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    #[inline]
    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for DeploymentMode {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_lenient(s))
    }
}

/// Computes and probes the locations where the migration script may reside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationLocator {
    mode: DeploymentMode,
    base_dir: PathBuf,
    exe_dir: Option<PathBuf>,
    workspace_dir: Option<PathBuf>,
    override_path: Option<PathBuf>,
}

impl MigrationLocator {
    /// Creates a locator rooted at the current working directory.
    ///
    /// The executable directory and the workspace the binary was built from
    /// are detected automatically.
    pub fn new(mode: DeploymentMode) -> Self {
        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        let workspace_dir = Path::new(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf);

        Self {
            mode,
            base_dir,
            exe_dir,
            workspace_dir,
            override_path: None,
        }
    }

    /// Replaces the base directory (the working directory by default).
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Replaces the executable directory.
    pub fn with_exe_dir(mut self, exe_dir: Option<PathBuf>) -> Self {
        self.exe_dir = exe_dir;
        self
    }

    /// Replaces the source workspace directory used in development.
    pub fn with_workspace_dir(mut self, workspace_dir: Option<PathBuf>) -> Self {
        self.workspace_dir = workspace_dir;
        self
    }

    /// Pins the script to a single path, disabling the search.
    ///
    /// Relative paths are taken relative to the base directory.
    pub fn with_override(mut self, path: Option<PathBuf>) -> Self {
        self.override_path = path;
        self
    }

    #[inline]
    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    /// Returns the candidate paths in priority order, without duplicates.
    pub fn candidates(&self) -> Vec<PathBuf> {
        if let Some(path) = &self.override_path {
            return vec![self.base_dir.join(path)];
        }

        let mut candidates = Vec::with_capacity(5);
        match self.mode {
            DeploymentMode::Development => {
                candidates.push(self.base_dir.join("migrations").join(MIGRATION_FILE_NAME));
                if let Some(workspace) = &self.workspace_dir {
                    candidates.push(workspace.join("migrations").join(MIGRATION_FILE_NAME));
                }
            }
            DeploymentMode::Production => {
                candidates.push(self.base_dir.join("scripts").join(MIGRATION_FILE_NAME));
                let parent = self
                    .base_dir
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.base_dir.join(".."));
                candidates.push(parent.join("scripts").join(MIGRATION_FILE_NAME));
                candidates.push(self.base_dir.join(MIGRATION_FILE_NAME));
                if let Some(exe_dir) = &self.exe_dir {
                    candidates.push(exe_dir.join("scripts").join(MIGRATION_FILE_NAME));
                }
                candidates.push(PathBuf::from(CONTAINER_SCRIPT_PATH));
            }
        }

        let mut unique: Vec<PathBuf> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if !unique.contains(&candidate) {
                unique.push(candidate);
            }
        }
        unique
    }

    /// Returns the first candidate that is an existing regular file.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::NotFound`] listing every candidate when none
    /// exists.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_MIGRATION, fields(mode = %self.mode))]
    pub fn resolve(&self) -> Result<PathBuf, MigrationError> {
        let candidates = self.candidates();

        for candidate in &candidates {
            if candidate.is_file() {
                tracing::info!(
                    target: TRACING_TARGET_MIGRATION,
                    path = %candidate.display(),
                    "Migration script located"
                );
                return Ok(candidate.clone());
            }

            tracing::debug!(
                target: TRACING_TARGET_MIGRATION,
                path = %candidate.display(),
                "Migration script not present at candidate path"
            );
        }

        tracing::error!(
            target: TRACING_TARGET_MIGRATION,
            searched = candidates.len(),
            "No migration script found"
        );

        Err(MigrationError::NotFound { candidates })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn production(base: &Path) -> MigrationLocator {
        MigrationLocator::new(DeploymentMode::Production)
            .with_base_dir(base)
            .with_exe_dir(None)
            .with_workspace_dir(None)
    }

    fn write_script(path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, "CREATE TABLE t (id int);")?;
        Ok(())
    }

    #[test]
    fn parses_mode_leniently() {
        assert_eq!(DeploymentMode::parse_lenient("production"), DeploymentMode::Production);
        assert_eq!(DeploymentMode::parse_lenient(" PROD "), DeploymentMode::Production);
        assert_eq!(DeploymentMode::parse_lenient("staging"), DeploymentMode::Development);
        assert_eq!(DeploymentMode::parse_lenient(""), DeploymentMode::Development);
        assert_eq!("Production".parse::<DeploymentMode>(), Ok(DeploymentMode::Production));
    }

    #[test]
    fn production_candidates_follow_priority_order() {
        let locator = production(Path::new("/srv/app"))
            .with_exe_dir(Some(PathBuf::from("/opt/bin")));

        assert_eq!(
            locator.candidates(),
            vec![
                PathBuf::from("/srv/app/scripts/init-db.sql"),
                PathBuf::from("/srv/scripts/init-db.sql"),
                PathBuf::from("/srv/app/init-db.sql"),
                PathBuf::from("/opt/bin/scripts/init-db.sql"),
                PathBuf::from("/app/scripts/init-db.sql"),
            ]
        );
    }

    #[test]
    fn duplicate_candidates_are_removed() {
        let locator = production(Path::new("/app")).with_exe_dir(Some(PathBuf::from("/app")));

        assert_eq!(
            locator.candidates(),
            vec![
                PathBuf::from("/app/scripts/init-db.sql"),
                PathBuf::from("/scripts/init-db.sql"),
                PathBuf::from("/app/init-db.sql"),
            ]
        );
    }

    #[test]
    fn development_candidates_include_workspace_copy() {
        let locator = MigrationLocator::new(DeploymentMode::Development)
            .with_base_dir("/home/dev/tahitic/crates/tahitic-cli")
            .with_workspace_dir(Some(PathBuf::from("/home/dev/tahitic")));

        assert_eq!(
            locator.candidates(),
            vec![
                PathBuf::from("/home/dev/tahitic/crates/tahitic-cli/migrations/init-db.sql"),
                PathBuf::from("/home/dev/tahitic/migrations/init-db.sql"),
            ]
        );
    }

    #[test]
    fn override_is_the_only_candidate() {
        let locator = production(Path::new("/srv/app"))
            .with_override(Some(PathBuf::from("sql/bootstrap.sql")));

        assert_eq!(
            locator.candidates(),
            vec![PathBuf::from("/srv/app/sql/bootstrap.sql")]
        );
    }

    #[test]
    fn resolves_first_existing_candidate() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let base = dir.path().join("app");
        fs::create_dir_all(&base)?;

        let sibling = dir.path().join("scripts").join(MIGRATION_FILE_NAME);
        let flat = base.join(MIGRATION_FILE_NAME);
        write_script(&sibling)?;
        write_script(&flat)?;

        let resolved = production(&base).resolve()?;
        assert_eq!(resolved, sibling);
        Ok(())
    }

    #[test]
    fn directories_are_not_scripts() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        fs::create_dir_all(dir.path().join("scripts").join(MIGRATION_FILE_NAME))?;
        let flat = dir.path().join(MIGRATION_FILE_NAME);
        write_script(&flat)?;

        let resolved = production(dir.path()).resolve()?;
        assert_eq!(resolved, flat);
        Ok(())
    }

    #[test]
    fn missing_script_lists_all_candidates() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let base = dir.path().join("empty");
        fs::create_dir_all(&base)?;

        let locator = production(&base);
        match locator.resolve() {
            Err(MigrationError::NotFound { candidates }) => {
                assert_eq!(candidates, locator.candidates());
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
        Ok(())
    }
}
