//! Loading of the bootstrap script.

use std::io;
use std::path::{Path, PathBuf};

use super::MigrationError;
use crate::TRACING_TARGET_MIGRATION;

/// A migration script read into memory.
///
/// Loaded once per process and consumed by [`run_migration`].
///
/// [`run_migration`]: super::run_migration
#[derive(Clone, PartialEq, Eq)]
#[must_use = "a loaded migration script should be executed"]
pub struct MigrationScript {
    resolved_path: PathBuf,
    raw_content: String,
}

impl MigrationScript {
    /// Reads the script at `path`.
    ///
    /// # Errors
    ///
    /// - [`MigrationError::NotFound`] if the file disappeared since it was
    ///   located.
    /// - [`MigrationError::Read`] for any other I/O failure, including
    ///   content that is not UTF-8.
    /// - [`MigrationError::Empty`] if the file holds only whitespace.
    #[tracing::instrument(skip(path), target = TRACING_TARGET_MIGRATION, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, MigrationError> {
        let raw_content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(MigrationError::NotFound {
                    candidates: vec![path.to_path_buf()],
                });
            }
            Err(source) => {
                return Err(MigrationError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        Self::from_content(path, raw_content)
    }

    /// Wraps script content that was obtained elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Empty`] if the content is blank.
    pub fn from_content(
        path: impl Into<PathBuf>,
        raw_content: impl Into<String>,
    ) -> Result<Self, MigrationError> {
        let resolved_path = path.into();
        let raw_content = raw_content.into();

        if raw_content.trim().is_empty() {
            return Err(MigrationError::Empty {
                path: resolved_path,
            });
        }

        tracing::debug!(
            target: TRACING_TARGET_MIGRATION,
            path = %resolved_path.display(),
            bytes = raw_content.len(),
            "Migration script loaded"
        );

        Ok(Self {
            resolved_path,
            raw_content,
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.resolved_path
    }

    #[inline]
    pub fn content(&self) -> &str {
        &self.raw_content
    }

    /// Size of the script in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.raw_content.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw_content.is_empty()
    }
}

impl std::fmt::Debug for MigrationScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationScript")
            .field("resolved_path", &self.resolved_path)
            .field("bytes", &self.raw_content.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn loads_script_content() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("init-db.sql");
        std::fs::write(&path, "CREATE TABLE lugares (id serial);\n")?;

        let script = MigrationScript::load(&path).await?;
        assert_eq!(script.path(), path);
        assert!(script.content().starts_with("CREATE TABLE lugares"));
        Ok(())
    }

    #[tokio::test]
    async fn vanished_file_is_not_found() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("init-db.sql");

        let error = MigrationScript::load(&path).await.unwrap_err();
        assert!(error.is_not_found());
        assert_eq!(error.path(), Some(path.as_path()));
        Ok(())
    }

    #[tokio::test]
    async fn whitespace_only_script_is_empty() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("init-db.sql");
        std::fs::write(&path, " \n\t\n")?;

        let error = MigrationScript::load(&path).await.unwrap_err();
        assert!(matches!(error, MigrationError::Empty { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn non_utf8_script_is_a_read_error() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("init-db.sql");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x41])?;

        let error = MigrationScript::load(&path).await.unwrap_err();
        assert!(matches!(error, MigrationError::Read { .. }));
        Ok(())
    }

    #[test]
    fn debug_omits_content() -> anyhow::Result<()> {
        let script = MigrationScript::from_content("init-db.sql", "DROP TABLE secrets;")?;
        assert!(!format!("{script:?}").contains("DROP"));
        Ok(())
    }
}
