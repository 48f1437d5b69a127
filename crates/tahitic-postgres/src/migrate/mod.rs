//! Schema bootstrap from a single SQL script.
//!
//! The script is located through a [`MigrationLocator`], loaded once into a
//! [`MigrationScript`] and executed by [`run_migration`], which returns the
//! resulting [`SchemaSnapshot`]:
//!
//! ```rust,no_run
//! use tahitic_postgres::PgClient;
//! use tahitic_postgres::migrate::{DeploymentMode, MigrationLocator, PgClientMigrationExt};
//!
//! async fn bootstrap(pg: &PgClient) -> Result<(), tahitic_postgres::MigrationError> {
//!     let locator = MigrationLocator::new(DeploymentMode::Production);
//!     let snapshot = pg.bootstrap_schema(&locator).await?;
//!     println!("{} tables", snapshot.len());
//!     Ok(())
//! }
//! ```
//!
//! There is no versioning: the script runs as a whole, outside a transaction,
//! and is not expected to be idempotent.

mod client_ext;
mod error;
mod locator;
mod runner;
mod script;

pub use client_ext::PgClientMigrationExt;
pub use error::MigrationError;
pub use locator::{DeploymentMode, MIGRATION_FILE_NAME, MigrationLocator};
pub use runner::{SchemaSnapshot, run_migration};
pub use script::MigrationScript;
