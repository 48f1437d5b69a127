//! Database query repositories.
//!
//! Each repository is a trait implemented for [`PgConnection`], so queries
//! run on a short-lived lease taken from the pool:
//!
//! ```rust,no_run
//! use tahitic_postgres::PgClient;
//! use tahitic_postgres::query::CatalogRepository;
//!
//! async fn tables(pg: &PgClient) -> tahitic_postgres::PgResult<Vec<String>> {
//!     let mut conn = pg.get_connection().await?;
//!     conn.list_public_tables().await
//! }
//! ```
//!
//! [`PgConnection`]: crate::PgConnection

mod catalog;
mod moderation;
mod monitor;

pub use catalog::CatalogRepository;
pub use moderation::{
    ImageModerationRow, ModerationRepository, ModerationSummary, TextModerationRow,
};
pub use monitor::MonitorRepository;
