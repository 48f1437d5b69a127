//! Schema catalog queries.

use std::future::Future;

use diesel::QueryableByName;
use diesel::sql_types::Text;
use diesel_async::RunQueryDsl;

use crate::{PgConnection, PgError, PgResult, TRACING_TARGET_QUERY};

const LIST_PUBLIC_TABLES: &str = "\
    SELECT table_name::text AS table_name \
    FROM information_schema.tables \
    WHERE table_schema = 'public' \
    ORDER BY table_name";

#[derive(QueryableByName)]
struct TableNameRow {
    #[diesel(sql_type = Text)]
    table_name: String,
}

/// Repository for reading the database catalog.
pub trait CatalogRepository {
    /// Lists the tables of the `public` schema, ordered by name.
    fn list_public_tables(&mut self) -> impl Future<Output = PgResult<Vec<String>>> + Send;
}

impl CatalogRepository for PgConnection {
    async fn list_public_tables(&mut self) -> PgResult<Vec<String>> {
        let rows: Vec<TableNameRow> = diesel::sql_query(LIST_PUBLIC_TABLES)
            .load(self)
            .await
            .map_err(PgError::from)?;

        tracing::debug!(
            target: TRACING_TARGET_QUERY,
            count = rows.len(),
            "Listed public tables"
        );

        Ok(rows.into_iter().map(|row| row.table_name).collect())
    }
}
