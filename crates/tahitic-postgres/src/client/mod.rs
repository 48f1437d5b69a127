//! PostgreSQL client with connection pooling.
//!
//! Resolves connection parameters from the environment, opens the shared
//! deadpool pool of diesel-async connections and owns its single close.

mod connection;
pub(crate) mod custom_hooks;
mod pg_client;
mod pg_config;
mod tls;

use deadpool::managed::{Object, Pool};
use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;

pub use connection::{
    ConnectionArgs, ConnectionConfig, DATABASE_URL_VAR, DB_HOST_VAR, DB_NAME_VAR,
    DB_PASSWORD_VAR, DB_PORT_VAR, DB_USER_VAR, TlsPolicy,
};
pub use pg_client::{PgClient, PgConn, PgPoolStatus};
pub use pg_config::{PgConfig, PgPoolConfig};

/// Type alias for the connection pool used throughout the application.
pub type ConnectionPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Type alias for a connection object from the pool.
pub type PooledConnection = Object<AsyncDieselConnectionManager<AsyncPgConnection>>;
