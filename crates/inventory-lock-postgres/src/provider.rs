//! PostgreSQL lock backend configuration.

use inventory_lock_core::capacity::CapacityTable;
use inventory_lock_core::error::{LockError, LockResult};
use sqlx::PgPool;

use crate::backend::PostgresLockBackend;
use crate::connection::PostgresConnection;
use crate::schema::ensure_schema;

/// Builder for the PostgreSQL lock backend.
pub struct PostgresLockBackendBuilder {
    connection: Option<PostgresConnection>,
    max_connections: u32,
    create_schema: bool,
    capacities: CapacityTable,
}

impl PostgresLockBackendBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            connection: None,
            max_connections: PostgresConnection::DEFAULT_MAX_CONNECTIONS,
            create_schema: false,
            capacities: CapacityTable::default(),
        }
    }

    /// Sets the PostgreSQL connection string.
    pub fn connection_string(mut self, conn_str: impl Into<String>) -> Self {
        self.connection = Some(PostgresConnection::ConnectionString(conn_str.into()));
        self
    }

    /// Sets an existing connection pool.
    pub fn pool(mut self, pool: PgPool) -> Self {
        self.connection = Some(PostgresConnection::Pool(pool));
        self
    }

    /// Pool size used when connecting from a connection string.
    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Creates the lock table on build if it is missing.
    pub fn create_schema(mut self, create_schema: bool) -> Self {
        self.create_schema = create_schema;
        self
    }

    /// Sets the capacity ceilings.
    pub fn capacities(mut self, capacities: CapacityTable) -> Self {
        self.capacities = capacities;
        self
    }

    /// Builds the backend.
    pub async fn build(self) -> LockResult<PostgresLockBackend> {
        let connection = self.connection.ok_or_else(|| {
            LockError::Configuration("no PostgreSQL connection string or pool provided".to_string())
        })?;

        let pool = connection.get_pool(self.max_connections).await?;
        if self.create_schema {
            ensure_schema(&pool).await?;
        }

        Ok(PostgresLockBackend::new(pool, self.capacities))
    }
}

impl Default for PostgresLockBackendBuilder {
    fn default() -> Self {
        Self::new()
    }
}
