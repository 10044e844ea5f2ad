//! Connection pool management and error mapping.

use std::time::Duration;

use inventory_lock_core::error::{LockError, LockResult};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// PostgreSQL connection source.
#[derive(Debug, Clone)]
pub enum PostgresConnection {
    /// Connection string; the backend owns the pool.
    ConnectionString(String),
    /// Pool owned by the caller.
    Pool(PgPool),
}

impl PostgresConnection {
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a pool from a connection string.
    pub async fn create_pool(connection_string: &str, max_connections: u32) -> LockResult<PgPool> {
        PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Self::ACQUIRE_TIMEOUT)
            .connect(connection_string)
            .await
            .map_err(|e| {
                LockError::Connection(Box::new(std::io::Error::other(format!(
                    "failed to connect to PostgreSQL: {}",
                    e
                ))))
            })
    }

    /// Gets or creates a connection pool.
    pub async fn get_pool(&self, max_connections: u32) -> LockResult<PgPool> {
        match self {
            Self::ConnectionString(conn_str) => Self::create_pool(conn_str, max_connections).await,
            Self::Pool(pool) => Ok(pool.clone()),
        }
    }
}

/// Maps a driver error, telling pool and transport faults apart from
/// statement failures.
pub(crate) fn map_sqlx(operation: &str, error: sqlx::Error) -> LockError {
    let message = format!("PostgreSQL {} failed: {}", operation, error);
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => {
            LockError::Connection(Box::new(std::io::Error::other(message)))
        }
        _ => LockError::Backend(Box::new(std::io::Error::other(message))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_map_to_connection() {
        let err = map_sqlx("acquire", sqlx::Error::PoolTimedOut);
        assert!(matches!(err, LockError::Connection(_)));
        assert!(err.to_string().contains("acquire"));
    }

    #[test]
    fn test_statement_errors_map_to_backend() {
        let err = map_sqlx("release", sqlx::Error::RowNotFound);
        assert!(matches!(err, LockError::Backend(_)));
        assert!(err.is_infrastructure());
    }
}
