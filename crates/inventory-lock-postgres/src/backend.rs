//! PostgreSQL implementation of [`LockBackend`].

use std::collections::BTreeMap;
use std::time::Duration;

use sqlx::{PgPool, Row};
use tracing::{debug, info, instrument, warn};

use inventory_lock_core::capacity::CapacityTable;
use inventory_lock_core::error::LockResult;
use inventory_lock_core::lock::{InventoryLock, ResourceType};
use inventory_lock_core::request::LockRequest;
use inventory_lock_core::stats::LockStatistics;
use inventory_lock_core::traits::LockBackend;

use crate::connection::map_sqlx;
use crate::key::ResourceLockKey;
use crate::provider::PostgresLockBackendBuilder;
use crate::row::{LOCK_COLUMNS, duration_micros, duration_millis, lock_from_row};
use crate::schema;

const RESERVED_SQL: &str = "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM inventory_locks \
     WHERE resource = $1 AND resource_type = $2 \
     AND status = 'ACQUIRED' AND expires_at > clock_timestamp()";

const RELEASE_SQL: &str = "UPDATE inventory_locks SET status = 'RELEASED', updated_at = now() \
     WHERE lock_id = $1 AND owner = $2 AND status = 'ACQUIRED' AND expires_at > now()";

const EXTEND_SQL: &str = "UPDATE inventory_locks \
     SET expires_at = expires_at + $3::BIGINT * INTERVAL '1 microsecond', updated_at = now() \
     WHERE lock_id = $1 AND owner = $2 AND status = 'ACQUIRED' AND expires_at > now()";

const CLEANUP_SQL: &str = "UPDATE inventory_locks SET status = 'EXPIRED', updated_at = now() \
     WHERE status = 'ACQUIRED' AND expires_at <= now()";

const RELEASE_ALL_SQL: &str = "UPDATE inventory_locks SET status = 'RELEASED', updated_at = now() \
     WHERE owner = $1 AND status = 'ACQUIRED' AND expires_at > now()";

const STATS_SQL: &str = "SELECT \
     COUNT(*) FILTER (WHERE status = 'ACQUIRED' AND expires_at > now()) AS active_count, \
     COUNT(*) FILTER (WHERE status = 'EXPIRED' OR (status = 'ACQUIRED' AND expires_at <= now())) AS expired_count, \
     COALESCE(AVG(EXTRACT(EPOCH FROM (expires_at - acquired_at)) * 1000) \
         FILTER (WHERE status = 'ACQUIRED' AND expires_at > now()), 0)::BIGINT AS average_ms \
     FROM inventory_locks";

const STATS_BY_TYPE_SQL: &str = "SELECT resource_type, COUNT(*) AS active \
     FROM inventory_locks WHERE status = 'ACQUIRED' AND expires_at > now() \
     GROUP BY resource_type";

/// Store-backed lock backend.
///
/// Every lock is a row of `inventory_locks`; released and expired locks stay
/// behind with a terminal status. Expiry is enforced by `expires_at`
/// filters on every read and write, and
/// [`cleanup_expired`](LockBackend::cleanup_expired) only rewrites the status
/// of rows whose lease already ran out.
pub struct PostgresLockBackend {
    pool: PgPool,
    capacities: CapacityTable,
}

impl PostgresLockBackend {
    pub(crate) fn new(pool: PgPool, capacities: CapacityTable) -> Self {
        Self { pool, capacities }
    }

    /// Returns a new builder for configuring the backend.
    pub fn builder() -> PostgresLockBackendBuilder {
        PostgresLockBackendBuilder::new()
    }

    /// Creates a backend for the given connection string with default
    /// capacities, creating the lock table if needed.
    pub async fn connect(connection_string: impl Into<String>) -> LockResult<Self> {
        Self::builder()
            .connection_string(connection_string)
            .create_schema(true)
            .build()
            .await
    }

    /// Creates the lock table if it does not exist.
    pub async fn ensure_schema(&self) -> LockResult<()> {
        schema::ensure_schema(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_locks(
        &self,
        operation: &'static str,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> LockResult<Vec<InventoryLock>> {
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx(operation, e))?;
        rows.iter().map(lock_from_row).collect()
    }
}

impl LockBackend for PostgresLockBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn capacities(&self) -> &CapacityTable {
        &self.capacities
    }

    #[instrument(skip(self, request), fields(backend = "postgres", resource = %request.resource, resource_type = %request.resource_type, owner = %request.owner, quantity = request.quantity))]
    async fn acquire(&self, request: &LockRequest) -> LockResult<Option<InventoryLock>> {
        let capacity = self.capacities.capacity_for(&request.resource_type);
        let key = ResourceLockKey::new(&request.resource_type, &request.resource);

        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx("begin acquire", e))?;

        // Held until commit or rollback; serializes acquirers of this resource.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(key.value())
            .execute(&mut *transaction)
            .await
            .map_err(|e| map_sqlx("advisory lock", e))?;

        let reserved: i64 = sqlx::query_scalar(RESERVED_SQL)
            .bind(&request.resource)
            .bind(request.resource_type.to_string())
            .fetch_one(&mut *transaction)
            .await
            .map_err(|e| map_sqlx("capacity check", e))?;

        if reserved + i64::from(request.quantity) > i64::from(capacity) {
            transaction
                .rollback()
                .await
                .map_err(|e| map_sqlx("rollback acquire", e))?;
            debug!(reserved, capacity, "resource not available");
            return Ok(None);
        }

        let insert = format!(
            "WITH t AS (SELECT clock_timestamp() AS ts) \
             INSERT INTO inventory_locks (lock_id, resource, resource_type, owner, quantity, status, \
                 acquired_at, expires_at, timeout_ms, priority, metadata, owner_service) \
             SELECT $1, $2, $3, $4, $5, 'ACQUIRED', t.ts, t.ts + $6::BIGINT * INTERVAL '1 microsecond', \
                 $7, $8, $9, $10 \
             FROM t RETURNING {}",
            LOCK_COLUMNS
        );
        let lock_id = InventoryLock::generate_lock_id();
        let inserted = sqlx::query(&insert)
            .bind(&lock_id)
            .bind(&request.resource)
            .bind(request.resource_type.to_string())
            .bind(&request.owner)
            .bind(request.quantity as i32)
            .bind(duration_micros(request.timeout))
            .bind(duration_millis(request.timeout))
            .bind(request.priority)
            .bind(request.metadata.as_deref())
            .bind(request.owner_service.as_deref())
            .fetch_one(&mut *transaction)
            .await;

        let row = match inserted {
            Ok(row) => row,
            Err(e)
                if e.as_database_error()
                    .is_some_and(|db| db.is_unique_violation()) =>
            {
                warn!(lock_id = %lock_id, "lock id already present, refusing acquisition");
                return Ok(None);
            }
            Err(e) => return Err(map_sqlx("insert lock", e)),
        };
        let lock = lock_from_row(&row)?;

        transaction
            .commit()
            .await
            .map_err(|e| map_sqlx("commit acquire", e))?;

        info!(lock_id = %lock.lock_id, reserved, "acquired PostgreSQL lock");
        Ok(Some(lock))
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn release(&self, lock_id: &str, owner: &str) -> LockResult<bool> {
        let result = sqlx::query(RELEASE_SQL)
            .bind(lock_id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("release", e))?;

        let released = result.rows_affected() == 1;
        if released {
            info!("released PostgreSQL lock");
        } else {
            warn!("lock not found, expired or not owned by caller");
        }
        Ok(released)
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn extend(&self, lock_id: &str, owner: &str, additional: Duration) -> LockResult<bool> {
        let result = sqlx::query(EXTEND_SQL)
            .bind(lock_id)
            .bind(owner)
            .bind(duration_micros(additional))
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("extend", e))?;

        let extended = result.rows_affected() == 1;
        if extended {
            info!(additional_ms = duration_millis(additional), "extended PostgreSQL lock");
        } else {
            warn!("lock not found, expired or not owned by caller");
        }
        Ok(extended)
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn get(&self, lock_id: &str) -> LockResult<Option<InventoryLock>> {
        let sql = format!("SELECT {} FROM inventory_locks WHERE lock_id = $1", LOCK_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(lock_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("get lock", e))?;
        row.as_ref().map(lock_from_row).transpose()
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn locks_for_resource(
        &self,
        resource: &str,
        resource_type: &ResourceType,
    ) -> LockResult<Vec<InventoryLock>> {
        let sql = format!(
            "SELECT {} FROM inventory_locks \
             WHERE resource = $1 AND resource_type = $2 \
             AND status = 'ACQUIRED' AND expires_at > now() \
             ORDER BY acquired_at",
            LOCK_COLUMNS
        );
        let query = sqlx::query(&sql)
            .bind(resource)
            .bind(resource_type.to_string());
        self.fetch_locks("locks for resource", query).await
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn locks_by_owner(&self, owner: &str) -> LockResult<Vec<InventoryLock>> {
        let sql = format!(
            "SELECT {} FROM inventory_locks \
             WHERE owner = $1 AND status = 'ACQUIRED' AND expires_at > now() \
             ORDER BY acquired_at",
            LOCK_COLUMNS
        );
        let query = sqlx::query(&sql).bind(owner);
        self.fetch_locks("locks by owner", query).await
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn reserved_quantity(
        &self,
        resource: &str,
        resource_type: &ResourceType,
    ) -> LockResult<u64> {
        let reserved: i64 = sqlx::query_scalar(RESERVED_SQL)
            .bind(resource)
            .bind(resource_type.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx("reserved quantity", e))?;
        Ok(reserved.max(0) as u64)
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn cleanup_expired(&self) -> LockResult<u64> {
        let result = sqlx::query(CLEANUP_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("cleanup expired", e))?;

        let expired = result.rows_affected();
        if expired > 0 {
            info!(expired, "marked expired PostgreSQL locks");
        }
        Ok(expired)
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn release_all_by_owner(&self, owner: &str) -> LockResult<u64> {
        let result = sqlx::query(RELEASE_ALL_SQL)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("release all by owner", e))?;

        let released = result.rows_affected();
        if released > 0 {
            info!(released, "released PostgreSQL locks for owner");
        }
        Ok(released)
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn statistics(&self) -> LockResult<LockStatistics> {
        let totals = sqlx::query(STATS_SQL)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx("statistics", e))?;
        let active_count: i64 = totals
            .try_get("active_count")
            .map_err(|e| map_sqlx("statistics", e))?;
        let expired_count: i64 = totals
            .try_get("expired_count")
            .map_err(|e| map_sqlx("statistics", e))?;
        let average_ms: i64 = totals
            .try_get("average_ms")
            .map_err(|e| map_sqlx("statistics", e))?;

        let rows = sqlx::query(STATS_BY_TYPE_SQL)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx("statistics by type", e))?;
        let mut by_type = BTreeMap::new();
        for row in &rows {
            let resource_type: String = row
                .try_get("resource_type")
                .map_err(|e| map_sqlx("statistics by type", e))?;
            let active: i64 = row
                .try_get("active")
                .map_err(|e| map_sqlx("statistics by type", e))?;
            by_type.insert(ResourceType::from(resource_type), active.max(0) as u64);
        }

        Ok(LockStatistics {
            active_count: active_count.max(0) as u64,
            expired_count: expired_count.max(0) as u64,
            by_type,
            average_duration: Duration::from_millis(average_ms.max(0) as u64),
        })
    }
}
