//! Lock table definition.

use inventory_lock_core::error::LockResult;
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::connection::map_sqlx;

pub const TABLE: &str = "inventory_locks";

/// Idempotent DDL for the lock table and its lookup indexes.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS inventory_locks (
    lock_id        TEXT        PRIMARY KEY,
    resource       TEXT        NOT NULL,
    resource_type  TEXT        NOT NULL,
    owner          TEXT        NOT NULL,
    quantity       INTEGER     NOT NULL CHECK (quantity > 0),
    status         TEXT        NOT NULL,
    acquired_at    TIMESTAMPTZ NOT NULL,
    expires_at     TIMESTAMPTZ NOT NULL,
    timeout_ms     BIGINT      NOT NULL,
    priority       INTEGER     NOT NULL DEFAULT 5,
    metadata       TEXT,
    owner_service  TEXT,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at     TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS inventory_locks_resource_idx
    ON inventory_locks (resource_type, resource, status, expires_at);

CREATE INDEX IF NOT EXISTS inventory_locks_owner_idx
    ON inventory_locks (owner, status);

CREATE INDEX IF NOT EXISTS inventory_locks_expiry_idx
    ON inventory_locks (status, expires_at);
"#;

/// Creates the lock table if it does not exist.
#[instrument(skip(pool), fields(backend = "postgres", table = TABLE))]
pub async fn ensure_schema(pool: &PgPool) -> LockResult<()> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx("schema setup", e))?;
    debug!("lock table ready");
    Ok(())
}
