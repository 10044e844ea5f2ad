//! Reserves a hotel stay for a saga, extends it, then compensates.
//!
//! ```text
//! INVENTORY_LOCK_PROVIDER=cache REDIS_URL=redis://localhost:6379 \
//!     RUST_LOG=info cargo run --example saga_reservation
//! ```

use std::sync::Arc;
use std::time::Duration;

use inventory_lock::{LockManager, LockSpec, LockSweeper, ManagerConfig, SagaLocks};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ManagerConfig::from_env()?;
    let manager = Arc::new(LockManager::from_config(&config).await?);
    let sweeper = LockSweeper::spawn(manager.clone(), config.sweep_interval());
    let saga = SagaLocks::new(manager.clone());

    let saga_id = format!("saga-{}", std::process::id());
    let specs = [
        LockSpec::hotel("HTL-42", 2),
        LockSpec::hotel_rooms("HTL-42", "DELUXE", 2),
    ];

    match saga.acquire_all(&saga_id, &specs).await? {
        Some(locks) => {
            for lock in &locks {
                println!(
                    "{} holds {} x {} until {}",
                    saga_id, lock.quantity, lock.resource, lock.expires_at
                );
            }
            saga.extend_all(&saga_id, Duration::from_secs(120)).await?;
            println!("statistics: {:?}", manager.get_lock_statistics().await?);
            println!("released {} locks", saga.compensate(&saga_id).await?);
        }
        None => println!("HTL-42 is sold out"),
    }

    sweeper.shutdown().await;
    Ok(())
}
