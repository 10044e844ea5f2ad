//! Core types and the backend trait for distributed inventory locks.

pub mod capacity;
pub mod error;
pub mod lock;
pub mod prelude;
pub mod request;
pub mod stats;
pub mod traits;

pub use error::{LockError, LockResult};
pub use prelude::*;
