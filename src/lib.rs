//! dbpool - resilient connection-pool lifecycle management for heterogeneous
//! database backends

pub mod backends;
pub mod config;
pub mod pool;

pub use backends::BackendKind;
pub use config::{Config, PoolConfig};
pub use pool::{PoolError, PoolRegistry, ResilientPool};
