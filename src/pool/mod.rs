//! Resilient pool lifecycle module
//!
//! This module provides:
//! - Lazy, concurrency-safe singleton pool creation per backend kind
//! - Consecutive-failure tracking with threshold-triggered rebuilds
//! - A registry facade mapping backend kinds to their pools
//! - Caller-driven recovery with no background retry machinery

pub mod manager;
pub mod registry;

use crate::backends::BackendKind;

pub use manager::{PoolPhase, ResilientPool};
pub use registry::{PoolRegistry, PoolStatus};

/// Pool lifecycle error types
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Malformed or missing connection parameters; fatal for the backend
    /// kind until the configuration is corrected
    #[error("Invalid backend configuration: {0}")]
    Config(String),

    /// Transport or auth failure while opening a client; the next getter
    /// call retries from scratch
    #[error("Failed to connect to backend: {0}")]
    Connect(String),

    /// A liveness probe or in-flight transport failure; accumulates toward
    /// the failure threshold
    #[error("Liveness probe failed: {0}")]
    Liveness(String),

    /// Connect failed during a threshold-triggered rebuild; the pool is left
    /// uninitialized for the next caller to retry
    #[error("Pool rebuild failed: {0}")]
    Rebuild(String),

    /// The backend kind has no configuration section
    #[error("Backend not configured: {0}")]
    Unconfigured(BackendKind),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
