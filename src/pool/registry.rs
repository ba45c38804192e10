//! Pool registry facade
//!
//! Maps each backend kind to its config, adapter, and pool manager. The
//! registry is an explicitly owned, long-lived object: construct it once at
//! startup from [`Config`] and inject it into data-access components. Each
//! kind's state and lock are fully independent, so one unreachable backend
//! never blocks or poisons another.

use super::manager::{PoolPhase, ResilientPool};
use super::PoolError;
use crate::backends::{
    BackendKind, CassandraAdapter, MariaAdapter, MongoAdapter, OracleAdapter,
};
use crate::config::Config;
use tracing::{info, warn};

/// Snapshot of one backend kind's pool state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub kind: BackendKind,
    pub phase: PoolPhase,
    pub consecutive_failures: u32,
}

/// Registry owning one resilient pool per configured backend kind
#[derive(Debug)]
pub struct PoolRegistry {
    cassandra: Option<ResilientPool<CassandraAdapter>>,
    maria: Option<ResilientPool<MariaAdapter>>,
    oracle: Option<ResilientPool<OracleAdapter>>,
    mongo: Option<ResilientPool<MongoAdapter>>,
}

impl PoolRegistry {
    /// Build the registry from configuration, validating every configured
    /// section up front
    pub fn from_config(config: &Config) -> Result<Self, PoolError> {
        if let Some(section) = &config.cassandra {
            section.validate()?;
        }
        if let Some(section) = &config.maria {
            section.validate()?;
        }
        if let Some(section) = &config.oracle {
            section.validate()?;
        }
        if let Some(section) = &config.mongo {
            section.validate()?;
        }

        let registry = Self {
            cassandra: config.cassandra.clone().map(|c| {
                ResilientPool::new(BackendKind::Cassandra, CassandraAdapter, c)
            }),
            maria: config
                .maria
                .clone()
                .map(|c| ResilientPool::new(BackendKind::Maria, MariaAdapter, c)),
            oracle: config
                .oracle
                .clone()
                .map(|c| ResilientPool::new(BackendKind::Oracle, OracleAdapter, c)),
            mongo: config
                .mongo
                .clone()
                .map(|c| ResilientPool::new(BackendKind::Mongo, MongoAdapter, c)),
        };

        info!(
            backends = ?registry.configured_kinds(),
            "pool registry ready"
        );

        Ok(registry)
    }

    /// Backend kinds with a configuration section
    pub fn configured_kinds(&self) -> Vec<BackendKind> {
        let mut kinds = Vec::new();
        if self.cassandra.is_some() {
            kinds.push(BackendKind::Cassandra);
        }
        if self.maria.is_some() {
            kinds.push(BackendKind::Maria);
        }
        if self.oracle.is_some() {
            kinds.push(BackendKind::Oracle);
        }
        if self.mongo.is_some() {
            kinds.push(BackendKind::Mongo);
        }
        kinds
    }

    /// Wide-column pool entry point
    pub fn cassandra(&self) -> Result<&ResilientPool<CassandraAdapter>, PoolError> {
        self.cassandra
            .as_ref()
            .ok_or(PoolError::Unconfigured(BackendKind::Cassandra))
    }

    /// Relational engine A pool entry point
    pub fn maria(&self) -> Result<&ResilientPool<MariaAdapter>, PoolError> {
        self.maria
            .as_ref()
            .ok_or(PoolError::Unconfigured(BackendKind::Maria))
    }

    /// Relational engine B pool entry point
    pub fn oracle(&self) -> Result<&ResilientPool<OracleAdapter>, PoolError> {
        self.oracle
            .as_ref()
            .ok_or(PoolError::Unconfigured(BackendKind::Oracle))
    }

    /// Document store pool entry point
    pub fn mongo(&self) -> Result<&ResilientPool<MongoAdapter>, PoolError> {
        self.mongo
            .as_ref()
            .ok_or(PoolError::Unconfigured(BackendKind::Mongo))
    }

    /// Record a transport failure observed while using the kind's handle.
    ///
    /// No-op for kinds without a configuration section.
    pub fn report_failure(&self, kind: BackendKind) {
        match kind {
            BackendKind::Cassandra => {
                if let Some(pool) = &self.cassandra {
                    pool.report_failure();
                }
            }
            BackendKind::Maria => {
                if let Some(pool) = &self.maria {
                    pool.report_failure();
                }
            }
            BackendKind::Oracle => {
                if let Some(pool) = &self.oracle {
                    pool.report_failure();
                }
            }
            BackendKind::Mongo => {
                if let Some(pool) = &self.mongo {
                    pool.report_failure();
                }
            }
        }
    }

    /// Record a successful operation, ending the kind's failure streak
    pub fn report_success(&self, kind: BackendKind) {
        match kind {
            BackendKind::Cassandra => {
                if let Some(pool) = &self.cassandra {
                    pool.report_success();
                }
            }
            BackendKind::Maria => {
                if let Some(pool) = &self.maria {
                    pool.report_success();
                }
            }
            BackendKind::Oracle => {
                if let Some(pool) = &self.oracle {
                    pool.report_success();
                }
            }
            BackendKind::Mongo => {
                if let Some(pool) = &self.mongo {
                    pool.report_success();
                }
            }
        }
    }

    /// Close every initialized pool and reset to the uninitialized state.
    ///
    /// For orderly process shutdown. Idempotent; close errors are logged
    /// and do not stop the iteration.
    pub async fn close_all(&self) {
        if let Some(pool) = &self.cassandra {
            if let Err(e) = pool.close().await {
                warn!(backend = %BackendKind::Cassandra, error = %e, "close failed");
            }
        }
        if let Some(pool) = &self.maria {
            if let Err(e) = pool.close().await {
                warn!(backend = %BackendKind::Maria, error = %e, "close failed");
            }
        }
        if let Some(pool) = &self.oracle {
            if let Err(e) = pool.close().await {
                warn!(backend = %BackendKind::Oracle, error = %e, "close failed");
            }
        }
        if let Some(pool) = &self.mongo {
            if let Err(e) = pool.close().await {
                warn!(backend = %BackendKind::Mongo, error = %e, "close failed");
            }
        }
    }

    /// Phase and failure-count snapshot for every configured kind
    pub async fn status(&self) -> Vec<PoolStatus> {
        let mut statuses = Vec::new();

        if let Some(pool) = &self.cassandra {
            statuses.push(PoolStatus {
                kind: BackendKind::Cassandra,
                phase: pool.phase().await,
                consecutive_failures: pool.consecutive_failures(),
            });
        }
        if let Some(pool) = &self.maria {
            statuses.push(PoolStatus {
                kind: BackendKind::Maria,
                phase: pool.phase().await,
                consecutive_failures: pool.consecutive_failures(),
            });
        }
        if let Some(pool) = &self.oracle {
            statuses.push(PoolStatus {
                kind: BackendKind::Oracle,
                phase: pool.phase().await,
                consecutive_failures: pool.consecutive_failures(),
            });
        }
        if let Some(pool) = &self.mongo {
            statuses.push(PoolStatus {
                kind: BackendKind::Mongo,
                phase: pool.phase().await,
                consecutive_failures: pool.consecutive_failures(),
            });
        }

        statuses
    }
}
