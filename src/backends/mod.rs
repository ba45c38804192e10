//! Backend client adapters
//!
//! Each supported backend kind implements [`BackendAdapter`]: a small closed
//! capability interface (connect / ping / close) the pool manager drives
//! without ever inspecting the client's internals. Adapters translate the
//! generic [`PoolConfig`] into backend-specific connection parameters and
//! own every network call, each bounded by an explicit timeout.

use crate::config::PoolConfig;
use crate::pool::PoolError;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

pub mod cassandra;
pub mod maria;
pub mod mongo;
pub mod oracle;

pub use cassandra::{CassandraAdapter, CassandraSession};
pub use maria::{MariaAdapter, MariaPool};
pub use mongo::{MongoAdapter, MongoClient};
pub use oracle::{OracleAdapter, OraclePool};

/// The four supported storage systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Wide-column store
    Cassandra,
    /// Relational engine A
    Maria,
    /// Relational engine B
    Oracle,
    /// Document store
    Mongo,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Cassandra => "cassandra",
            BackendKind::Maria => "maria",
            BackendKind::Oracle => "oracle",
            BackendKind::Mongo => "mongo",
        }
    }

    /// Default wire port when a host entry carries none
    pub fn default_port(&self) -> u16 {
        match self {
            BackendKind::Cassandra => 9042,
            BackendKind::Maria => 3306,
            BackendKind::Oracle => 1521,
            BackendKind::Mongo => 27017,
        }
    }

    pub const ALL: [BackendKind; 4] = [
        BackendKind::Cassandra,
        BackendKind::Maria,
        BackendKind::Oracle,
        BackendKind::Mongo,
    ];
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability interface between the pool manager and one backend kind.
///
/// The manager treats `Client` as opaque: it only ever asks the adapter to
/// connect, ping, or close. Adapters must not retry internally - connect
/// failures surface to the caller of the pool getter, whose next call is
/// itself the retry.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Opaque connection/session handle produced by `connect`
    type Client: Send + Sync + 'static;

    /// Open a ready-to-use client for this backend.
    ///
    /// Bounded by `config.connect_timeout()`.
    async fn connect(&self, config: &PoolConfig) -> Result<Self::Client, PoolError>;

    /// Lightweight liveness probe, bounded by `config.ping_timeout()` at
    /// connect time so a hung backend cannot stall the manager.
    async fn ping(&self, client: &Self::Client) -> Result<(), PoolError>;

    /// Release underlying resources. Idempotent: closing an already-closed
    /// handle is a no-op, not an error.
    async fn close(&self, client: &Self::Client) -> Result<(), PoolError>;
}

/// Normalize a configured host entry to `host:port`
pub(crate) fn endpoint_addr(host: &str, config: &PoolConfig, kind: BackendKind) -> String {
    if host.contains(':') {
        host.to_string()
    } else {
        let port = config.port.unwrap_or_else(|| kind.default_port());
        format!("{}:{}", host, port)
    }
}

/// A verified session endpoint shared by all four adapters.
///
/// Holds the endpoint that answered during `connect` and the socket opened
/// against it. Real driver traffic is the consumer's concern; the session
/// models what the pool manager needs - a handle that can be probed and
/// closed.
pub struct Session {
    kind: BackendKind,
    addr: String,
    ping_timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
}

impl Session {
    /// The `host:port` endpoint this session is bound to
    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Probe the endpoint with a fresh bounded round trip
    pub(crate) async fn probe(&self) -> Result<(), PoolError> {
        match tokio::time::timeout(self.ping_timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(PoolError::Liveness(format!("{}: {}", self.addr, e))),
            Err(_) => Err(PoolError::Liveness(format!(
                "{}: probe timeout after {:?}",
                self.addr, self.ping_timeout
            ))),
        }
    }

    /// Drop the held socket. Safe to call more than once.
    pub(crate) async fn shutdown(&self) {
        let mut stream = self.stream.lock().await;
        if stream.take().is_some() {
            tracing::debug!(backend = %self.kind, addr = %self.addr, "session socket released");
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("kind", &self.kind)
            .field("addr", &self.addr)
            .finish()
    }
}

/// Walk the ordered host list and open a session against the first endpoint
/// reachable within the connect timeout.
///
/// No retry beyond the single pass: a fully unreachable list is a
/// `Connect` error for the caller to handle.
pub(crate) async fn open_session(
    kind: BackendKind,
    config: &PoolConfig,
) -> Result<Session, PoolError> {
    config.validate()?;

    let timeout = config.connect_timeout();
    let mut last_err = String::new();

    for host in &config.hosts {
        let host = host.trim();
        if host.is_empty() {
            continue;
        }

        let addr = endpoint_addr(host, config, kind);

        match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                tracing::debug!(backend = %kind, addr = %addr, "endpoint reachable");
                return Ok(Session {
                    kind,
                    addr,
                    ping_timeout: config.ping_timeout(),
                    stream: Mutex::new(Some(stream)),
                });
            }
            Ok(Err(e)) => {
                tracing::debug!(backend = %kind, addr = %addr, error = %e, "endpoint unreachable");
                last_err = format!("{}: {}", addr, e);
            }
            Err(_) => {
                tracing::debug!(backend = %kind, addr = %addr, "endpoint connect timeout");
                last_err = format!("{}: connect timeout after {:?}", addr, timeout);
            }
        }
    }

    Err(PoolError::Connect(format!(
        "no reachable {} endpoint ({})",
        kind, last_err
    )))
}

/// Mask a credential for log-safe data source descriptions
pub(crate) fn redact(secret: &Option<String>) -> &'static str {
    match secret {
        Some(_) => "***",
        None => "",
    }
}
