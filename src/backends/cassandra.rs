//! Wide-column store adapter
//!
//! Builds a cluster description from the ordered contact-point list plus
//! keyspace, consistency, and native protocol hints, then verifies one
//! contact point answers before publishing the session.

use super::{endpoint_addr, open_session, redact, BackendAdapter, BackendKind, Session};
use crate::config::PoolConfig;
use crate::pool::PoolError;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

/// CQL version negotiated when the config carries no hint
pub const DEFAULT_CQL_VERSION: &str = "3.4.4";

/// Native protocol version used when the config carries no hint
pub const DEFAULT_PROTO_VERSION: u8 = 4;

/// Consistency level applied to session traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Consistency {
    #[default]
    One,
    LocalQuorum,
    Quorum,
    All,
}

impl Consistency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Consistency::One => "one",
            Consistency::LocalQuorum => "local_quorum",
            Consistency::Quorum => "quorum",
            Consistency::All => "all",
        }
    }
}

impl FromStr for Consistency {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "one" => Ok(Consistency::One),
            "local_quorum" => Ok(Consistency::LocalQuorum),
            "quorum" => Ok(Consistency::Quorum),
            "all" => Ok(Consistency::All),
            other => Err(PoolError::Config(format!(
                "unknown consistency level: {}",
                other
            ))),
        }
    }
}

/// An established wide-column session
pub struct CassandraSession {
    session: Session,
    contact_points: Vec<String>,
    keyspace: String,
    consistency: Consistency,
    cql_version: String,
    protocol_version: u8,
    username: Option<String>,
    password: Option<String>,
}

impl CassandraSession {
    /// Contact points resolved to `host:port` form
    pub fn contact_points(&self) -> &[String] {
        &self.contact_points
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    pub fn consistency(&self) -> Consistency {
        self.consistency
    }

    pub fn cql_version(&self) -> &str {
        &self.cql_version
    }

    pub fn protocol_version(&self) -> u8 {
        self.protocol_version
    }

    /// Endpoint that answered during connect
    pub fn addr(&self) -> &str {
        self.session.addr()
    }
}

impl fmt::Debug for CassandraSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CassandraSession")
            .field("contact_points", &self.contact_points)
            .field("keyspace", &self.keyspace)
            .field("consistency", &self.consistency)
            .field("protocol_version", &self.protocol_version)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .finish()
    }
}

/// Adapter for the wide-column store
#[derive(Debug, Default, Clone, Copy)]
pub struct CassandraAdapter;

#[async_trait]
impl BackendAdapter for CassandraAdapter {
    type Client = CassandraSession;

    async fn connect(&self, config: &PoolConfig) -> Result<Self::Client, PoolError> {
        let consistency = match &config.consistency {
            Some(level) => level.parse()?,
            None => Consistency::default(),
        };

        let session = open_session(BackendKind::Cassandra, config).await?;

        let contact_points = config
            .hosts
            .iter()
            .filter(|h| !h.trim().is_empty())
            .map(|h| endpoint_addr(h.trim(), config, BackendKind::Cassandra))
            .collect();

        Ok(CassandraSession {
            session,
            contact_points,
            keyspace: config.namespace.clone(),
            consistency,
            cql_version: DEFAULT_CQL_VERSION.to_string(),
            protocol_version: config.protocol_version.unwrap_or(DEFAULT_PROTO_VERSION),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    async fn ping(&self, client: &Self::Client) -> Result<(), PoolError> {
        client.session.probe().await
    }

    async fn close(&self, client: &Self::Client) -> Result<(), PoolError> {
        client.session.shutdown().await;
        Ok(())
    }
}
