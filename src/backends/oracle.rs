//! Relational engine B adapter
//!
//! Uses an easy-connect descriptor (`user/password@host:port/service`).
//! The session count bounds from the pool config map to the descriptor's
//! `poolMaxSessions` parameter.

use super::{open_session, redact, BackendAdapter, BackendKind, Session};
use crate::config::PoolConfig;
use crate::pool::PoolError;
use async_trait::async_trait;
use std::fmt;

/// An established relational pool handle
pub struct OraclePool {
    session: Session,
    descriptor: String,
    display_descriptor: String,
    service: String,
}

impl OraclePool {
    /// Full easy-connect descriptor, credentials included
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn addr(&self) -> &str {
        self.session.addr()
    }
}

impl fmt::Debug for OraclePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OraclePool")
            .field("descriptor", &self.display_descriptor)
            .field("service", &self.service)
            .finish()
    }
}

/// Build `user/password@host:port/service?poolMaxSessions=N` and a
/// credential-free variant for logs
fn build_descriptor(addr: &str, config: &PoolConfig) -> (String, String) {
    let auth = match (&config.username, &config.password) {
        (Some(user), Some(password)) => format!("{}/{}@", user, password),
        (Some(user), None) => format!("{}@", user),
        _ => String::new(),
    };

    let display_auth = match &config.username {
        Some(user) => format!("{}/{}@", user, redact(&config.password)),
        None => String::new(),
    };

    let suffix = format!(
        "{}/{}?poolMaxSessions={}",
        addr, config.namespace, config.max_open
    );

    (
        format!("{}{}", auth, suffix),
        format!("{}{}", display_auth, suffix),
    )
}

/// Adapter for relational engine B
#[derive(Debug, Default, Clone, Copy)]
pub struct OracleAdapter;

#[async_trait]
impl BackendAdapter for OracleAdapter {
    type Client = OraclePool;

    async fn connect(&self, config: &PoolConfig) -> Result<Self::Client, PoolError> {
        let session = open_session(BackendKind::Oracle, config).await?;
        let (descriptor, display_descriptor) = build_descriptor(session.addr(), config);

        Ok(OraclePool {
            session,
            descriptor,
            display_descriptor,
            service: config.namespace.clone(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_descriptor() {
        let mut config = PoolConfig::new(vec!["172.19.190.148:1555".to_string()], "CRMOLPRD");
        config.username = Some("ccbcdv".to_string());
        config.password = Some("ccbcdv#234".to_string());
        config.max_open = 100;

        let (descriptor, display) = build_descriptor("172.19.190.148:1555", &config);
        assert_eq!(
            descriptor,
            "ccbcdv/ccbcdv#234@172.19.190.148:1555/CRMOLPRD?poolMaxSessions=100"
        );
        assert_eq!(
            display,
            "ccbcdv/***@172.19.190.148:1555/CRMOLPRD?poolMaxSessions=100"
        );
    }

    #[test]
    fn test_build_descriptor_without_credentials() {
        let config = PoolConfig::new(vec!["db-1:1521".to_string()], "XEPDB1");
        let (descriptor, display) = build_descriptor("db-1:1521", &config);

        assert_eq!(descriptor, "db-1:1521/XEPDB1?poolMaxSessions=20");
        assert_eq!(descriptor, display);
    }

    #[tokio::test]
    async fn test_connect_and_close() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut config = PoolConfig::new(vec![addr.to_string()], "CRMOLPRD");
        config.username = Some("ccbcdv".to_string());
        config.password = Some("hidden".to_string());

        let pool = OracleAdapter.connect(&config).await.unwrap();
        assert_eq!(pool.service(), "CRMOLPRD");
        assert!(pool.descriptor().contains("hidden"));
        assert!(!format!("{:?}", pool).contains("hidden"));

        OracleAdapter.close(&pool).await.unwrap();
        OracleAdapter.close(&pool).await.unwrap();
    }
}
