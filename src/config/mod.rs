use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Connection parameters for one backend pool.
///
/// Built once at process start and never mutated afterwards; the pool
/// manager and adapters only ever borrow it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Ordered list of host endpoints (`host` or `host:port`)
    pub hosts: Vec<String>,

    /// Port applied to hosts without an explicit one; falls back to the
    /// backend kind's default port when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Username for authentication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password for authentication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Target keyspace / database / service name
    pub namespace: String,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Liveness probe timeout in seconds
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_secs: u64,

    /// Maximum open connections in the underlying pool
    #[serde(default = "default_max_open")]
    pub max_open: u32,

    /// Maximum idle connections kept warm
    #[serde(default = "default_max_idle")]
    pub max_idle: u32,

    /// Maximum connection lifetime in seconds
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,

    /// Consecutive liveness failures tolerated before the pool is rebuilt
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Consistency level hint (wide-column backends)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency: Option<String>,

    /// Native protocol version hint (wide-column backends)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<u8>,

    /// Application name reported to the backend on connect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
}

fn default_connect_timeout() -> u64 {
    8
}

fn default_ping_timeout() -> u64 {
    3
}

fn default_max_open() -> u32 {
    20
}

fn default_max_idle() -> u32 {
    5
}

fn default_max_lifetime() -> u64 {
    300
}

fn default_failure_threshold() -> u32 {
    20
}

impl PoolConfig {
    /// Create a config with default tuning for the given hosts and namespace
    pub fn new(hosts: Vec<String>, namespace: impl Into<String>) -> Self {
        Self {
            hosts,
            port: None,
            username: None,
            password: None,
            namespace: namespace.into(),
            connect_timeout_secs: default_connect_timeout(),
            ping_timeout_secs: default_ping_timeout(),
            max_open: default_max_open(),
            max_idle: default_max_idle(),
            max_lifetime_secs: default_max_lifetime(),
            failure_threshold: default_failure_threshold(),
            consistency: None,
            protocol_version: None,
            app_name: None,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    /// Validate connection parameters before any connect attempt
    ///
    /// A config failing validation is fatal for that backend kind until the
    /// configuration itself is corrected; it is never retried automatically.
    pub fn validate(&self) -> std::result::Result<(), crate::pool::PoolError> {
        if self.hosts.is_empty() || self.hosts.iter().all(|h| h.trim().is_empty()) {
            return Err(crate::pool::PoolError::Config(
                "host list is empty".to_string(),
            ));
        }

        if self.namespace.trim().is_empty() {
            return Err(crate::pool::PoolError::Config(
                "namespace (keyspace/database/service) is not set".to_string(),
            ));
        }

        if self.max_idle > self.max_open {
            return Err(crate::pool::PoolError::Config(format!(
                "max_idle ({}) exceeds max_open ({})",
                self.max_idle, self.max_open
            )));
        }

        Ok(())
    }
}

/// Main configuration structure: one optional pool section per backend kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Wide-column store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cassandra: Option<PoolConfig>,

    /// Relational engine A
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maria: Option<PoolConfig>,

    /// Relational engine B
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oracle: Option<PoolConfig>,

    /// Document store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mongo: Option<PoolConfig>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no backend section is present
    pub fn is_empty(&self) -> bool {
        self.cassandra.is_none()
            && self.maria.is_none()
            && self.oracle.is_none()
            && self.mongo.is_none()
    }
}

/// Load configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .context(format!("Failed to read config file: {:?}", path.as_ref()))?;

    let config: Config = serde_yaml::from_str(&content)
        .context("Failed to parse YAML configuration")?;

    Ok(config)
}

/// Load configuration from environment variables
///
/// Each backend kind uses a `DBPOOL_<KIND>_*` prefix (KIND in CASSANDRA,
/// MARIA, ORACLE, MONGO):
/// - DBPOOL_<KIND>_HOSTS (comma-separated, required to enable the kind)
/// - DBPOOL_<KIND>_NAMESPACE (required)
/// - DBPOOL_<KIND>_USER / DBPOOL_<KIND>_PASSWORD (optional)
/// - DBPOOL_<KIND>_PORT, DBPOOL_<KIND>_MAX_OPEN, DBPOOL_<KIND>_MAX_IDLE,
///   DBPOOL_<KIND>_FAIL_THRESHOLD (optional numeric overrides)
pub fn load_from_env() -> Result<Config> {
    // Try to load .env file if it exists (don't fail if it doesn't)
    let _ = dotenvy::dotenv();

    let config = Config {
        cassandra: backend_from_env("CASSANDRA")?,
        maria: backend_from_env("MARIA")?,
        oracle: backend_from_env("ORACLE")?,
        mongo: backend_from_env("MONGO")?,
    };

    if config.is_empty() {
        anyhow::bail!("No DBPOOL_<KIND>_HOSTS environment variables are set");
    }

    Ok(config)
}

fn backend_from_env(kind: &str) -> Result<Option<PoolConfig>> {
    let hosts_var = format!("DBPOOL_{}_HOSTS", kind);

    let hosts_str = match std::env::var(&hosts_var) {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };

    let hosts: Vec<String> = hosts_str
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if hosts.is_empty() {
        anyhow::bail!("{} contains no valid endpoints", hosts_var);
    }

    let namespace = std::env::var(format!("DBPOOL_{}_NAMESPACE", kind))
        .context(format!("DBPOOL_{}_NAMESPACE is not set", kind))?;

    let mut pool = PoolConfig::new(hosts, namespace);
    pool.username = std::env::var(format!("DBPOOL_{}_USER", kind)).ok();
    pool.password = std::env::var(format!("DBPOOL_{}_PASSWORD", kind)).ok();
    pool.app_name = std::env::var("DBPOOL_APP_NAME").ok();

    if let Ok(port) = std::env::var(format!("DBPOOL_{}_PORT", kind)) {
        if let Ok(val) = port.parse() {
            pool.port = Some(val);
        }
    }

    if let Ok(max_open) = std::env::var(format!("DBPOOL_{}_MAX_OPEN", kind)) {
        if let Ok(val) = max_open.parse() {
            pool.max_open = val;
        }
    }

    if let Ok(max_idle) = std::env::var(format!("DBPOOL_{}_MAX_IDLE", kind)) {
        if let Ok(val) = max_idle.parse() {
            pool.max_idle = val;
        }
    }

    if let Ok(threshold) = std::env::var(format!("DBPOOL_{}_FAIL_THRESHOLD", kind)) {
        if let Ok(val) = threshold.parse() {
            pool.failure_threshold = val;
        }
    }

    Ok(Some(pool))
}

/// Load configuration from file or environment
///
/// Tries the YAML file when a path is given, otherwise falls back to
/// environment variables.
pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    if let Some(path) = config_path {
        load_from_yaml(path)
    } else {
        load_from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_yaml() {
        let yaml = r#"
cassandra:
  hosts:
    - cas-1.example.com
    - cas-2.example.com
  username: crmapp
  password: secret
  namespace: crm
  consistency: quorum
  protocol_version: 4

maria:
  hosts:
    - db-1.example.com:3306
  username: crmapp
  password: secret
  namespace: CRMX2
  max_open: 100
  failure_threshold: 10
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        let cassandra = config.cassandra.as_ref().unwrap();
        assert_eq!(cassandra.hosts.len(), 2);
        assert_eq!(cassandra.namespace, "crm");
        assert_eq!(cassandra.consistency.as_deref(), Some("quorum"));
        assert_eq!(cassandra.protocol_version, Some(4));

        let maria = config.maria.as_ref().unwrap();
        assert_eq!(maria.max_open, 100);
        assert_eq!(maria.failure_threshold, 10);

        assert!(config.oracle.is_none());
        assert!(config.mongo.is_none());
    }

    #[test]
    fn test_default_values() {
        let yaml = r#"
mongo:
  hosts:
    - mongo-1.example.com
  namespace: crm
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let mongo = config.mongo.as_ref().unwrap();

        assert_eq!(mongo.connect_timeout_secs, 8);
        assert_eq!(mongo.ping_timeout_secs, 3);
        assert_eq!(mongo.max_open, 20);
        assert_eq!(mongo.max_idle, 5);
        assert_eq!(mongo.max_lifetime_secs, 300);
        assert_eq!(mongo.failure_threshold, 20);
        assert!(mongo.port.is_none());
    }

    #[test]
    fn test_validate_rejects_empty_hosts() {
        let pool = PoolConfig::new(vec![], "crm");
        assert!(pool.validate().is_err());

        let pool = PoolConfig::new(vec!["  ".to_string()], "crm");
        assert!(pool.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_missing_namespace() {
        let pool = PoolConfig::new(vec!["db-1:3306".to_string()], "");
        assert!(pool.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_idle_above_open() {
        let mut pool = PoolConfig::new(vec!["db-1:3306".to_string()], "crm");
        pool.max_open = 5;
        pool.max_idle = 10;
        assert!(pool.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_minimal() {
        let pool = PoolConfig::new(vec!["db-1".to_string()], "crm");
        assert!(pool.validate().is_ok());
    }
}
