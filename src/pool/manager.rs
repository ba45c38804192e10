//! Resilient pool manager
//!
//! Implements the lifecycle protocol shared by every backend kind: lazy
//! creation of a process-wide client exactly once under concurrent callers,
//! consecutive-failure accounting, and a guarded rebuild once the failure
//! threshold is crossed.
//!
//! The manager never probes on the hot path - a live handle is returned
//! without a round trip. Failures are reported by callers after real
//! traffic; the probe runs only inside the guarded section when the handle
//! is already suspect, deciding between keeping it and rebuilding it.
//! Recovery is caller-driven: there is no background retry task, the next
//! getter call is itself the retry.

use super::PoolError;
use crate::backends::{BackendAdapter, BackendKind};
use crate::config::PoolConfig;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Observable lifecycle phase of one backend kind's pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolPhase {
    /// No client has been published (never connected, or last rebuild failed)
    Uninitialized,

    /// A client is published and below the failure threshold
    Live,

    /// A client is published but the failure threshold has been crossed;
    /// the next getter call will verify and possibly rebuild it
    Suspect,
}

impl PoolPhase {
    pub fn name(&self) -> &'static str {
        match self {
            PoolPhase::Uninitialized => "Uninitialized",
            PoolPhase::Live => "Live",
            PoolPhase::Suspect => "Suspect",
        }
    }
}

/// Per-backend-kind pool lifecycle manager.
///
/// At most one live client handle exists per manager at any instant; the
/// handle is shared read-mostly via `Arc` and only the manager, under its
/// exclusion lock, ever replaces or closes it. Callers never close handles
/// directly.
pub struct ResilientPool<A: BackendAdapter> {
    kind: BackendKind,
    adapter: A,
    config: PoolConfig,
    client: RwLock<Option<Arc<A::Client>>>,
    /// Exclusion lock for connect/close during init and rebuild; never held
    /// across caller traffic
    init_lock: Mutex<()>,
    consecutive_failures: AtomicU32,
}

impl<A: BackendAdapter> ResilientPool<A> {
    pub fn new(kind: BackendKind, adapter: A, config: PoolConfig) -> Self {
        Self {
            kind,
            adapter,
            config,
            client: RwLock::new(None),
            init_lock: Mutex::new(()),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Current consecutive-failure count
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    /// Observable lifecycle phase
    pub async fn phase(&self) -> PoolPhase {
        if self.client.read().await.is_none() {
            PoolPhase::Uninitialized
        } else if self.consecutive_failures() > self.config.failure_threshold {
            PoolPhase::Suspect
        } else {
            PoolPhase::Live
        }
    }

    /// Get the shared client handle, creating or rebuilding the pool when
    /// necessary.
    ///
    /// The common case returns the published handle without any network
    /// round trip. The guarded slow path runs on first access and whenever
    /// the consecutive-failure count exceeds the configured threshold.
    pub async fn get(&self) -> Result<Arc<A::Client>, PoolError> {
        if self.consecutive_failures() <= self.config.failure_threshold {
            if let Some(client) = self.client.read().await.as_ref() {
                return Ok(Arc::clone(client));
            }
        }

        self.initialize_or_rebuild().await
    }

    /// Get the client handle with a verified liveness probe.
    ///
    /// The stronger, slower variant of [`get`](Self::get): one extra round
    /// trip per call. A successful probe resets the failure streak; a failed
    /// probe counts toward the threshold and surfaces as a liveness error.
    pub async fn get_checked(&self) -> Result<Arc<A::Client>, PoolError> {
        let client = self.get().await?;

        match self.adapter.ping(&client).await {
            Ok(()) => {
                self.consecutive_failures.store(0, Ordering::Release);
                Ok(client)
            }
            Err(e) => {
                self.report_failure();
                Err(PoolError::Liveness(e.to_string()))
            }
        }
    }

    /// Record a transport-level failure observed by a caller using the
    /// handle.
    ///
    /// Increments the consecutive-failure count; once the count passes the
    /// threshold the next getter call performs the guarded rebuild.
    pub fn report_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;

        if failures == self.config.failure_threshold + 1 {
            warn!(
                backend = %self.kind,
                failures,
                threshold = self.config.failure_threshold,
                transition = "degrade",
                "failure threshold crossed, pool is suspect"
            );
        } else {
            debug!(backend = %self.kind, failures, "caller reported failure");
        }
    }

    /// Record a successful operation, ending the failure streak
    pub fn report_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
    }

    /// Close the pool and reset to the uninitialized state. Idempotent.
    pub async fn close(&self) -> Result<(), PoolError> {
        let _guard = self.init_lock.lock().await;

        let taken = self.client.write().await.take();

        if let Some(client) = taken {
            self.adapter.close(&client).await?;
            self.consecutive_failures.store(0, Ordering::Release);
            info!(backend = %self.kind, transition = "close", "pool closed");
        }

        Ok(())
    }

    /// Guarded slow path: first initialization and threshold-triggered
    /// rebuild, serialized by the exclusion lock.
    async fn initialize_or_rebuild(&self) -> Result<Arc<A::Client>, PoolError> {
        let _guard = self.init_lock.lock().await;

        // Re-check under the lock: another caller may have finished the
        // init or rebuild while this one waited.
        let existing = self.client.read().await.as_ref().map(Arc::clone);

        let Some(current) = existing else {
            return self.connect_locked(false).await;
        };

        if self.consecutive_failures() <= self.config.failure_threshold {
            return Ok(current);
        }

        // Suspect handle: verify before discarding. A handle that still
        // answers stays published and the streak ends.
        match self.adapter.ping(&current).await {
            Ok(()) => {
                self.consecutive_failures.store(0, Ordering::Release);
                debug!(backend = %self.kind, "suspect pool answered probe, keeping handle");
                return Ok(current);
            }
            Err(e) => {
                warn!(backend = %self.kind, error = %e, "suspect pool failed probe, rebuilding");
            }
        }

        // The old handle is fully closed before a new one is published;
        // callers holding clones of the old Arc drain it naturally.
        *self.client.write().await = None;

        if let Err(e) = self.adapter.close(&current).await {
            warn!(backend = %self.kind, error = %e, "error closing stale pool");
        }

        self.connect_locked(true).await
    }

    /// Connect and publish a fresh handle. Must be called with `init_lock`
    /// held.
    async fn connect_locked(&self, rebuilding: bool) -> Result<Arc<A::Client>, PoolError> {
        match self.adapter.connect(&self.config).await {
            Ok(client) => {
                let client = Arc::new(client);
                *self.client.write().await = Some(Arc::clone(&client));
                self.consecutive_failures.store(0, Ordering::Release);

                info!(
                    backend = %self.kind,
                    transition = if rebuilding { "rebuild" } else { "initialize" },
                    "pool ready"
                );

                Ok(client)
            }
            Err(e) => {
                error!(
                    backend = %self.kind,
                    error = %e,
                    transition = if rebuilding { "rebuild_failure" } else { "initialize_failure" },
                    "pool connect failed"
                );

                if rebuilding {
                    Err(PoolError::Rebuild(e.to_string()))
                } else {
                    Err(e)
                }
            }
        }
    }
}

impl<A: BackendAdapter> fmt::Debug for ResilientPool<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientPool")
            .field("kind", &self.kind)
            .field("consecutive_failures", &self.consecutive_failures())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Scriptable adapter counting every capability call
    struct ScriptedAdapter {
        connects: AtomicUsize,
        closes: AtomicUsize,
        pings: AtomicUsize,
        connect_ok: std::sync::atomic::AtomicBool,
        ping_ok: std::sync::atomic::AtomicBool,
    }

    impl ScriptedAdapter {
        fn new() -> Self {
            Self {
                connects: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
                pings: AtomicUsize::new(0),
                connect_ok: std::sync::atomic::AtomicBool::new(true),
                ping_ok: std::sync::atomic::AtomicBool::new(true),
            }
        }
    }

    #[async_trait]
    impl BackendAdapter for Arc<ScriptedAdapter> {
        type Client = u64;

        async fn connect(&self, _config: &PoolConfig) -> Result<u64, PoolError> {
            let n = self.connects.fetch_add(1, Ordering::SeqCst) as u64;
            if self.connect_ok.load(Ordering::SeqCst) {
                Ok(n)
            } else {
                Err(PoolError::Connect("backend down".to_string()))
            }
        }

        async fn ping(&self, _client: &u64) -> Result<(), PoolError> {
            self.pings.fetch_add(1, Ordering::SeqCst);
            if self.ping_ok.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(PoolError::Liveness("no route".to_string()))
            }
        }

        async fn close(&self, _client: &u64) -> Result<(), PoolError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_config(threshold: u32) -> PoolConfig {
        let mut config = PoolConfig::new(vec!["db-1:3306".to_string()], "crm");
        config.failure_threshold = threshold;
        config
    }

    fn test_pool(threshold: u32) -> (ResilientPool<Arc<ScriptedAdapter>>, Arc<ScriptedAdapter>) {
        let adapter = Arc::new(ScriptedAdapter::new());
        let pool = ResilientPool::new(
            BackendKind::Maria,
            Arc::clone(&adapter),
            test_config(threshold),
        );
        (pool, adapter)
    }

    #[tokio::test]
    async fn test_lazy_single_connect() {
        let (pool, adapter) = test_pool(20);

        assert_eq!(pool.phase().await, PoolPhase::Uninitialized);

        let first = pool.get().await.unwrap();
        let second = pool.get().await.unwrap();

        assert_eq!(adapter.connects.load(Ordering::SeqCst), 1);
        assert_eq!(*first, *second);
        assert_eq!(pool.phase().await, PoolPhase::Live);
        // No probe on the hot path
        assert_eq!(adapter.pings.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failures_below_threshold_keep_handle() {
        let (pool, adapter) = test_pool(5);

        let handle = pool.get().await.unwrap();
        for _ in 0..5 {
            pool.report_failure();
        }

        assert_eq!(pool.phase().await, PoolPhase::Live);
        let again = pool.get().await.unwrap();
        assert_eq!(*handle, *again);
        assert_eq!(adapter.connects.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_threshold_crossing_rebuilds_dead_pool() {
        let (pool, adapter) = test_pool(5);

        let old = pool.get().await.unwrap();
        adapter.ping_ok.store(false, Ordering::SeqCst);

        for _ in 0..6 {
            pool.report_failure();
        }
        assert_eq!(pool.phase().await, PoolPhase::Suspect);

        let fresh = pool.get().await.unwrap();
        assert_ne!(*old, *fresh);
        assert_eq!(adapter.closes.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.connects.load(Ordering::SeqCst), 2);
        assert_eq!(pool.consecutive_failures(), 0);
        assert_eq!(pool.phase().await, PoolPhase::Live);
    }

    #[tokio::test]
    async fn test_suspect_pool_that_answers_probe_is_kept() {
        let (pool, adapter) = test_pool(3);

        let old = pool.get().await.unwrap();
        for _ in 0..4 {
            pool.report_failure();
        }

        // ping_ok stays true: the handle still answers
        let kept = pool.get().await.unwrap();
        assert_eq!(*old, *kept);
        assert_eq!(adapter.connects.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.closes.load(Ordering::SeqCst), 0);
        assert_eq!(pool.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_initial_connect_failure_leaves_uninitialized() {
        let (pool, adapter) = test_pool(20);
        adapter.connect_ok.store(false, Ordering::SeqCst);

        let err = pool.get().await.unwrap_err();
        assert!(matches!(err, PoolError::Connect(_)));
        assert_eq!(pool.phase().await, PoolPhase::Uninitialized);
        assert_eq!(pool.consecutive_failures(), 0);

        // Next caller retries the identical path and succeeds
        adapter.connect_ok.store(true, Ordering::SeqCst);
        pool.get().await.unwrap();
        assert_eq!(pool.phase().await, PoolPhase::Live);
    }

    #[tokio::test]
    async fn test_rebuild_failure_propagates_and_resets_state() {
        let (pool, adapter) = test_pool(2);

        pool.get().await.unwrap();
        adapter.ping_ok.store(false, Ordering::SeqCst);
        for _ in 0..3 {
            pool.report_failure();
        }

        adapter.connect_ok.store(false, Ordering::SeqCst);
        let err = pool.get().await.unwrap_err();
        assert!(matches!(err, PoolError::Rebuild(_)));
        assert_eq!(pool.phase().await, PoolPhase::Uninitialized);

        // Caller-driven retry: the next call reconnects from scratch
        adapter.connect_ok.store(true, Ordering::SeqCst);
        pool.get().await.unwrap();
        assert_eq!(pool.phase().await, PoolPhase::Live);
    }

    #[tokio::test]
    async fn test_get_checked_resets_streak() {
        let (pool, adapter) = test_pool(20);

        pool.get().await.unwrap();
        pool.report_failure();
        pool.report_failure();
        assert_eq!(pool.consecutive_failures(), 2);

        pool.get_checked().await.unwrap();
        assert_eq!(pool.consecutive_failures(), 0);
        assert_eq!(adapter.pings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_checked_counts_liveness_failure() {
        let (pool, adapter) = test_pool(20);

        pool.get().await.unwrap();
        adapter.ping_ok.store(false, Ordering::SeqCst);

        let err = pool.get_checked().await.unwrap_err();
        assert!(matches!(err, PoolError::Liveness(_)));
        assert_eq!(pool.consecutive_failures(), 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (pool, adapter) = test_pool(20);

        pool.get().await.unwrap();
        pool.close().await.unwrap();
        pool.close().await.unwrap();

        assert_eq!(adapter.closes.load(Ordering::SeqCst), 1);
        assert_eq!(pool.phase().await, PoolPhase::Uninitialized);
    }

    #[tokio::test]
    async fn test_report_success_ends_streak() {
        let (pool, _adapter) = test_pool(20);

        pool.report_failure();
        pool.report_failure();
        pool.report_success();
        assert_eq!(pool.consecutive_failures(), 0);
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(PoolPhase::Uninitialized.name(), "Uninitialized");
        assert_eq!(PoolPhase::Live.name(), "Live");
        assert_eq!(PoolPhase::Suspect.name(), "Suspect");
    }
}
