//! The process-wide analyst context.
//!
//! Built once at start-up and shared by reference. Owns the role store, the
//! session memory, the backend and transport, and the task tracker that
//! shutdown waits on.

use analyst_core::{
    AnalystError, BackendAdapter, ConfigStore, Result, RoleStore, SessionMemory, TrafficTransport,
};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Default time in-flight analyses get to finish on shutdown.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// What happened during [`AnalystContext::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownReport {
    /// Tasks that finished within the grace period.
    pub completed: usize,
    /// Tasks cut off when the grace period expired.
    pub abandoned: usize,
}

pub struct AnalystContext {
    config: Arc<dyn ConfigStore>,
    roles: RwLock<RoleStore>,
    memory: Arc<SessionMemory>,
    backend: Arc<dyn BackendAdapter>,
    transport: Arc<dyn TrafficTransport>,
    runtime: Handle,
    tracker: TaskTracker,
    closing: CancellationToken,
    abandon: CancellationToken,
}

impl AnalystContext {
    /// Builds the context on the current Tokio runtime.
    ///
    /// Roles are loaded from `config`; session memory starts empty.
    pub fn init(
        config: Arc<dyn ConfigStore>,
        backend: Arc<dyn BackendAdapter>,
        transport: Arc<dyn TrafficTransport>,
    ) -> Result<Arc<Self>> {
        let runtime = Handle::try_current().map_err(|e| {
            AnalystError::backend(format!("Analyst context needs a Tokio runtime: {}", e))
        })?;
        Ok(Self::with_runtime(config, backend, transport, runtime))
    }

    /// Builds the context on an explicit runtime, for hosts that submit work
    /// from threads outside it.
    pub fn with_runtime(
        config: Arc<dyn ConfigStore>,
        backend: Arc<dyn BackendAdapter>,
        transport: Arc<dyn TrafficTransport>,
        runtime: Handle,
    ) -> Arc<Self> {
        let roles = RoleStore::from_config(config.as_ref());
        tracing::info!(
            backend = backend.name(),
            roles = roles.roles().len(),
            active_role = roles.active_role(),
            "Analyst context initialised"
        );

        Arc::new(Self {
            config,
            roles: RwLock::new(roles),
            memory: Arc::new(SessionMemory::new()),
            backend,
            transport,
            runtime,
            tracker: TaskTracker::new(),
            closing: CancellationToken::new(),
            abandon: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &Arc<dyn ConfigStore> {
        &self.config
    }

    pub fn memory(&self) -> &Arc<SessionMemory> {
        &self.memory
    }

    pub fn backend(&self) -> &Arc<dyn BackendAdapter> {
        &self.backend
    }

    pub fn transport(&self) -> &Arc<dyn TrafficTransport> {
        &self.transport
    }

    /// Read access to the role store.
    pub fn with_roles<R>(&self, f: impl FnOnce(&RoleStore) -> R) -> R {
        let roles = self.roles.read().unwrap_or_else(PoisonError::into_inner);
        f(&roles)
    }

    /// Mutates the role store and persists the result.
    ///
    /// Staged edits applied inside `f` are committed in one write.
    pub fn update_roles<R>(&self, f: impl FnOnce(&mut RoleStore) -> R) -> Result<R> {
        let mut roles = self.roles.write().unwrap_or_else(PoisonError::into_inner);
        let result = f(&mut roles);
        roles.persist(self.config.as_ref())?;
        Ok(result)
    }

    /// Re-reads roles from the configuration store.
    pub fn reload_roles(&self) {
        let mut roles = self.roles.write().unwrap_or_else(PoisonError::into_inner);
        roles.load(self.config.as_ref());
    }

    /// Name and prompt of the active role, copied so no lock is held across
    /// a network call.
    pub fn active_role_snapshot(&self) -> (String, String) {
        self.with_roles(|roles| {
            (
                roles.active_role().to_string(),
                roles.active_prompt().to_string(),
            )
        })
    }

    pub fn is_closing(&self) -> bool {
        self.closing.is_cancelled()
    }

    /// Number of analyses still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub(crate) fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    pub(crate) fn abandon_token(&self) -> &CancellationToken {
        &self.abandon
    }

    /// Stops accepting work and waits up to `grace` for running analyses.
    ///
    /// Tasks still running afterwards are abandoned: each delivers a single
    /// `BackendError` result and exits. Calling this twice is harmless.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        self.closing.cancel();
        self.tracker.close();

        let running = self.tracker.len();
        tracing::info!(running, grace_ms = grace.as_millis() as u64, "Shutting down analyst");

        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            return ShutdownReport {
                completed: running,
                abandoned: 0,
            };
        }

        let abandoned = self.tracker.len();
        tracing::warn!(abandoned, "Grace period expired, abandoning analyses");
        self.abandon.cancel();
        self.tracker.wait().await;

        ShutdownReport {
            completed: running.saturating_sub(abandoned),
            abandoned,
        }
    }
}
