use crate::metrics::HostMetrics;
use crate::overlay::{OverlayCompositor, SurfaceBackend};
use crate::services::{ClickInjector, HostEvent, HostService, TapInjector, run_host};
use crate::state::StateManager;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedSender};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("No tokio runtime available to run the host")]
    NoRuntime,

    #[error("Host service unavailable: {0}")]
    Unavailable(String),

    #[error("Host service is gone")]
    HostGone,
}

/// A bound reference to a running host.
///
/// Commands are queued to the host task; the status is read from the
/// host's [`StateManager`].
#[derive(Clone)]
pub struct HostHandle {
    id: u64,
    commands: UnboundedSender<HostEvent>,
    state: StateManager,
}

impl HostHandle {
    pub fn new(id: u64, commands: UnboundedSender<HostEvent>, state: StateManager) -> Self {
        Self {
            id,
            commands,
            state,
        }
    }

    /// Identity of the host instance this handle is bound to.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn send(&self, event: HostEvent) -> Result<(), BindError> {
        self.commands.send(event).map_err(|_| BindError::HostGone)
    }

    /// True once the host task has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Resolves when the host task stops.
    pub async fn closed(&self) {
        self.commands.closed().await
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }
}

impl fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostHandle")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Hands out handles to the process-wide host.
///
/// Every successful `bind` must be paired with one `unbind`.
pub trait HostProvider: Send + Sync {
    fn bind(&self) -> Result<HostHandle, BindError>;
    fn unbind(&self, handle: &HostHandle);
}

/// Builds a fresh surface backend for each host instance.
pub type BackendFactory = Box<dyn Fn() -> Box<dyn SurfaceBackend> + Send + Sync>;

struct ActiveHost {
    handle: HostHandle,
    refs: usize,
}

/// Runs the host as a task on a tokio runtime in this process.
///
/// The first `bind` spawns the host; later binds share it. The last
/// `unbind` sends [`HostEvent::Unbind`], which stops it.
pub struct LocalHostProvider {
    runtime: Handle,
    backend_factory: BackendFactory,
    injector: Arc<dyn TapInjector>,
    frame_interval: Duration,
    metrics: Arc<HostMetrics>,
    active: Mutex<Option<ActiveHost>>,
    next_id: AtomicU64,
}

impl LocalHostProvider {
    /// Create a provider spawning hosts on `runtime`.
    ///
    /// # Arguments
    /// * `runtime` - Runtime the host task and tap workers run on
    /// * `backend_factory` - Called once per spawned host
    /// * `injector` - Taps at crossings nobody else handled
    /// * `frame_interval` - Delay between frames while a bar moves
    pub fn new(
        runtime: Handle,
        backend_factory: BackendFactory,
        injector: Arc<dyn TapInjector>,
        frame_interval: Duration,
    ) -> Self {
        Self {
            runtime,
            backend_factory,
            injector,
            frame_interval,
            metrics: Arc::new(HostMetrics::new()),
            active: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Same as [`new`](Self::new), on the runtime of the calling context.
    pub fn from_current(
        backend_factory: BackendFactory,
        injector: Arc<dyn TapInjector>,
        frame_interval: Duration,
    ) -> Result<Self, BindError> {
        let runtime = Handle::try_current().map_err(|_| BindError::NoRuntime)?;
        Ok(Self::new(runtime, backend_factory, injector, frame_interval))
    }

    /// Counters shared by every host this provider spawns.
    pub fn metrics(&self) -> Arc<HostMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Number of live binds on the current host.
    pub fn bind_count(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, |active| active.refs)
    }

    fn spawn_host(&self) -> HostHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let state = StateManager::new();

        let host = HostService::new(
            OverlayCompositor::new((self.backend_factory)()),
            ClickInjector::new(Arc::clone(&self.injector), self.runtime.clone()),
            &tx,
            state.clone(),
            Arc::clone(&self.metrics),
        );
        self.runtime
            .spawn(run_host(host, rx, self.frame_interval));

        tracing::info!("Spawned overlay host #{}", id);
        HostHandle::new(id, tx, state)
    }
}

impl HostProvider for LocalHostProvider {
    fn bind(&self) -> Result<HostHandle, BindError> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(current) = active.as_mut() {
            if !current.handle.is_closed() {
                current.refs += 1;
                tracing::debug!("Bound to host #{} ({} binds)", current.handle.id(), current.refs);
                return Ok(current.handle.clone());
            }
            tracing::warn!(
                "Host #{} stopped unexpectedly, spawning a new one",
                current.handle.id()
            );
        }

        let handle = self.spawn_host();
        *active = Some(ActiveHost {
            handle: handle.clone(),
            refs: 1,
        });
        Ok(handle)
    }

    fn unbind(&self, handle: &HostHandle) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(current) = active.as_mut() else {
            return;
        };
        if current.handle.id() != handle.id() {
            tracing::debug!("Ignoring unbind of stale host #{}", handle.id());
            return;
        }

        current.refs = current.refs.saturating_sub(1);
        if current.refs == 0 {
            tracing::info!("Last bind released, stopping host #{}", handle.id());
            let _ = current.handle.send(HostEvent::Unbind);
            *active = None;
        }
    }
}
