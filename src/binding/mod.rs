//! Client side of the overlay host.
//!
//! A [`ServiceConnection`] binds to the host through a [`HostProvider`],
//! forwards configuration and listeners to it and tells the consumer when
//! the binding is made or lost. Setters called before [`attach`](ServiceConnection::attach)
//! are remembered and pushed once the host is reachable.

pub mod provider;

pub use provider::{BackendFactory, BindError, HostHandle, HostProvider, LocalHostProvider};

use crate::models::{Configuration, ConfigurationError, HostStatus};
use crate::overlay::Color;
use crate::services::{AbortListener, CrossListener, HostEvent, ListenerOwner};
use crate::state::StateChange;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Lifecycle notifications for the consumer.
pub trait ConnectionListener: Send + Sync {
    /// The connection is bound and pending settings were pushed.
    fn on_attached(&self);

    /// The binding was lost: the host stopped or the user aborted with a
    /// long activation. Not called for an explicit [`ServiceConnection::detach`].
    fn on_detached(&self);
}

struct ConnectionInner {
    host: Option<HostHandle>,
    configuration: Option<Configuration>,
    cross_listener: Option<Arc<dyn CrossListener>>,
    connection_listener: Option<Arc<dyn ConnectionListener>>,
    watcher: Option<JoinHandle<()>>,
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

struct ConnectionShared {
    id: ListenerOwner,
    provider: Arc<dyn HostProvider>,
    auto_show: bool,
    inner: Mutex<ConnectionInner>,
}

impl ConnectionShared {
    fn lock(&self) -> MutexGuard<'_, ConnectionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn host(&self) -> Option<HostHandle> {
        self.lock().host.clone()
    }

    /// Drop the binding to host `id` and tell the consumer.
    ///
    /// Stale notifications (another host, or already detached) are ignored.
    fn host_lost(&self, id: u64, reason: &str) {
        let (handle, listener) = {
            let mut inner = self.lock();
            if inner.host.as_ref().map(HostHandle::id) != Some(id) {
                return;
            }
            if let Some(watcher) = inner.watcher.take() {
                watcher.abort();
            }
            (inner.host.take(), inner.connection_listener.clone())
        };

        tracing::warn!("Connection to host #{} lost: {}", id, reason);
        if let Some(handle) = handle {
            self.release(&handle);
        }
        if let Some(listener) = listener {
            listener.on_detached();
        }
    }

    /// Withdraw our listeners from the host, then give the binding back.
    fn release(&self, handle: &HostHandle) {
        // The host may already be gone; unbinding is all that is left then.
        let _ = handle.send(HostEvent::Release { owner: self.id });
        self.provider.unbind(handle);
    }
}

/// Consumer's handle on the overlay host.
///
/// Dropping an attached connection detaches it.
pub struct ServiceConnection {
    shared: Arc<ConnectionShared>,
}

impl ServiceConnection {
    /// Connection that shows the overlay as soon as it attaches.
    pub fn new(provider: Arc<dyn HostProvider>) -> Self {
        Self::with_auto_show(provider, true)
    }

    /// # Arguments
    /// * `provider` - Where the host comes from
    /// * `auto_show` - Show the overlay right after attaching; otherwise wait
    ///   for [`add_overlay_view`](Self::add_overlay_view)
    pub fn with_auto_show(provider: Arc<dyn HostProvider>, auto_show: bool) -> Self {
        Self {
            shared: Arc::new(ConnectionShared {
                id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
                provider,
                auto_show,
                inner: Mutex::new(ConnectionInner {
                    host: None,
                    configuration: None,
                    cross_listener: None,
                    connection_listener: None,
                    watcher: None,
                }),
            }),
        }
    }

    /// Bind to the host.
    ///
    /// Pushes the pending configuration and cross listener, installs the
    /// abort hook, calls [`ConnectionListener::on_attached`] and, in
    /// auto-show mode, shows the overlay. Attaching twice is a no-op.
    pub fn attach(&self) -> Result<(), BindError> {
        let (handle, listener) = {
            let mut inner = self.shared.lock();
            if inner.host.is_some() {
                tracing::debug!("Connection already attached");
                return Ok(());
            }

            let handle = self.shared.provider.bind()?;
            if let Err(e) = push_pending(&inner, &handle, &self.shared) {
                self.shared.release(&handle);
                return Err(e);
            }

            inner.watcher = spawn_watcher(Arc::downgrade(&self.shared), handle.clone());
            inner.host = Some(handle.clone());
            (handle, inner.connection_listener.clone())
        };

        tracing::info!("Connection attached to host #{}", handle.id());
        if let Some(listener) = listener {
            listener.on_attached();
        }
        if self.shared.auto_show {
            self.forward(HostEvent::Show);
        }
        Ok(())
    }

    /// Release the host. Later overlay requests are no-ops.
    ///
    /// Listeners this connection installed are withdrawn first, so a host
    /// shared with other connections stops calling them. Does not call
    /// [`ConnectionListener::on_detached`].
    pub fn detach(&self) {
        let (handle, watcher) = {
            let mut inner = self.shared.lock();
            (inner.host.take(), inner.watcher.take())
        };

        if let Some(watcher) = watcher {
            watcher.abort();
        }
        if let Some(handle) = handle {
            tracing::info!("Connection detached from host #{}", handle.id());
            self.shared.release(&handle);
        }
    }

    pub fn is_attached(&self) -> bool {
        self.shared.lock().host.is_some()
    }

    /// Set the scan configuration.
    ///
    /// Stored locally and pushed to the host when attached. The host uses it
    /// from the next overlay session on.
    pub fn set_configuration(
        &self,
        configuration: Configuration,
    ) -> Result<(), ConfigurationError> {
        configuration.validate()?;

        let handle = {
            let mut inner = self.shared.lock();
            inner.configuration = Some(configuration.clone());
            inner.host.clone()
        };
        if let Some(handle) = handle {
            send_logged(&handle, HostEvent::SetConfiguration(configuration));
        }
        Ok(())
    }

    /// Configuration last given to [`set_configuration`](Self::set_configuration).
    pub fn configuration(&self) -> Option<Configuration> {
        self.shared.lock().configuration.clone()
    }

    /// Take over crossings instead of letting the host tap.
    pub fn set_cross_listener(&self, listener: Arc<dyn CrossListener>) {
        self.replace_cross_listener(Some(listener));
    }

    /// Let the host tap at every crossing again.
    pub fn clear_cross_listener(&self) {
        self.replace_cross_listener(None);
    }

    fn replace_cross_listener(&self, listener: Option<Arc<dyn CrossListener>>) {
        let handle = {
            let mut inner = self.shared.lock();
            inner.cross_listener = listener.clone();
            inner.host.clone()
        };
        if let Some(handle) = handle {
            send_logged(
                &handle,
                HostEvent::SetCrossListener {
                    owner: self.shared.id,
                    listener,
                },
            );
        }
    }

    /// Client-side only; never sent to the host.
    pub fn set_connection_listener(&self, listener: Arc<dyn ConnectionListener>) {
        self.shared.lock().connection_listener = Some(listener);
    }

    /// Show the overlay. No-op unless attached.
    pub fn add_overlay_view(&self) {
        self.forward(HostEvent::Show);
    }

    /// Hide the overlay. No-op unless attached.
    pub fn remove_overlay_view(&self) {
        self.forward(HostEvent::Hide);
    }

    /// Freeze scanning until the next activation. No-op unless attached.
    pub fn pause_scanning(&self) {
        self.forward(HostEvent::Pause);
    }

    /// Restart the first sweep, e.g. after an on-screen keyboard took the
    /// focus. No-op unless attached.
    pub fn reset_scanning(&self) {
        self.forward(HostEvent::Reset);
    }

    /// Recolour the bars. No-op unless attached.
    pub fn set_color(&self, color: Color) {
        self.forward(HostEvent::SetColor(color));
    }

    /// Current host status, if attached.
    pub fn status(&self) -> Option<HostStatus> {
        self.shared.host().map(|handle| handle.state().snapshot())
    }

    /// Host status changes, if attached.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<StateChange>> {
        self.shared.host().map(|handle| handle.state().subscribe())
    }

    fn forward(&self, event: HostEvent) {
        match self.shared.host() {
            Some(handle) => send_logged(&handle, event),
            None => tracing::debug!("Connection not attached, dropping {:?}", event),
        }
    }
}

impl Drop for ServiceConnection {
    fn drop(&mut self) {
        self.detach();
    }
}

fn push_pending(
    inner: &ConnectionInner,
    handle: &HostHandle,
    shared: &Arc<ConnectionShared>,
) -> Result<(), BindError> {
    let owner = shared.id;
    if let Some(configuration) = inner.configuration.clone() {
        handle.send(HostEvent::SetConfiguration(configuration))?;
    }
    if let Some(listener) = inner.cross_listener.clone() {
        handle.send(HostEvent::SetCrossListener {
            owner,
            listener: Some(listener),
        })?;
    }

    let id = handle.id();
    let weak = Arc::downgrade(shared);
    let abort: Arc<dyn AbortListener> = Arc::new(move || {
        if let Some(shared) = weak.upgrade() {
            shared.host_lost(id, "scanning aborted by long activation");
        }
    });
    handle.send(HostEvent::SetAbortListener {
        owner,
        listener: Some(abort),
    })
}

/// Watch for the host stopping under us. Needs a runtime; without one the
/// loss is only noticed on the next failed send.
fn spawn_watcher(shared: Weak<ConnectionShared>, handle: HostHandle) -> Option<JoinHandle<()>> {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        tracing::warn!("No runtime in attach context, host loss will not be detected");
        return None;
    };

    Some(runtime.spawn(async move {
        handle.closed().await;
        if let Some(shared) = shared.upgrade() {
            shared.host_lost(handle.id(), "host terminated");
        }
    }))
}

fn send_logged(handle: &HostHandle, event: HostEvent) {
    if let Err(e) = handle.send(event) {
        tracing::warn!("Failed to reach host #{}: {}", handle.id(), e);
    }
}
