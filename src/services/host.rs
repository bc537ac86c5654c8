use super::injector::{ClickInjector, InjectionError};
use crate::engine::{Activation, Crossing, ScanEngine};
use crate::metrics::HostMetrics;
use crate::models::{Configuration, Extent, Point, ResumeState};
use crate::overlay::{
    ActivationSink, Color, OverlayCompositor, ShowOutcome, SurfaceInput, SwitchInput,
};
use crate::state::StateManager;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::time::{Instant, sleep_until};

/// Consumer hook called when both bars froze.
///
/// Return true to take over the crossing; false lets the host tap at the
/// point itself. Runs on the host task, so it must not block.
pub trait CrossListener: Send + Sync {
    fn on_cross(&self, x: i32, y: i32) -> bool;
}

impl<F> CrossListener for F
where
    F: Fn(i32, i32) -> bool + Send + Sync,
{
    fn on_cross(&self, x: i32, y: i32) -> bool {
        self(x, y)
    }
}

/// Called when the user aborts scanning with a long activation.
pub trait AbortListener: Send + Sync {
    fn on_abort(&self);
}

impl<F> AbortListener for F
where
    F: Fn() + Send + Sync,
{
    fn on_abort(&self) {
        self()
    }
}

/// Identity of the connection that registered a listener.
pub type ListenerOwner = u64;

/// Everything the host task reacts to.
pub enum HostEvent {
    /// Input from the interceptor surface.
    Switch(SwitchInput),
    /// The display the overlay covers changed size.
    DisplayChanged(Extent),
    /// A tap worker is done.
    InjectionFinished {
        point: Point,
        result: Result<(), InjectionError>,
    },
    SetConfiguration(Configuration),
    /// Install (or with `None`, withdraw) `owner`'s cross listener. The
    /// latest installed listener handles crossings.
    SetCrossListener {
        owner: ListenerOwner,
        listener: Option<Arc<dyn CrossListener>>,
    },
    /// Install (or withdraw) `owner`'s abort hook. Every installed hook is
    /// called on a long activation.
    SetAbortListener {
        owner: ListenerOwner,
        listener: Option<Arc<dyn AbortListener>>,
    },
    /// `owner` went away; drop everything it registered.
    Release { owner: ListenerOwner },
    SetColor(Color),
    Show,
    Hide,
    Pause,
    Reset,
    Unbind,
}

impl fmt::Debug for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostEvent::Switch(input) => f.debug_tuple("Switch").field(input).finish(),
            HostEvent::DisplayChanged(extent) => {
                f.debug_tuple("DisplayChanged").field(extent).finish()
            }
            HostEvent::InjectionFinished { point, result } => f
                .debug_struct("InjectionFinished")
                .field("point", point)
                .field("result", result)
                .finish(),
            HostEvent::SetConfiguration(conf) => {
                f.debug_tuple("SetConfiguration").field(conf).finish()
            }
            HostEvent::SetCrossListener { owner, listener } => f
                .debug_struct("SetCrossListener")
                .field("owner", owner)
                .field("listener", &listener.is_some())
                .finish(),
            HostEvent::SetAbortListener { owner, listener } => f
                .debug_struct("SetAbortListener")
                .field("owner", owner)
                .field("listener", &listener.is_some())
                .finish(),
            HostEvent::Release { owner } => {
                f.debug_struct("Release").field("owner", owner).finish()
            }
            HostEvent::SetColor(color) => f.debug_tuple("SetColor").field(color).finish(),
            HostEvent::Show => f.write_str("Show"),
            HostEvent::Hide => f.write_str("Hide"),
            HostEvent::Pause => f.write_str("Pause"),
            HostEvent::Reset => f.write_str("Reset"),
            HostEvent::Unbind => f.write_str("Unbind"),
        }
    }
}

/// Whether the host loop keeps going after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// The overlay host.
///
/// Owns the scan engine, the compositor and everything a session needs.
/// Driven by [`run_host`] on a single task; nothing else mutates it.
pub struct HostService {
    configuration: Configuration,
    resume: Option<ResumeState>,
    compositor: OverlayCompositor,
    engine: Option<ScanEngine>,
    cross_listener: Option<(ListenerOwner, Arc<dyn CrossListener>)>,
    abort_listeners: IndexMap<ListenerOwner, Arc<dyn AbortListener>>,
    injector: ClickInjector,
    events: WeakUnboundedSender<HostEvent>,
    finishing: bool,
    state: StateManager,
    metrics: Arc<HostMetrics>,
}

impl HostService {
    /// Create a host.
    ///
    /// # Arguments
    /// * `compositor` - Overlay surfaces
    /// * `injector` - Tap worker used when no cross listener handles a crossing
    /// * `events` - Sender of the channel this host is driven from. Only a weak
    ///   reference is kept, so the host stops once every handle is gone.
    /// * `state` - Status published to connections
    /// * `metrics` - Shared counters
    pub fn new(
        compositor: OverlayCompositor,
        injector: ClickInjector,
        events: &UnboundedSender<HostEvent>,
        state: StateManager,
        metrics: Arc<HostMetrics>,
    ) -> Self {
        Self {
            configuration: Configuration::default(),
            resume: None,
            compositor,
            engine: None,
            cross_listener: None,
            abort_listeners: IndexMap::new(),
            injector,
            events: events.downgrade(),
            finishing: false,
            state,
            metrics,
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn engine(&self) -> Option<&ScanEngine> {
        self.engine.as_ref()
    }

    pub fn is_shown(&self) -> bool {
        self.compositor.is_shown()
    }

    /// React to one event.
    pub fn handle(&mut self, event: HostEvent) -> Flow {
        tracing::trace!("Host event: {:?}", event);

        match event {
            HostEvent::Switch(SwitchInput::Activate) => self.on_activation(),
            HostEvent::Switch(SwitchInput::Hold) => self.on_long_activation(),
            HostEvent::DisplayChanged(extent) => self.on_display_changed(extent),
            HostEvent::InjectionFinished { point, result } => {
                self.on_injection_finished(point, result)
            }
            HostEvent::SetConfiguration(conf) => {
                tracing::info!("Configuration set: {}", conf);
                self.configuration = conf;
                self.state.configuration_pushed();
            }
            HostEvent::SetCrossListener { owner, listener } => {
                self.set_cross_listener(owner, listener)
            }
            HostEvent::SetAbortListener { owner, listener: Some(listener) } => {
                self.abort_listeners.insert(owner, listener);
            }
            HostEvent::SetAbortListener { owner, listener: None } => {
                self.abort_listeners.shift_remove(&owner);
            }
            HostEvent::Release { owner } => self.release(owner),
            HostEvent::SetColor(color) => {
                tracing::debug!("Indicator colour set to {}", color);
                self.compositor.set_color(color);
                self.repaint();
            }
            HostEvent::Show => self.show_overlay(),
            HostEvent::Hide => self.hide_overlay(),
            HostEvent::Pause => self.pause(),
            HostEvent::Reset => self.reset(),
            HostEvent::Unbind => {
                tracing::info!("Host unbound, finishing");
                self.shutdown();
                return Flow::Stop;
            }
        }

        Flow::Continue
    }

    /// Advance the engine one frame and repaint.
    ///
    /// # Returns
    /// Whether another frame is wanted
    pub fn frame(&mut self) -> bool {
        let more = match self.engine.as_mut() {
            Some(engine) => engine.tick(),
            None => false,
        };
        self.repaint();
        more
    }

    /// True while the overlay is up and a bar is moving.
    pub fn wants_frame(&self) -> bool {
        self.compositor.is_shown() && self.engine.as_ref().is_some_and(|e| e.phase().is_sweeping())
    }

    /// Set finishing and tear the overlay down. Safe to call twice.
    pub fn shutdown(&mut self) {
        self.finishing = true;
        self.state.set_finishing();
        self.hide_overlay();
    }

    fn show_overlay(&mut self) {
        if self.finishing {
            tracing::debug!("Host finishing, not showing overlay");
            return;
        }

        let events = self.events.clone();
        let sink = ActivationSink::new(move |input| {
            let event = match input {
                SurfaceInput::Switch(input) => HostEvent::Switch(input),
                SurfaceInput::Resized(extent) => HostEvent::DisplayChanged(extent),
            };
            if let Some(tx) = events.upgrade() {
                let _ = tx.send(event);
            }
        });

        match self.compositor.show(sink) {
            Ok(ShowOutcome::Created(extent)) => {
                let engine = ScanEngine::new(&self.configuration, self.resume.as_ref(), extent);
                tracing::info!(
                    "Overlay shown: {}x{}, first axis {}",
                    extent.width,
                    extent.height,
                    engine.initial_axis()
                );
                self.engine = Some(engine);
                self.metrics.record_session();
                self.state.overlay_shown();
                self.repaint();
            }
            Ok(ShowOutcome::AlreadyShown) => tracing::debug!("Overlay already shown"),
            Err(e) => tracing::error!("Failed to show overlay: {}", e),
        }
    }

    fn hide_overlay(&mut self) {
        if self.compositor.hide() {
            self.engine = None;
            self.state.overlay_hidden();
            tracing::debug!("Overlay hidden");
        }
    }

    fn repaint(&mut self) {
        let Some(engine) = self.engine.as_ref() else {
            return;
        };
        match self.compositor.repaint(engine) {
            Ok(()) => self.metrics.record_frame(true),
            Err(e) => {
                self.metrics.record_frame(false);
                tracing::warn!("Failed to present frame: {}", e);
            }
        }
    }

    fn on_activation(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            tracing::debug!("Activation with no overlay session, ignored");
            return;
        };
        self.metrics.record_activation();

        match engine.activate() {
            Activation::Advanced | Activation::Resumed => {
                let phase = engine.phase();
                tracing::debug!("Scan advanced to {:?}", phase);
                self.state.set_phase(phase);
            }
            Activation::Crossed(crossing) => self.on_crossing(crossing),
            Activation::Ignored => tracing::debug!("Activation after crossing, ignored"),
        }
    }

    fn on_crossing(&mut self, crossing: Crossing) {
        let Point { x, y } = crossing.point;
        tracing::info!("Axes crossed at ({}, {})", x, y);

        self.resume = Some(crossing.resume);
        self.state.record_crossing(crossing.point, crossing.resume);
        self.hide_overlay();

        let handled = self
            .cross_listener
            .as_ref()
            .is_some_and(|(_, listener)| listener.on_cross(x, y));
        self.metrics.record_crossing(handled);

        if handled {
            tracing::debug!("Crossing handled by listener");
            return;
        }

        let events = self.events.clone();
        self.injector.inject(crossing.point, move |result| {
            if let Some(tx) = events.upgrade() {
                let _ = tx.send(HostEvent::InjectionFinished {
                    point: crossing.point,
                    result,
                });
            }
        });
    }

    fn on_long_activation(&mut self) {
        if !self.compositor.is_shown() {
            tracing::debug!("Long activation with no overlay, ignored");
            return;
        }

        tracing::info!("Scanning aborted by long activation");
        self.hide_overlay();
        self.metrics.record_abort();
        self.state.record_abort();

        // Hooks may release themselves while we iterate.
        let listeners: Vec<_> = self.abort_listeners.values().cloned().collect();
        for listener in listeners {
            listener.on_abort();
        }
    }

    fn set_cross_listener(
        &mut self,
        owner: ListenerOwner,
        listener: Option<Arc<dyn CrossListener>>,
    ) {
        match listener {
            Some(listener) => self.cross_listener = Some((owner, listener)),
            None => {
                if self.cross_listener.as_ref().is_some_and(|(o, _)| *o == owner) {
                    self.cross_listener = None;
                }
            }
        }
    }

    fn release(&mut self, owner: ListenerOwner) {
        tracing::debug!("Releasing listeners of connection #{}", owner);
        self.set_cross_listener(owner, None);
        self.abort_listeners.shift_remove(&owner);
    }

    fn on_display_changed(&mut self, extent: Extent) {
        if !self.compositor.resize(extent) {
            return;
        }
        tracing::info!("Display resized to {}x{}", extent.width, extent.height);
        if let Some(engine) = self.engine.as_mut() {
            engine.resize(extent);
        }
        self.repaint();
    }

    fn on_injection_finished(&mut self, point: Point, result: Result<(), InjectionError>) {
        match result {
            Ok(()) => {
                self.metrics.record_tap(true);
                tracing::debug!("Tap at ({}, {}) delivered", point.x, point.y);
            }
            Err(e) => {
                self.metrics.record_tap(false);
                tracing::warn!("Tap injection failed: {}", e);
            }
        }

        if !self.finishing {
            self.show_overlay();
        }
    }

    fn pause(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        engine.pause();
        let phase = engine.phase();
        self.state.set_phase(phase);
        // One blank frame so the bars disappear while paused.
        self.repaint();
    }

    fn reset(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        engine.reset();
        let phase = engine.phase();
        tracing::debug!("Scan reset to first sweep");
        self.state.set_phase(phase);
        self.repaint();
    }
}

/// Drive a host until it is unbound or every sender is gone.
///
/// Events are handled in arrival order. While a bar is moving a frame
/// deadline runs alongside; it is dropped as soon as the engine stops
/// asking for frames.
pub async fn run_host(
    mut host: HostService,
    mut events: UnboundedReceiver<HostEvent>,
    frame_interval: Duration,
) {
    tracing::info!("Overlay host started, frame interval {:?}", frame_interval);
    let mut next_frame: Option<Instant> = None;

    loop {
        next_frame = match (host.wants_frame(), next_frame) {
            (true, Some(at)) => Some(at),
            (true, None) => Some(Instant::now() + frame_interval),
            (false, _) => None,
        };

        tokio::select! {
            biased;

            event = events.recv() => {
                let Some(event) = event else {
                    tracing::debug!("All host handles dropped");
                    break;
                };
                if host.handle(event) == Flow::Stop {
                    break;
                }
            }

            _ = sleep_until(next_frame.unwrap_or_else(Instant::now)), if next_frame.is_some() => {
                host.frame();
                next_frame = None;
            }
        }
    }

    host.shutdown();
    host.metrics.log_summary();
    tracing::info!("Overlay host stopped");
}
