use super::paint::Frame;
use crate::models::Extent;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Handle to a surface created by a [`SurfaceBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceRole {
    /// Draws the bars. Never takes input.
    Indicator,
    /// Invisible, covers the display and turns touches into switch input.
    Interceptor,
}

/// What the compositor asks the backend for.
///
/// Both overlay surfaces cover the whole display, stay on top of every
/// other window and are transparent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSpec {
    pub role: SurfaceRole,
    pub interactive: bool,
    pub always_on_top: bool,
    pub transparent: bool,
    pub full_screen: bool,
}

impl SurfaceSpec {
    pub fn indicator() -> Self {
        Self {
            role: SurfaceRole::Indicator,
            interactive: false,
            always_on_top: true,
            transparent: true,
            full_screen: true,
        }
    }

    pub fn interceptor() -> Self {
        Self {
            role: SurfaceRole::Interceptor,
            interactive: true,
            ..Self::indicator()
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("Not allowed to draw over other applications")]
    PermissionDenied,

    #[error("Display is not available")]
    DisplayUnavailable,

    #[error("Unknown surface {0:?}")]
    UnknownSurface(SurfaceId),

    #[error("Surface backend error: {0}")]
    Backend(String),
}

/// One physical switch event as seen by the interceptor surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchInput {
    /// Short press.
    Activate,
    /// Long press; aborts scanning.
    Hold,
}

/// What the interceptor surface reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceInput {
    Switch(SwitchInput),
    /// The display was rotated or resized under the overlay.
    Resized(Extent),
}

/// Where the interceptor surface delivers its input.
#[derive(Clone)]
pub struct ActivationSink(Arc<dyn Fn(SurfaceInput) + Send + Sync>);

impl ActivationSink {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(SurfaceInput) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn deliver(&self, input: SurfaceInput) {
        (self.0)(input)
    }
}

impl fmt::Debug for ActivationSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ActivationSink")
    }
}

/// Platform window layer the compositor draws through.
///
/// Implementations create always-on-top transparent surfaces and rasterize
/// [`Frame`]s onto them. Calls come from the host task only.
#[cfg_attr(test, mockall::automock)]
pub trait SurfaceBackend: Send {
    /// Usable display size right now.
    fn display_extent(&self) -> Result<Extent, SurfaceError>;

    /// Create a surface. Interactive surfaces route input to `sink`.
    fn create_surface(
        &mut self,
        spec: SurfaceSpec,
        sink: Option<ActivationSink>,
    ) -> Result<SurfaceId, SurfaceError>;

    fn destroy_surface(&mut self, id: SurfaceId) -> Result<(), SurfaceError>;

    /// Replace the surface contents with `frame`.
    fn present(&mut self, id: SurfaceId, frame: &Frame) -> Result<(), SurfaceError>;
}

#[derive(Debug)]
struct HeadlessSurface {
    spec: SurfaceSpec,
    sink: Option<ActivationSink>,
    last_frame: Option<Frame>,
}

#[derive(Debug)]
struct HeadlessState {
    extent: Mutex<Extent>,
    next_id: AtomicU64,
    surfaces: Mutex<BTreeMap<SurfaceId, HeadlessSurface>>,
    created: AtomicUsize,
    destroyed: AtomicUsize,
    presented: AtomicUsize,
    fail_role: Mutex<Option<SurfaceRole>>,
}

/// In-memory backend with no window system behind it.
///
/// Used by the demo binary and the tests. A [`HeadlessHandle`] obtained
/// from [`handle()`](Self::handle) plays the part of the user's finger and
/// inspects what was drawn.
#[derive(Debug, Clone)]
pub struct HeadlessBackend {
    state: Arc<HeadlessState>,
}

impl HeadlessBackend {
    pub fn new(extent: Extent) -> Self {
        Self {
            state: Arc::new(HeadlessState {
                extent: Mutex::new(extent),
                next_id: AtomicU64::new(1),
                surfaces: Mutex::new(BTreeMap::new()),
                created: AtomicUsize::new(0),
                destroyed: AtomicUsize::new(0),
                presented: AtomicUsize::new(0),
                fail_role: Mutex::new(None),
            }),
        }
    }

    pub fn handle(&self) -> HeadlessHandle {
        HeadlessHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl SurfaceBackend for HeadlessBackend {
    fn display_extent(&self) -> Result<Extent, SurfaceError> {
        Ok(*self
            .state
            .extent
            .lock()
            .unwrap_or_else(PoisonError::into_inner))
    }

    fn create_surface(
        &mut self,
        spec: SurfaceSpec,
        sink: Option<ActivationSink>,
    ) -> Result<SurfaceId, SurfaceError> {
        let fail_role = *self
            .state
            .fail_role
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if fail_role == Some(spec.role) {
            return Err(SurfaceError::PermissionDenied);
        }

        let id = SurfaceId(self.state.next_id.fetch_add(1, Ordering::Relaxed));
        self.state
            .surfaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id,
                HeadlessSurface {
                    spec,
                    sink,
                    last_frame: None,
                },
            );
        self.state.created.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    fn destroy_surface(&mut self, id: SurfaceId) -> Result<(), SurfaceError> {
        let removed = self
            .state
            .surfaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        match removed {
            Some(_) => {
                self.state.destroyed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            None => Err(SurfaceError::UnknownSurface(id)),
        }
    }

    fn present(&mut self, id: SurfaceId, frame: &Frame) -> Result<(), SurfaceError> {
        let mut surfaces = self
            .state
            .surfaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let surface = surfaces.get_mut(&id).ok_or(SurfaceError::UnknownSurface(id))?;
        surface.last_frame = Some(frame.clone());
        self.state.presented.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Test and demo side of a [`HeadlessBackend`].
#[derive(Debug, Clone)]
pub struct HeadlessHandle {
    state: Arc<HeadlessState>,
}

impl HeadlessHandle {
    /// Short press on the interceptor. Returns false when no overlay is up.
    pub fn activate(&self) -> bool {
        self.deliver(SurfaceInput::Switch(SwitchInput::Activate))
    }

    /// Long press on the interceptor.
    pub fn hold(&self) -> bool {
        self.deliver(SurfaceInput::Switch(SwitchInput::Hold))
    }

    /// Change the display size. Returns false when no overlay saw it.
    pub fn resize_display(&self, extent: Extent) -> bool {
        *self
            .state
            .extent
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = extent;
        self.deliver(SurfaceInput::Resized(extent))
    }

    fn deliver(&self, input: SurfaceInput) -> bool {
        // The sink runs outside the lock; it may re-enter the backend.
        let sink = self
            .state
            .surfaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|surface| surface.spec.interactive)
            .and_then(|surface| surface.sink.clone());

        match sink {
            Some(sink) => {
                sink.deliver(input);
                true
            }
            None => false,
        }
    }

    pub fn live_surfaces(&self) -> usize {
        self.state
            .surfaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn created(&self) -> usize {
        self.state.created.load(Ordering::Relaxed)
    }

    pub fn destroyed(&self) -> usize {
        self.state.destroyed.load(Ordering::Relaxed)
    }

    pub fn presented(&self) -> usize {
        self.state.presented.load(Ordering::Relaxed)
    }

    /// Last frame presented on the indicator surface.
    pub fn last_frame(&self) -> Option<Frame> {
        self.state
            .surfaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|surface| surface.spec.role == SurfaceRole::Indicator)
            .and_then(|surface| surface.last_frame.clone())
    }

    /// Make every later creation of `role` fail with `PermissionDenied`.
    pub fn set_fail_creation(&self, role: Option<SurfaceRole>) {
        *self
            .state
            .fail_role
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = role;
    }
}
