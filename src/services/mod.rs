//! Services module - the overlay host and the tap worker it uses.
//!
//! # Components
//!
//! - [`HostService`]: owns one [`ScanEngine`](crate::engine::ScanEngine) and one
//!   [`OverlayCompositor`](crate::overlay::OverlayCompositor) per session and reacts to
//!   [`HostEvent`]s. [`run_host`] drives it on a single tokio task, interleaving
//!   events with the frame deadline.
//!
//! - [`ClickInjector`]: taps at a crossing through a [`TapInjector`] on a blocking
//!   worker, then posts [`HostEvent::InjectionFinished`] back to the host.
//!
//! # Threading
//!
//! The host task is the only place that touches the engine, the compositor or
//! the configuration. Taps are the only work that leaves it; their completion
//! comes back as a message, so the host never waits on input injection.

pub mod host;
pub mod injector;

pub use host::{
    AbortListener, CrossListener, Flow, HostEvent, HostService, ListenerOwner, run_host,
};
#[cfg(feature = "enigo")]
pub use injector::EnigoInjector;
pub use injector::{ClickInjector, InjectionError, LoggingInjector, TapInjector};
