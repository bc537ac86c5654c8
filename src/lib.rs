// axishud - single-switch axis scanning overlay
//
// This is the library crate containing the scan engine, the overlay host and the
// client connection. The binary crate (main.rs) is a headless stdin-driven demo.

pub mod binding;
pub mod config;
pub mod engine;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod overlay;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use binding::{
    BindError, ConnectionListener, HostProvider, LocalHostProvider, ServiceConnection,
};
pub use config::{ConfigurationStore, HostSettings};
pub use engine::{Activation, Phase, ScanEngine};
pub use models::{Axis, Configuration, HorizontalAnchor, ResumeState, VerticalAnchor};
pub use services::{CrossListener, TapInjector};
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
