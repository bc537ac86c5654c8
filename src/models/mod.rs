//! Data models for axishud.
//!
//! - [`Configuration`]: scan parameters pushed from a connection to the host
//! - [`Extent`] and [`Point`]: display geometry
//! - [`ResumeState`]: where the last session froze
//! - [`HostStatus`]: observable host state, owned by [`StateManager`](crate::state::StateManager)

pub mod configuration;
pub mod geometry;
pub mod host_status;
pub mod resume;

pub use configuration::{
    Axis, Configuration, ConfigurationError, HorizontalAnchor, UNASSIGNED_ID, VerticalAnchor,
};
pub use geometry::{Extent, Point};
pub use host_status::HostStatus;
pub use resume::ResumeState;
