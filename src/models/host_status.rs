use super::{Point, ResumeState};
use crate::engine::Phase;

/// Observable state of the overlay host.
///
/// The host is the only writer; connections and the demo binary read
/// snapshots through [`StateManager`](crate::state::StateManager), which
/// also turns updates into [`StateChange`](crate::state::StateChange)
/// events.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HostStatus {
    /// Both overlay surfaces exist.
    pub overlay_visible: bool,

    /// Phase of the current session, `None` while no session is running.
    pub phase: Option<Phase>,

    /// Sessions started since the host came up.
    pub sessions_started: u64,

    // Last selection
    pub last_crossing: Option<Point>,
    pub resume: Option<ResumeState>,

    /// Set once the host has been asked to unbind. No more overlays after that.
    pub finishing: bool,

    /// Bumped on every configuration push.
    pub configuration_revision: u64,
}

impl HostStatus {
    /// True when a session is running and a bar is moving.
    pub fn is_scanning(&self) -> bool {
        self.overlay_visible && self.phase.is_some_and(Phase::is_sweeping)
    }
}
