// State management module
//
// This module provides the StateManager which wraps HostStatus with thread-safe access
// using Arc<RwLock<T>> and emits change events for connections and the demo binary.

use crate::engine::Phase;
use crate::models::{HostStatus, Point, ResumeState};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when host status is modified
///
/// Subscribers get these instead of polling the status.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// Overlay surfaces are up and a new session started
    OverlayShown { session: u64 },

    /// Overlay surfaces were torn down
    OverlayHidden,

    /// The running session moved to another phase
    PhaseChanged { phase: Phase },

    /// Both bars froze at the given point
    Crossed { x: i32, y: i32 },

    /// The user aborted scanning with a long activation
    Aborted,

    /// A configuration was pushed to the host
    ConfigurationChanged { revision: u64 },

    /// The host is shutting down
    Finishing,
}

/// Thread-safe status holder with event emission
///
/// The host is the only writer. Every [`ServiceConnection`](crate::binding::ServiceConnection)
/// bound to the host holds a clone and can:
/// - [`snapshot()`](Self::snapshot) the current status
/// - [`read()`](Self::read) a single field through a closure
/// - [`subscribe()`](Self::subscribe) to [`StateChange`] events
pub struct StateManager {
    state: Arc<RwLock<HostStatus>>,

    /// Multiple subscribers can listen for changes
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a new StateManager with idle status
    ///
    /// # Returns
    /// A new StateManager with a broadcast channel buffer of 100 events
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(HostStatus::default())),
            state_tx,
        }
    }

    /// Get a clone of the current status
    pub fn snapshot(&self) -> HostStatus {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Execute a function with read access to the status
    ///
    /// # Example
    /// ```ignore
    /// let visible = state_manager.read(|status| status.overlay_visible);
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&HostStatus) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Update the status and emit change events
    ///
    /// Captures the old status, applies the update, and emits one event per
    /// detected difference.
    ///
    /// # Arguments
    /// * `update_fn` - A function that mutates the status
    ///
    /// # Returns
    /// The StateChange events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut HostStatus),
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = detect_changes(&old_state, &state);

        for change in &changes {
            // Nobody listening is fine
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    /// Subscribe to change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    // Convenience methods used by the host

    /// Record that the overlay is up and a new session started
    pub fn overlay_shown(&self) -> Vec<StateChange> {
        self.update(|state| {
            state.overlay_visible = true;
            state.phase = Some(Phase::Sweep1);
            state.sessions_started += 1;
        })
    }

    /// Record that the overlay is down
    pub fn overlay_hidden(&self) -> Vec<StateChange> {
        self.update(|state| {
            state.overlay_visible = false;
            state.phase = None;
        })
    }

    pub fn set_phase(&self, phase: Phase) -> Vec<StateChange> {
        self.update(|state| state.phase = Some(phase))
    }

    /// Record a crossing and its resume state
    ///
    /// The crossing event is sent even when the same point is selected twice.
    pub fn record_crossing(&self, point: Point, resume: ResumeState) -> Vec<StateChange> {
        let mut changes = self.update(|state| {
            state.phase = Some(Phase::Crossed);
            state.last_crossing = Some(point);
            state.resume = Some(resume);
        });

        let event = StateChange::Crossed {
            x: point.x,
            y: point.y,
        };
        let _ = self.state_tx.send(event.clone());
        changes.push(event);

        changes
    }

    /// Record a long-activation abort
    pub fn record_abort(&self) -> Vec<StateChange> {
        let event = StateChange::Aborted;
        let _ = self.state_tx.send(event.clone());
        vec![event]
    }

    pub fn configuration_pushed(&self) -> Vec<StateChange> {
        self.update(|state| state.configuration_revision += 1)
    }

    pub fn set_finishing(&self) -> Vec<StateChange> {
        self.update(|state| state.finishing = true)
    }
}

/// Detect what changed between two statuses and generate events
///
/// Crossings and aborts are not diffed; they are sent explicitly.
fn detect_changes(old: &HostStatus, new: &HostStatus) -> Vec<StateChange> {
    let mut changes = Vec::new();

    if old.overlay_visible != new.overlay_visible {
        if new.overlay_visible {
            changes.push(StateChange::OverlayShown {
                session: new.sessions_started,
            });
        } else {
            changes.push(StateChange::OverlayHidden);
        }
    }

    if old.phase != new.phase {
        if let Some(phase) = new.phase {
            changes.push(StateChange::PhaseChanged { phase });
        }
    }

    if old.configuration_revision != new.configuration_revision {
        changes.push(StateChange::ConfigurationChanged {
            revision: new.configuration_revision,
        });
    }

    if !old.finishing && new.finishing {
        changes.push(StateChange::Finishing);
    }

    changes
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}
