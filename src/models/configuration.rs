use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identity of a configuration that has never been stored.
pub const UNASSIGNED_ID: i64 = -1;

const DEFAULT_BAR_WIDTH: u32 = 24;
const DEFAULT_SPEED: u32 = 10;

/// Which bar sweeps first.
///
/// The horizontal bar is a horizontal band travelling down/up the screen
/// (along y); the vertical bar is a vertical band travelling left/right
/// (along x).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    /// The orthogonal axis.
    pub fn other(self) -> Self {
        match self {
            Axis::Horizontal => Axis::Vertical,
            Axis::Vertical => Axis::Horizontal,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Horizontal => f.write_str("horizontal"),
            Axis::Vertical => f.write_str("vertical"),
        }
    }
}

/// Edge the horizontal bar starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizontalAnchor {
    Top,
    Bottom,
}

/// Edge the vertical bar starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalAnchor {
    Left,
    Right,
}

/// Errors raised when a configuration breaks its invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Illegal assignment with id={0}")]
    UnassignedIdentity(i64),

    #[error("{axis} speed must be greater than zero")]
    InvalidSpeed { axis: Axis },

    #[error("Bar width must be at least 1px, got {0}")]
    InvalidBarWidth(u32),
}

/// Scan parameters for one overlay session.
///
/// A configuration is built by the consumer and copied into the host when
/// the connection attaches or when the setter is called while attached. The
/// scan engine only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    id: i64,
    initial_axis: Axis,
    restart_from_last_position: bool,
    bar_width: u32,
    horizontal_speed: u32,
    vertical_speed: u32,
    horizontal_start_anchor: HorizontalAnchor,
    vertical_start_anchor: VerticalAnchor,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            id: UNASSIGNED_ID,
            initial_axis: Axis::Horizontal,
            restart_from_last_position: false,
            bar_width: DEFAULT_BAR_WIDTH,
            horizontal_speed: DEFAULT_SPEED,
            vertical_speed: DEFAULT_SPEED,
            horizontal_start_anchor: HorizontalAnchor::Top,
            vertical_start_anchor: VerticalAnchor::Left,
        }
    }
}

impl Configuration {
    /// Default configuration parameters.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    /// True when the configuration has an identity that can be persisted.
    pub fn has_identity(&self) -> bool {
        self.id != UNASSIGNED_ID
    }

    pub fn initial_axis(&self) -> Axis {
        self.initial_axis
    }

    pub fn set_initial_axis(&mut self, axis: Axis) {
        self.initial_axis = axis;
    }

    /// Whether a new session resumes from the last crossing.
    pub fn restart_from_last_position(&self) -> bool {
        self.restart_from_last_position
    }

    pub fn set_restart_from_last_position(&mut self, restart: bool) {
        self.restart_from_last_position = restart;
    }

    /// Half-thickness of each bar in pixels.
    pub fn bar_width(&self) -> u32 {
        self.bar_width
    }

    pub fn set_bar_width(&mut self, width: u32) {
        self.bar_width = width;
    }

    /// Pixels per tick travelled by the horizontal bar.
    pub fn horizontal_speed(&self) -> u32 {
        self.horizontal_speed
    }

    pub fn set_horizontal_speed(&mut self, speed: u32) {
        self.horizontal_speed = speed;
    }

    /// Pixels per tick travelled by the vertical bar.
    pub fn vertical_speed(&self) -> u32 {
        self.vertical_speed
    }

    pub fn set_vertical_speed(&mut self, speed: u32) {
        self.vertical_speed = speed;
    }

    pub fn horizontal_start_anchor(&self) -> HorizontalAnchor {
        self.horizontal_start_anchor
    }

    pub fn set_horizontal_start_anchor(&mut self, anchor: HorizontalAnchor) {
        self.horizontal_start_anchor = anchor;
    }

    pub fn vertical_start_anchor(&self) -> VerticalAnchor {
        self.vertical_start_anchor
    }

    pub fn set_vertical_start_anchor(&mut self, anchor: VerticalAnchor) {
        self.vertical_start_anchor = anchor;
    }

    /// Check the speed and width invariants.
    ///
    /// Bars wider than the display are accepted; they only make the scan
    /// visually meaningless.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.horizontal_speed == 0 {
            return Err(ConfigurationError::InvalidSpeed {
                axis: Axis::Horizontal,
            });
        }
        if self.vertical_speed == 0 {
            return Err(ConfigurationError::InvalidSpeed {
                axis: Axis::Vertical,
            });
        }
        if self.bar_width == 0 {
            return Err(ConfigurationError::InvalidBarWidth(self.bar_width));
        }
        Ok(())
    }

    /// Validate and additionally require a stored identity.
    pub fn validate_for_storage(&self) -> Result<(), ConfigurationError> {
        if !self.has_identity() {
            return Err(ConfigurationError::UnassignedIdentity(self.id));
        }
        self.validate()
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Configuration [id={}, initial_axis={}, restart_from_last_position={}, bar_width={}, \
             horizontal_speed={}, vertical_speed={}, horizontal_start_anchor={:?}, \
             vertical_start_anchor={:?}]",
            self.id,
            self.initial_axis,
            self.restart_from_last_position,
            self.bar_width,
            self.horizontal_speed,
            self.vertical_speed,
            self.horizontal_start_anchor,
            self.vertical_start_anchor
        )
    }
}
