//! Display lists for the scan indicator.
//!
//! A repaint produces a [`Frame`]: a flat list of [`DrawCommand`]s that a
//! [`SurfaceBackend`](super::SurfaceBackend) rasterizes however it likes.

use crate::engine::{Phase, ScanEngine};
use crate::models::Axis;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const ALPHA_OPAQUE: u8 = 255;
pub const ALPHA_HALF: u8 = 128;
pub const ALPHA_QUARTER: u8 = 64;

const BOX_STROKE: f32 = 2.0;
const DART_STROKE: f32 = 4.0;
const DART_ARM: f32 = 8.0;
const CORNER_RADIUS: f32 = 4.0;

/// An RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// The indicator's default blue.
    pub const HOLO_BLUE: Color = Color::rgb(0x00, 0x99, 0xcc);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: ALPHA_OPAQUE }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::HOLO_BLUE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != ALPHA_OPAQUE {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid colour '{0}', expected #rrggbb or #rrggbbaa")]
pub struct ParseColorError(String);

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        let invalid = || ParseColorError(s.to_string());

        // from_str_radix alone would let a sign through.
        if !(hex.len() == 6 || hex.len() == 8) || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        let mut color = Color::rgb(channel(0)?, channel(2)?, channel(4)?);
        if hex.len() == 8 {
            color.a = channel(6)?;
        }
        Ok(color)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaintStyle {
    Stroke { width: f32 },
    Fill,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    pub color: Color,
    pub style: PaintStyle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCommand {
    Rect {
        rect: Rect,
        paint: Paint,
    },
    RoundRect {
        rect: Rect,
        radius: f32,
        paint: Paint,
    },
    Circle {
        cx: f32,
        cy: f32,
        radius: f32,
        paint: Paint,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        paint: Paint,
    },
}

/// Everything drawn by one repaint. An empty frame clears the surface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub commands: Vec<DrawCommand>,
}

impl Frame {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }
}

/// Colour set used to paint the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Palette {
    base: Color,
}

impl Palette {
    pub fn new(base: Color) -> Self {
        Self { base }
    }

    pub fn base(&self) -> Color {
        self.base
    }

    fn outline(&self, alpha: u8) -> Paint {
        Paint {
            color: self.base.with_alpha(alpha),
            style: PaintStyle::Stroke { width: BOX_STROKE },
        }
    }

    fn fill(&self) -> Paint {
        Paint {
            color: self.base.with_alpha(ALPHA_QUARTER),
            style: PaintStyle::Fill,
        }
    }

    fn dart(&self) -> Paint {
        Paint {
            color: self.base.with_alpha(ALPHA_OPAQUE),
            style: PaintStyle::Stroke { width: DART_STROKE },
        }
    }
}

/// Build the frame for the engine's current phase.
pub fn render(engine: &ScanEngine, palette: &Palette) -> Frame {
    let mut frame = Frame::default();

    match engine.phase() {
        Phase::Sweep1 => {
            let moving = engine.moving_axis();
            push_bar(&mut frame, engine, moving, palette.outline(ALPHA_OPAQUE), palette);
        }
        Phase::Sweep2 => {
            let frozen = engine.initial_axis();
            push_bar(&mut frame, engine, frozen, palette.outline(ALPHA_HALF), palette);
            let moving = frozen.other();
            push_bar(&mut frame, engine, moving, palette.outline(ALPHA_OPAQUE), palette);
            push_dart(&mut frame, engine, palette);
        }
        Phase::Crossed | Phase::Paused => {}
    }

    frame
}

fn push_bar(frame: &mut Frame, engine: &ScanEngine, axis: Axis, outline: Paint, palette: &Palette) {
    let half = engine.bar_width() as f32;
    let extent = engine.extent();

    match axis {
        Axis::Horizontal => {
            let y = engine.horizontal_position();
            let rect = Rect {
                left: 0.0,
                top: y - half,
                right: extent.width,
                bottom: y + half,
            };
            frame.commands.push(DrawCommand::Rect { rect, paint: outline });
            frame.commands.push(DrawCommand::Rect {
                rect,
                paint: palette.fill(),
            });
        }
        Axis::Vertical => {
            let x = engine.vertical_position();
            let rect = Rect {
                left: x - half,
                top: 0.0,
                right: x + half,
                bottom: extent.height,
            };
            frame.commands.push(DrawCommand::RoundRect {
                rect,
                radius: CORNER_RADIUS,
                paint: outline,
            });
            frame.commands.push(DrawCommand::RoundRect {
                rect,
                radius: CORNER_RADIUS,
                paint: palette.fill(),
            });
        }
    }
}

fn push_dart(frame: &mut Frame, engine: &ScanEngine, palette: &Palette) {
    let cx = engine.vertical_position();
    let cy = engine.horizontal_position();
    let paint = palette.dart();

    frame.commands.push(DrawCommand::Circle {
        cx,
        cy,
        radius: engine.bar_width() as f32,
        paint,
    });
    frame.commands.push(DrawCommand::Line {
        from: (cx - DART_ARM, cy),
        to: (cx + DART_ARM, cy),
        paint,
    });
    frame.commands.push(DrawCommand::Line {
        from: (cx, cy - DART_ARM),
        to: (cx, cy + DART_ARM),
        paint,
    });
}
