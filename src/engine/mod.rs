//! Scan engine - the two-phase axis scanning state machine.
//!
//! A session starts in [`Phase::Sweep1`] with the configured initial bar
//! moving. The first switch activation freezes it and starts the orthogonal
//! bar ([`Phase::Sweep2`]); the second freezes that bar too and reports the
//! intersection as a [`Crossing`]. Bars bounce at the display edges rather
//! than wrapping around.
//!
//! The engine knows nothing about windows or timers: the host calls
//! [`ScanEngine::tick`] once per frame and [`ScanEngine::activate`] once per
//! switch activation, always from the same execution context.

use crate::models::{
    Axis, Configuration, Extent, HorizontalAnchor, Point, ResumeState, VerticalAnchor,
};

/// Phase of a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// The initial bar is moving.
    Sweep1,
    /// The initial bar is frozen and the second bar is moving.
    Sweep2,
    /// Both bars are frozen. Terminal for the session.
    Crossed,
    /// Ticking suspended by an external request.
    Paused,
}

impl Phase {
    /// True while a bar is moving and frames should keep coming.
    pub fn is_sweeping(self) -> bool {
        matches!(self, Phase::Sweep1 | Phase::Sweep2)
    }
}

/// Selected point plus the state needed to resume from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    pub point: Point,
    pub resume: ResumeState,
}

/// Result of feeding one switch activation to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activation {
    /// First bar frozen, second bar now sweeping.
    Advanced,
    /// Left the paused phase; a fresh first sweep started.
    Resumed,
    /// Both bars frozen.
    Crossed(Crossing),
    /// The session already crossed; nothing happened.
    Ignored,
}

/// The scanning automaton for one overlay session.
#[derive(Debug, Clone)]
pub struct ScanEngine {
    phase: Phase,
    initial_axis: Axis,
    moving_axis: Axis,
    h_pos: f32,
    v_pos: f32,
    h_dir: i8,
    v_dir: i8,
    h_speed: f32,
    v_speed: f32,
    bar_width: u32,
    extent: Extent,
}

impl ScanEngine {
    /// Start a session.
    ///
    /// Positions start at the configured anchors, heading inward. When the
    /// configuration asks to restart from the last position and `resume` is
    /// present, positions and directions are taken from it verbatim.
    pub fn new(conf: &Configuration, resume: Option<&ResumeState>, extent: Extent) -> Self {
        let (mut h_pos, mut h_dir) = match conf.horizontal_start_anchor() {
            HorizontalAnchor::Top => (0.0, 1),
            HorizontalAnchor::Bottom => (extent.height, -1),
        };
        let (mut v_pos, mut v_dir) = match conf.vertical_start_anchor() {
            VerticalAnchor::Left => (0.0, 1),
            VerticalAnchor::Right => (extent.width, -1),
        };

        if conf.restart_from_last_position() {
            if let Some(resume) = resume {
                v_pos = resume.pos_x;
                h_pos = resume.pos_y;
                v_dir = resume.dir_x;
                h_dir = resume.dir_y;
            }
        }

        Self {
            phase: Phase::Sweep1,
            initial_axis: conf.initial_axis(),
            moving_axis: conf.initial_axis(),
            h_pos,
            v_pos,
            h_dir,
            v_dir,
            h_speed: conf.horizontal_speed() as f32,
            v_speed: conf.vertical_speed() as f32,
            bar_width: conf.bar_width(),
            extent,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn initial_axis(&self) -> Axis {
        self.initial_axis
    }

    pub fn moving_axis(&self) -> Axis {
        self.moving_axis
    }

    /// Position of the horizontal bar (a y coordinate).
    pub fn horizontal_position(&self) -> f32 {
        self.h_pos
    }

    /// Position of the vertical bar (an x coordinate).
    pub fn vertical_position(&self) -> f32 {
        self.v_pos
    }

    pub fn horizontal_direction(&self) -> i8 {
        self.h_dir
    }

    pub fn vertical_direction(&self) -> i8 {
        self.v_dir
    }

    pub fn bar_width(&self) -> u32 {
        self.bar_width
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Current intersection of the two bars, truncated to whole pixels.
    pub fn point(&self) -> Point {
        Point::new(self.v_pos as i32, self.h_pos as i32)
    }

    /// Snapshot of positions and directions.
    pub fn resume_state(&self) -> ResumeState {
        ResumeState {
            pos_x: self.v_pos,
            pos_y: self.h_pos,
            dir_x: self.v_dir,
            dir_y: self.h_dir,
        }
    }

    /// Advance one frame.
    ///
    /// Moves the active bar while sweeping, then bounces both bars against
    /// their own bounds. Returns true if another frame is wanted.
    pub fn tick(&mut self) -> bool {
        if !self.phase.is_sweeping() {
            return false;
        }

        match self.moving_axis {
            Axis::Horizontal => self.h_pos += f32::from(self.h_dir) * self.h_speed,
            Axis::Vertical => self.v_pos += f32::from(self.v_dir) * self.v_speed,
        }

        bounce(&mut self.h_pos, &mut self.h_dir, self.extent.height);
        bounce(&mut self.v_pos, &mut self.v_dir, self.extent.width);

        true
    }

    /// Feed one switch activation.
    pub fn activate(&mut self) -> Activation {
        match self.phase {
            Phase::Sweep1 => {
                self.phase = Phase::Sweep2;
                self.moving_axis = self.moving_axis.other();
                Activation::Advanced
            }
            Phase::Sweep2 => {
                self.phase = Phase::Crossed;
                Activation::Crossed(Crossing {
                    point: self.point(),
                    resume: self.resume_state(),
                })
            }
            Phase::Paused => {
                self.restart_sweep();
                Activation::Resumed
            }
            Phase::Crossed => Activation::Ignored,
        }
    }

    /// Suspend ticking until the next activation.
    pub fn pause(&mut self) {
        if self.phase != Phase::Crossed {
            self.phase = Phase::Paused;
        }
    }

    /// Drop any frozen bar and start over with the initial axis.
    ///
    /// Positions are kept. Used when something else stole the input focus
    /// mid-scan (a soft keyboard popping up, for instance).
    pub fn reset(&mut self) {
        self.restart_sweep();
    }

    /// The display changed size; keep both bars on screen.
    pub fn resize(&mut self, extent: Extent) {
        self.extent = extent;
        self.h_pos = self.h_pos.clamp(0.0, extent.height.max(0.0));
        self.v_pos = self.v_pos.clamp(0.0, extent.width.max(0.0));
    }

    fn restart_sweep(&mut self) {
        self.moving_axis = self.initial_axis;
        self.phase = Phase::Sweep1;
    }
}

fn bounce(pos: &mut f32, dir: &mut i8, limit: f32) {
    if *pos >= limit {
        *pos = limit;
        *dir = -1;
    }
    if *pos <= 0.0 {
        *pos = 0.0;
        *dir = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn conf(h_speed: u32, v_speed: u32) -> Configuration {
        let mut conf = Configuration::default();
        conf.set_horizontal_speed(h_speed);
        conf.set_vertical_speed(v_speed);
        conf.set_bar_width(16);
        conf
    }

    fn square() -> Extent {
        Extent::new(100, 100)
    }

    #[test]
    fn test_reference_scenario() {
        let mut engine = ScanEngine::new(&conf(5, 5), None, square());

        for _ in 0..4 {
            engine.tick();
        }
        assert_eq!(engine.horizontal_position(), 20.0);

        assert_eq!(engine.activate(), Activation::Advanced);
        assert_eq!(engine.phase(), Phase::Sweep2);
        assert_eq!(engine.moving_axis(), Axis::Vertical);
        assert_eq!(engine.vertical_position(), 0.0);

        for _ in 0..3 {
            engine.tick();
        }
        assert_eq!(engine.vertical_position(), 15.0);
        assert_eq!(engine.horizontal_position(), 20.0);

        match engine.activate() {
            Activation::Crossed(crossing) => {
                assert_eq!(crossing.point, Point::new(15, 20));
                assert_eq!(crossing.resume, ResumeState::new(15.0, 20.0, 1, 1));
            }
            other => panic!("Expected crossing, got: {:?}", other),
        }
        assert_eq!(engine.phase(), Phase::Crossed);
    }

    #[test]
    fn test_bounce_at_far_edge() {
        let mut engine = ScanEngine::new(&conf(30, 5), None, square());

        engine.tick(); // 30
        engine.tick(); // 60
        engine.tick(); // 90
        engine.tick(); // 120 -> clamped
        assert_eq!(engine.horizontal_position(), 100.0);
        assert_eq!(engine.horizontal_direction(), -1);

        engine.tick();
        assert_eq!(engine.horizontal_position(), 70.0);
    }

    #[test]
    fn test_bottom_right_anchors_head_inward() {
        let mut c = conf(10, 10);
        c.set_horizontal_start_anchor(HorizontalAnchor::Bottom);
        c.set_vertical_start_anchor(VerticalAnchor::Right);
        let mut engine = ScanEngine::new(&c, None, Extent::new(200, 100));

        assert_eq!(engine.horizontal_position(), 100.0);
        assert_eq!(engine.vertical_position(), 200.0);

        engine.tick();
        assert_eq!(engine.horizontal_position(), 90.0);

        engine.activate();
        engine.tick();
        assert_eq!(engine.vertical_position(), 190.0);
    }

    #[test]
    fn test_vertical_first() {
        let mut c = conf(5, 7);
        c.set_initial_axis(Axis::Vertical);
        let mut engine = ScanEngine::new(&c, None, square());

        engine.tick();
        assert_eq!(engine.vertical_position(), 7.0);
        assert_eq!(engine.horizontal_position(), 0.0);

        engine.activate();
        engine.tick();
        engine.tick();
        assert_eq!(engine.horizontal_position(), 10.0);
        assert_eq!(engine.vertical_position(), 7.0);
    }

    #[test]
    fn test_resume_used_only_in_restart_mode() {
        let resume = ResumeState::new(42.0, 17.0, -1, -1);

        let plain = ScanEngine::new(&conf(5, 5), Some(&resume), square());
        assert_eq!(plain.vertical_position(), 0.0);
        assert_eq!(plain.horizontal_position(), 0.0);

        let mut c = conf(5, 5);
        c.set_restart_from_last_position(true);
        let resumed = ScanEngine::new(&c, Some(&resume), square());
        assert_eq!(resumed.resume_state(), resume);
    }

    #[test]
    fn test_pause_and_resume() {
        let mut engine = ScanEngine::new(&conf(5, 5), None, square());
        engine.tick();
        engine.activate();
        engine.pause();

        assert_eq!(engine.phase(), Phase::Paused);
        assert!(!engine.tick());
        assert_eq!(engine.vertical_position(), 0.0);

        assert_eq!(engine.activate(), Activation::Resumed);
        assert_eq!(engine.phase(), Phase::Sweep1);
        assert_eq!(engine.moving_axis(), Axis::Horizontal);
    }

    #[test]
    fn test_crossed_is_terminal() {
        let mut engine = ScanEngine::new(&conf(5, 5), None, square());
        engine.activate();
        engine.activate();

        assert!(!engine.tick());
        assert_eq!(engine.activate(), Activation::Ignored);
        engine.pause();
        assert_eq!(engine.phase(), Phase::Crossed);
    }

    #[test]
    fn test_reset_restarts_initial_sweep() {
        let mut engine = ScanEngine::new(&conf(5, 5), None, square());
        engine.tick();
        engine.activate();
        engine.reset();

        assert_eq!(engine.phase(), Phase::Sweep1);
        assert_eq!(engine.moving_axis(), Axis::Horizontal);
        assert_eq!(engine.horizontal_position(), 5.0);
    }

    #[test]
    fn test_activation_after_bounce_freezes_bounced_position() {
        let mut engine = ScanEngine::new(&conf(60, 5), None, square());
        engine.tick(); // 60
        engine.tick(); // 120 -> 100, bounced
        engine.activate();
        engine.activate();

        assert_eq!(engine.point().y, 100);
        assert_eq!(engine.resume_state().dir_y, -1);
    }

    #[test]
    fn test_resize_clamps_positions() {
        let mut c = conf(5, 5);
        c.set_horizontal_start_anchor(HorizontalAnchor::Bottom);
        let mut engine = ScanEngine::new(&c, None, Extent::new(100, 300));
        engine.resize(Extent::new(100, 50));
        assert_eq!(engine.horizontal_position(), 50.0);
    }

    #[test]
    fn test_sub_pixel_positions_truncate() {
        let mut c = conf(5, 5);
        c.set_restart_from_last_position(true);
        let resume = ResumeState::new(12.9, 33.7, 1, 1);
        let mut engine = ScanEngine::new(&c, Some(&resume), square());
        engine.activate();

        match engine.activate() {
            Activation::Crossed(crossing) => assert_eq!(crossing.point, Point::new(12, 33)),
            other => panic!("Expected crossing, got: {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn prop_moving_bar_stays_in_bounds(
            speed in 1u32..400,
            width in 1u32..2000,
            height in 1u32..2000,
            ticks in 0usize..500,
        ) {
            let mut engine = ScanEngine::new(&conf(speed, speed), None, Extent::new(width, height));
            for _ in 0..ticks {
                let before = engine.horizontal_position();
                let dir = engine.horizontal_direction();
                engine.tick();
                let pos = engine.horizontal_position();
                prop_assert!(pos >= 0.0 && pos <= height as f32);

                let unbounded = before + f32::from(dir) * speed as f32;
                if unbounded >= height as f32 {
                    prop_assert_eq!(engine.horizontal_direction(), -1);
                } else if unbounded <= 0.0 {
                    prop_assert_eq!(engine.horizontal_direction(), 1);
                } else {
                    prop_assert_eq!(engine.horizontal_direction(), dir);
                }
            }
        }

        #[test]
        fn prop_crossing_is_deterministic(
            h_speed in 1u32..50,
            v_speed in 1u32..50,
            first in 0usize..200,
            second in 0usize..200,
        ) {
            let run = || {
                let conf = conf(h_speed, v_speed);
                let mut engine = ScanEngine::new(&conf, None, Extent::new(640, 480));
                for _ in 0..first {
                    engine.tick();
                }
                engine.activate();
                for _ in 0..second {
                    engine.tick();
                }
                engine.activate()
            };
            prop_assert_eq!(run(), run());
        }

        #[test]
        fn prop_phases_only_move_forward(activations in 0usize..6) {
            let mut engine = ScanEngine::new(&conf(3, 3), None, square());
            let mut seen = vec![engine.phase()];
            for _ in 0..activations {
                engine.tick();
                engine.activate();
                seen.push(engine.phase());
            }
            let expected = [Phase::Sweep1, Phase::Sweep2, Phase::Crossed];
            for (index, phase) in seen.iter().enumerate() {
                prop_assert_eq!(*phase, expected[index.min(2)]);
            }
        }
    }
}
