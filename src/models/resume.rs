use serde::{Deserialize, Serialize};

/// Where the previous session froze, used to resume scanning there.
///
/// `pos_x`/`dir_x` belong to the vertical bar (it travels along x) and
/// `pos_y`/`dir_y` to the horizontal bar. Directions are always +1 or -1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResumeState {
    pub pos_x: f32,
    pub pos_y: f32,
    pub dir_x: i8,
    pub dir_y: i8,
}

impl ResumeState {
    pub fn new(pos_x: f32, pos_y: f32, dir_x: i8, dir_y: i8) -> Self {
        Self {
            pos_x,
            pos_y,
            dir_x: normalize_direction(dir_x),
            dir_y: normalize_direction(dir_y),
        }
    }
}

fn normalize_direction(dir: i8) -> i8 {
    if dir < 0 { -1 } else { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directions_normalized() {
        let state = ResumeState::new(1.0, 2.0, -5, 0);
        assert_eq!(state.dir_x, -1);
        assert_eq!(state.dir_y, 1);
    }
}
