use itertools::Itertools;
use micosi_concepts::{Generator, Real, SetupError, Vec3};
use micosi_core::interfaces::PoleUpdater;
use serde::{Deserialize, Serialize};

/// Positions of both poles at one point in time.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct PoleKeyframe {
    /// Model time
    pub time: f64,
    /// Position of the left pole
    pub left: Vec3,
    /// Position of the right pole
    pub right: Vec3,
}

/// Moves the poles along straight lines between keyframes.
///
/// Before the first and after the last keyframe the poles rest at the positions of the
/// nearest keyframe.
///
/// ```
/// # use micosi_building_blocks::prelude::*;
/// # use micosi_concepts::Vec3;
/// let updater = KeyframePoleUpdater::new(vec![
///     PoleKeyframe { time: 0.0, left: Vec3::new(-2.0, 0.0, 0.0), right: Vec3::new(2.0, 0.0, 0.0) },
///     PoleKeyframe { time: 10.0, left: Vec3::new(-4.0, 0.0, 0.0), right: Vec3::new(4.0, 0.0, 0.0) },
/// ]).unwrap();
/// let (left, right) = updater.positions(5.0);
/// assert_eq!(left.x, -3.0);
/// assert_eq!(right.x, 3.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct KeyframePoleUpdater {
    keyframes: Vec<PoleKeyframe>,
}

impl KeyframePoleUpdater {
    /// Requires at least one keyframe and strictly increasing times.
    pub fn new(keyframes: Vec<PoleKeyframe>) -> Result<Self, SetupError> {
        if keyframes.is_empty() {
            return Err(SetupError("pole coordinates contain no keyframes".into()));
        }
        if let Some((prev, next)) = keyframes
            .iter()
            .tuple_windows()
            .find(|(prev, next)| prev.time >= next.time)
        {
            return Err(SetupError(format!(
                "pole keyframes are not sorted: {} is followed by {}",
                prev.time, next.time
            )));
        }
        Ok(Self { keyframes })
    }

    /// All keyframes in order.
    pub fn keyframes(&self) -> &[PoleKeyframe] {
        &self.keyframes
    }

    /// Interpolated positions of the left and right pole at `time`.
    pub fn positions(&self, time: f64) -> (Vec3, Vec3) {
        let last = self.keyframes.len() - 1;
        let index = self.keyframes.partition_point(|k| k.time < time).min(last);
        let next = &self.keyframes[index];
        let prev = &self.keyframes[index.saturating_sub(1)];
        if prev.time == next.time {
            return (prev.left, prev.right);
        }
        let coeff = ((time.min(next.time) - prev.time) / (next.time - prev.time)) as Real;
        (
            next.left * coeff + prev.left * (1.0 - coeff),
            next.right * coeff + prev.right * (1.0 - coeff),
        )
    }
}

impl PoleUpdater for KeyframePoleUpdater {
    fn set_initial(&self, left: &mut Vec3, right: &mut Vec3, rng: &mut Generator) {
        self.move_poles(left, right, 0.0, rng);
    }

    fn move_poles(&self, left: &mut Vec3, right: &mut Vec3, time: f64, _rng: &mut Generator) {
        (*left, *right) = self.positions(time);
    }
}

#[cfg(test)]
mod test_keyframe {
    use super::*;
    use micosi_concepts::RandomEngine;

    fn frame(time: f64, x: Real) -> PoleKeyframe {
        PoleKeyframe {
            time,
            left: Vec3::new(-x, 0.0, 0.0),
            right: Vec3::new(x, 1.0, 0.0),
        }
    }

    #[test]
    fn rejects_bad_keyframes() {
        assert!(KeyframePoleUpdater::new(vec![]).is_err());
        assert!(KeyframePoleUpdater::new(vec![frame(1.0, 1.0), frame(1.0, 2.0)]).is_err());
        assert!(KeyframePoleUpdater::new(vec![frame(2.0, 1.0), frame(1.0, 2.0)]).is_err());
    }

    #[test]
    fn interpolates_and_clamps() {
        let updater =
            KeyframePoleUpdater::new(vec![frame(1.0, 2.0), frame(3.0, 4.0), frame(4.0, 8.0)])
                .unwrap();
        assert_eq!(updater.positions(0.0).0.x, -2.0);
        assert_eq!(updater.positions(1.0).0.x, -2.0);
        assert_eq!(updater.positions(2.0).0.x, -3.0);
        assert_eq!(updater.positions(3.0).1.x, 4.0);
        assert_eq!(updater.positions(3.5).1.x, 6.0);
        assert_eq!(updater.positions(100.0).1.x, 8.0);
        assert_eq!(updater.positions(2.0).1.y, 1.0);
    }

    #[test]
    fn single_keyframe_is_static() {
        let updater = KeyframePoleUpdater::new(vec![frame(5.0, 3.0)]).unwrap();
        let mut rng = Generator::from_seed_u32(1);
        let (mut left, mut right) = (Vec3::zeros(), Vec3::zeros());
        updater.set_initial(&mut left, &mut right, &mut rng);
        assert_eq!(left.x, -3.0);
        updater.move_poles(&mut left, &mut right, 9.0, &mut rng);
        assert_eq!(right.x, 3.0);
    }

    #[test]
    fn keyframes_from_json() {
        let json = r#"[{"time": 0.0, "left": [-1.0, 0.0, 0.0], "right": [1.0, 0.0, 0.0]}]"#;
        let keyframes: Vec<PoleKeyframe> = serde_json::from_str(json).unwrap();
        let updater = KeyframePoleUpdater::new(keyframes).unwrap();
        assert_eq!(updater.positions(0.0).1.x, 1.0);
    }
}
