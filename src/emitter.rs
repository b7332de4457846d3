//! Spouts that inject particles into the scene.
//!
//! Every spout launches particles from a fixed point with the same launch
//! velocity. The scheduler spawns at most one particle per spout per tick.
//!
//! # Layouts
//!
//! | Layout | Description |
//! |--------|-------------|
//! | [`SpoutLayout::Row`] | Adjacent spouts centered along the top edge, one diameter apart |
//! | [`SpoutLayout::Explicit`] | A user-supplied list of spout positions |
//!
//! # Example
//!
//! ```ignore
//! let spouts = SpoutConfig {
//!     count: 16,
//!     layout: SpoutLayout::Row,
//!     angle_degrees: 45.0,
//!     speed: 2400.0,
//! };
//! let built = spouts.build(1920.0, 4.0);
//! assert_eq!(built.len(), 16);
//! ```

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Where the spouts sit on the canvas.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum SpoutLayout {
    /// `count` spouts side by side along the top edge, centered horizontally.
    Row,
    /// Spouts at the given `[x, y]` canvas positions. `count` is ignored.
    Explicit(Vec<[f32; 2]>),
}

/// Spout placement and launch kinematics.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SpoutConfig {
    /// Number of spouts for [`SpoutLayout::Row`].
    pub count: usize,
    /// Placement strategy.
    pub layout: SpoutLayout,
    /// Launch angle in degrees, measured from +x towards +y (screen down).
    pub angle_degrees: f32,
    /// Launch speed in pixels per second.
    pub speed: f32,
}

impl Default for SpoutConfig {
    fn default() -> Self {
        Self {
            count: 16,
            layout: SpoutLayout::Row,
            angle_degrees: 45.0,
            speed: 2400.0,
        }
    }
}

impl SpoutConfig {
    /// Launch velocity shared by every spout.
    pub fn velocity(&self) -> Vec2 {
        let angle = self.angle_degrees.to_radians();
        Vec2::new(angle.cos(), angle.sin()) * self.speed
    }

    /// Resolve the layout into concrete spouts for a canvas of `width`.
    pub fn build(&self, width: f32, radius: f32) -> Vec<Spout> {
        let velocity = self.velocity();
        match &self.layout {
            SpoutLayout::Row => {
                let diameter = 2.0 * radius;
                let start_x = ((width - self.count as f32 * diameter) / 2.0).floor() + radius;
                (0..self.count)
                    .map(|i| Spout {
                        position: Vec2::new(start_x + i as f32 * diameter, radius),
                        velocity,
                    })
                    .collect()
            }
            SpoutLayout::Explicit(points) => points
                .iter()
                .map(|&[x, y]| Spout {
                    position: Vec2::new(x, y),
                    velocity,
                })
                .collect(),
        }
    }
}

/// A single resolved spout.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spout {
    /// Spawn position.
    pub position: Vec2,
    /// Launch velocity in pixels per second.
    pub velocity: Vec2,
}

impl Spout {
    /// Position and back-computed previous position for a new particle.
    ///
    /// The previous position is placed one sub-step behind along the launch
    /// velocity, so the first Verlet step moves the particle at exactly
    /// that velocity.
    pub fn launch(&self, dt: f32) -> (Vec2, Vec2) {
        (self.position, self.position - self.velocity * dt)
    }
}

/// Deterministic value in `[0, 1]` derived from a spawn index.
pub(crate) fn pseudo_random(seed: u32) -> f32 {
    let x = seed.wrapping_mul(1103515245).wrapping_add(12345);
    let x = x ^ (x >> 16);
    (x & 0x7FFFFFFF) as f32 / 0x7FFFFFFF as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_is_centered_and_adjacent() {
        let config = SpoutConfig {
            count: 4,
            ..Default::default()
        };
        let spouts = config.build(100.0, 5.0);
        let xs: Vec<f32> = spouts.iter().map(|s| s.position.x).collect();
        assert_eq!(xs, vec![35.0, 45.0, 55.0, 65.0]);
        assert!(spouts.iter().all(|s| s.position.y == 5.0));
    }

    #[test]
    fn test_explicit_layout_ignores_count() {
        let config = SpoutConfig {
            count: 99,
            layout: SpoutLayout::Explicit(vec![[1.0, 2.0], [3.0, 4.0]]),
            angle_degrees: 0.0,
            speed: 10.0,
        };
        let spouts = config.build(100.0, 5.0);
        assert_eq!(spouts.len(), 2);
        assert_eq!(spouts[1].position, Vec2::new(3.0, 4.0));
        assert!((spouts[0].velocity - Vec2::new(10.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_launch_reproduces_velocity() {
        let spout = Spout {
            position: Vec2::new(10.0, 10.0),
            velocity: Vec2::new(60.0, -30.0),
        };
        let dt = 1.0 / 120.0;
        let (pos, prev) = spout.launch(dt);
        let implied = (pos - prev) / dt;
        assert!((implied - spout.velocity).length() < 1e-3);
    }

    #[test]
    fn test_pseudo_random_range() {
        for seed in 0..1000 {
            let v = pseudo_random(seed);
            assert!((0.0..=1.0).contains(&v));
        }
    }
}
