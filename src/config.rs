//! Scene configuration.
//!
//! [`SceneConfig`] is the full tuning surface of a run. It can be built in
//! code with the `with_*` methods or loaded from JSON; missing JSON fields
//! fall back to the defaults.
//!
//! ```ignore
//! let config = SceneConfig::default()
//!     .with_canvas(1280, 720)
//!     .with_particle_radius(3.0)
//!     .with_source_image("portrait.png");
//! config.validate()?;
//! ```

use crate::emitter::{SpoutConfig, SpoutLayout};
use crate::error::ConfigError;
use crate::integrator::Motion;
use crate::render::RenderConfig;
use crate::spatial::GridDims;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete run configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SceneConfig {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Base particle radius in pixels.
    pub particle_radius: f32,
    /// Extra radius added per particle, scaled by a deterministic value in `[0, 1]`.
    pub radius_variation: f32,
    /// Gravity along +y in pixels per second squared.
    pub gravity: f32,
    /// Integration + collision passes per tick.
    pub sub_steps: u32,
    /// Scheduler tick length in seconds.
    pub tick_interval_secs: f32,
    /// Render and recording frame rate.
    pub render_fps: u32,
    pub spouts: SpoutConfig,
    /// Fraction of the canvas area covered by particles that ends filling.
    pub fill_threshold: f32,
    /// Fraction of the captured particles that ends replaying.
    pub replay_fraction: f32,
    /// Settle time after filling, before colors are captured.
    pub settle_secs: f32,
    /// Settle time after replaying, before the run stops.
    pub final_settle_secs: f32,
    /// Particle capacity.
    pub max_particles: usize,
    /// Fraction of an overlap removed per collision pass.
    pub correction_factor: f32,
    /// Spatial grid cell size. Defaults to the largest particle diameter.
    pub cell_size: Option<f32>,
    /// Integration preset while spawning.
    pub motion: Motion,
    /// Integration preset while settling.
    pub settle_motion: Motion,
    /// Bounded frame queue length.
    pub frame_queue_capacity: usize,
    /// Image the captured colors are sampled from.
    pub source_image: PathBuf,
    /// Where the captured color table is written, if anywhere.
    pub capture_path: Option<PathBuf>,
    /// Skip filling and replay a previously written capture file.
    pub replay_from: Option<PathBuf>,
    /// Video output path. `.gif` selects the GIF encoder, anything else ffmpeg.
    pub output: PathBuf,
    /// Half-width of the pixel neighbourhood averaged per sample (0 = one pixel).
    pub color_sample_radius: u32,
    pub render: RenderConfig,
    /// Record the filling phase too, not just the replay.
    pub record_fill_phase: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            particle_radius: 4.0,
            radius_variation: 0.0,
            gravity: 1000.0,
            sub_steps: 8,
            tick_interval_secs: 1.0 / 60.0,
            render_fps: 60,
            spouts: SpoutConfig::default(),
            fill_threshold: 0.99,
            replay_fraction: 0.99,
            settle_secs: 10.0,
            final_settle_secs: 10.0,
            max_particles: 3_000_000,
            correction_factor: 0.3,
            cell_size: None,
            motion: Motion::ACTIVE,
            settle_motion: Motion::ACTIVE,
            frame_queue_capacity: 1000,
            source_image: PathBuf::from("source_image.png"),
            capture_path: Some(PathBuf::from("ball_data.json")),
            replay_from: None,
            output: PathBuf::from("output.mp4"),
            color_sample_radius: 0,
            render: RenderConfig::default(),
            record_fill_phase: false,
        }
    }
}

impl SceneConfig {
    /// Load a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        let config: SceneConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.width == 0 || self.height == 0 {
            return invalid(format!("canvas must be non-empty, got {}x{}", self.width, self.height));
        }
        if !(self.particle_radius > 0.0) || self.radius_variation < 0.0 {
            return invalid("particle radius must be positive and variation non-negative".into());
        }
        if 2.0 * self.max_radius() > self.width.min(self.height) as f32 {
            return invalid("particles do not fit on the canvas".into());
        }
        if self.sub_steps == 0 {
            return invalid("sub_steps must be at least 1".into());
        }
        if !(self.tick_interval_secs > 0.0) {
            return invalid("tick_interval_secs must be positive".into());
        }
        if self.render_fps == 0 {
            return invalid("render_fps must be at least 1".into());
        }
        if self.max_particles == 0 {
            return invalid("max_particles must be at least 1".into());
        }
        if self.frame_queue_capacity == 0 {
            return invalid("frame_queue_capacity must be at least 1".into());
        }
        if self.spouts.build(self.width as f32, self.particle_radius).is_empty() {
            return invalid("at least one spout is required".into());
        }
        if self.spouts.layout == SpoutLayout::Row
            && self.spouts.count as f32 * 2.0 * self.particle_radius > self.width as f32
        {
            return invalid(format!("{} spouts do not fit across the canvas", self.spouts.count));
        }
        if !(0.0..=1.0).contains(&self.correction_factor) {
            return invalid(format!("correction_factor {} outside [0, 1]", self.correction_factor));
        }
        if self.cell_size() < 2.0 * self.max_radius() {
            return invalid(format!(
                "cell size {} is smaller than the largest particle diameter {}",
                self.cell_size(),
                2.0 * self.max_radius()
            ));
        }
        if self.settle_secs < 0.0 || self.final_settle_secs < 0.0 {
            return invalid("settle durations must be non-negative".into());
        }
        Ok(())
    }

    /// Set the canvas size.
    pub fn with_canvas(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the base particle radius.
    pub fn with_particle_radius(mut self, radius: f32) -> Self {
        self.particle_radius = radius;
        self
    }

    /// Set gravity.
    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the spouts.
    pub fn with_spouts(mut self, spouts: SpoutConfig) -> Self {
        self.spouts = spouts;
        self
    }

    /// Set the fill threshold.
    pub fn with_fill_threshold(mut self, threshold: f32) -> Self {
        self.fill_threshold = threshold;
        self
    }

    /// Set both settle durations.
    pub fn with_settle_secs(mut self, settle: f32, final_settle: f32) -> Self {
        self.settle_secs = settle;
        self.final_settle_secs = final_settle;
        self
    }

    /// Set the particle capacity.
    pub fn with_max_particles(mut self, max: usize) -> Self {
        self.max_particles = max;
        self
    }

    /// Set the integration preset used while settling.
    pub fn with_settle_motion(mut self, motion: Motion) -> Self {
        self.settle_motion = motion;
        self
    }

    /// Set the source image.
    pub fn with_source_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_image = path.into();
        self
    }

    /// Set the video output path.
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = path.into();
        self
    }

    /// Set where the capture file is written.
    pub fn with_capture_path(mut self, path: Option<PathBuf>) -> Self {
        self.capture_path = path;
        self
    }

    /// Largest radius any particle can have.
    #[inline]
    pub fn max_radius(&self) -> f32 {
        self.particle_radius + self.radius_variation
    }

    /// Radius of the particle spawned `index`-th during filling.
    pub fn radius_for(&self, index: usize) -> f32 {
        if self.radius_variation == 0.0 {
            self.particle_radius
        } else {
            self.particle_radius + self.radius_variation * crate::emitter::pseudo_random(index as u32)
        }
    }

    /// Spatial grid cell size.
    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size.unwrap_or(2.0 * self.max_radius())
    }

    /// Spatial grid covering the canvas.
    pub fn grid_dims(&self) -> GridDims {
        GridDims::covering(self.width as f32, self.height as f32, self.cell_size())
    }

    /// Scheduler tick length.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f32(self.tick_interval_secs)
    }

    /// Integration sub-step length in seconds.
    #[inline]
    pub fn dt(&self) -> f32 {
        self.tick_interval_secs / self.sub_steps as f32
    }

    /// Canvas area in square pixels.
    #[inline]
    pub fn canvas_area(&self) -> f64 {
        self.width as f64 * self.height as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        SceneConfig::default().validate().unwrap();
    }

    #[test]
    fn test_derived_values() {
        let config = SceneConfig::default();
        assert_eq!(config.cell_size(), 8.0);
        assert!((config.dt() - 1.0 / 480.0).abs() < 1e-9);
        let dims = config.grid_dims();
        assert_eq!(dims.cells_x, 1920 / 8 + 1);
        assert_eq!(dims.cells_y, 1080 / 8 + 1);
    }

    #[test]
    fn test_rejects_small_cells() {
        let config = SceneConfig {
            cell_size: Some(5.0),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_zero_sub_steps() {
        let config = SceneConfig {
            sub_steps: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_spout_row_wider_than_canvas() {
        let config = SceneConfig::default().with_canvas(100, 100);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SceneConfig = serde_json::from_str(r#"{ "width": 640, "height": 480 }"#).unwrap();
        assert_eq!(config.width, 640);
        assert_eq!(config.sub_steps, 8);
        assert_eq!(config.spouts.count, 16);
    }

    #[test]
    fn test_radius_variation_is_deterministic_and_bounded() {
        let config = SceneConfig {
            radius_variation: 2.0,
            ..Default::default()
        };
        for i in 0..100 {
            let r = config.radius_for(i);
            assert!((4.0..=6.0).contains(&r));
            assert_eq!(r, config.radius_for(i));
        }
        assert_eq!(config.cell_size(), 12.0);
    }
}
