//! The owned simulation world.
//!
//! [`World`] bundles the particle store, the spatial grid and the resolved
//! spouts with the physical constants of a run. It is owned by exactly one
//! thread at a time; other threads only ever see copies of its positions.

use crate::capture::CapturedColors;
use crate::config::SceneConfig;
use crate::emitter::Spout;
use crate::integrator::{integrate, Motion, StepParams};
use crate::particles::{ParticleStore, Rgb};
use crate::spatial::SpatialHash;
use glam::Vec2;

/// Particle state plus the constants needed to step it.
#[derive(Debug, Clone)]
pub struct World {
    store: ParticleStore,
    hash: SpatialHash,
    spouts: Vec<Spout>,
    bounds: Vec2,
    gravity: f32,
    dt: f32,
    sub_steps: u32,
    correction: f32,
    canvas_area: f64,
    /// Bumped every time the store is cleared.
    generation: u64,
}

impl World {
    /// Build an empty world for a validated configuration.
    pub fn new(config: &SceneConfig) -> Self {
        Self {
            store: ParticleStore::with_capacity(config.max_particles),
            hash: SpatialHash::new(config.grid_dims()),
            spouts: config.spouts.build(config.width as f32, config.particle_radius),
            bounds: Vec2::new(config.width as f32, config.height as f32),
            gravity: config.gravity,
            dt: config.dt(),
            sub_steps: config.sub_steps,
            correction: config.correction_factor,
            canvas_area: config.canvas_area(),
            generation: 0,
        }
    }

    /// Run one tick: `sub_steps` rounds of integration followed by a
    /// collision pass.
    pub fn step(&mut self, motion: Motion) {
        let params = StepParams {
            dt: self.dt,
            gravity: self.gravity,
            bounds: self.bounds,
            motion,
        };
        for _ in 0..self.sub_steps {
            let view = self.store.active_mut();
            integrate(view.positions, view.previous, view.radii, &params);
            self.hash.rebuild(view.positions);
            self.hash.resolve(view.positions, view.radii, self.correction);
        }
    }

    /// Launch a particle from spout `spout`. Returns its index, or `None` at
    /// capacity.
    pub fn spawn(&mut self, spout: usize, radius: f32, color: Rgb) -> Option<usize> {
        let (position, previous) = self.spouts[spout].launch(self.dt);
        self.store.push(position, previous, radius, color)
    }

    /// Fraction of the canvas covered by particle cross-sections.
    #[inline]
    pub fn fullness(&self) -> f64 {
        self.store.occupied_area() / self.canvas_area
    }

    /// Give every particle its captured color, in spawn order.
    pub fn paint(&mut self, table: &CapturedColors) {
        for (i, record) in table.records().iter().enumerate() {
            self.store.set_color(i, record.color);
        }
    }

    /// Remove every particle.
    pub fn clear(&mut self) {
        self.store.clear();
        self.generation += 1;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.store.is_full()
    }

    #[inline]
    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    #[inline]
    pub fn spouts(&self) -> &[Spout] {
        &self.spouts
    }

    /// Canvas size in pixels.
    #[inline]
    pub fn bounds(&self) -> Vec2 {
        self.bounds
    }

    /// Integration sub-step length.
    #[inline]
    pub fn dt(&self) -> f32 {
        self.dt
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
