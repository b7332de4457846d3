//! Fixed-capacity particle storage.
//!
//! Particles live in parallel arrays preallocated to the configured
//! capacity. Only the dense prefix `0..len()` is active; everything past it
//! is never read by the integrator or the collision resolver.

use glam::Vec2;
use std::f64::consts::PI;

/// An 8-bit RGB triple.
pub type Rgb = [u8; 3];

/// Color given to particles before their real color has been captured.
pub const UNCAPTURED: Rgb = [255, 255, 255];

/// Parallel particle arrays with a fixed capacity.
#[derive(Debug, Clone)]
pub struct ParticleStore {
    positions: Vec<Vec2>,
    previous: Vec<Vec2>,
    radii: Vec<f32>,
    colors: Vec<Rgb>,
    active: usize,
    occupied_area: f64,
}

/// Mutable view over the active slice, split so the integrator and the
/// resolver can write positions while reading radii.
pub struct ActiveMut<'a> {
    /// Current positions.
    pub positions: &'a mut [Vec2],
    /// Positions one sub-step ago.
    pub previous: &'a mut [Vec2],
    /// Per-particle radii.
    pub radii: &'a [f32],
}

impl ParticleStore {
    /// Allocate storage for `capacity` particles. Nothing is active yet.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: vec![Vec2::ZERO; capacity],
            previous: vec![Vec2::ZERO; capacity],
            radii: vec![0.0; capacity],
            colors: vec![UNCAPTURED; capacity],
            active: 0,
            occupied_area: 0.0,
        }
    }

    /// Maximum number of particles.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.positions.len()
    }

    /// Number of active particles.
    #[inline]
    pub fn len(&self) -> usize {
        self.active
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.active == 0
    }

    /// Whether every slot is in use.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.active == self.capacity()
    }

    /// Append a particle. Returns its index, or `None` at capacity.
    pub fn push(&mut self, position: Vec2, previous: Vec2, radius: f32, color: Rgb) -> Option<usize> {
        if self.is_full() {
            return None;
        }
        let i = self.active;
        self.positions[i] = position;
        self.previous[i] = previous;
        self.radii[i] = radius;
        self.colors[i] = color;
        self.active += 1;
        self.occupied_area += PI * (radius as f64) * (radius as f64);
        Some(i)
    }

    /// Deactivate every particle. Storage is kept.
    pub fn clear(&mut self) {
        self.active = 0;
        self.occupied_area = 0.0;
    }

    /// Total cross-sectional area of the active particles.
    #[inline]
    pub fn occupied_area(&self) -> f64 {
        self.occupied_area
    }

    #[inline]
    pub fn positions(&self) -> &[Vec2] {
        &self.positions[..self.active]
    }

    #[inline]
    pub fn previous(&self) -> &[Vec2] {
        &self.previous[..self.active]
    }

    #[inline]
    pub fn radii(&self) -> &[f32] {
        &self.radii[..self.active]
    }

    #[inline]
    pub fn colors(&self) -> &[Rgb] {
        &self.colors[..self.active]
    }

    /// Overwrite the color of an active particle.
    pub fn set_color(&mut self, index: usize, color: Rgb) {
        if index < self.active {
            self.colors[index] = color;
        }
    }

    /// Borrow the active slice for in-place updates.
    pub fn active_mut(&mut self) -> ActiveMut<'_> {
        let n = self.active;
        ActiveMut {
            positions: &mut self.positions[..n],
            previous: &mut self.previous[..n],
            radii: &self.radii[..n],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_until_full() {
        let mut store = ParticleStore::with_capacity(3);
        for i in 0..3 {
            let idx = store.push(Vec2::splat(i as f32), Vec2::ZERO, 1.0, UNCAPTURED);
            assert_eq!(idx, Some(i));
        }
        assert!(store.is_full());
        assert_eq!(store.push(Vec2::ZERO, Vec2::ZERO, 1.0, UNCAPTURED), None);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_clear_resets_area_and_count() {
        let mut store = ParticleStore::with_capacity(4);
        store.push(Vec2::ZERO, Vec2::ZERO, 2.0, UNCAPTURED);
        assert!((store.occupied_area() - PI * 4.0).abs() < 1e-9);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.occupied_area(), 0.0);
        assert!(store.positions().is_empty());
        assert_eq!(store.capacity(), 4);
    }

    #[test]
    fn test_active_slices_exclude_inactive() {
        let mut store = ParticleStore::with_capacity(10);
        store.push(Vec2::new(1.0, 2.0), Vec2::new(1.0, 1.0), 3.0, [1, 2, 3]);
        let view = store.active_mut();
        assert_eq!(view.positions.len(), 1);
        assert_eq!(view.previous.len(), 1);
        assert_eq!(view.radii, &[3.0]);
        assert_eq!(store.colors(), &[[1, 2, 3]]);
    }

    #[test]
    fn test_set_color_ignores_inactive_index() {
        let mut store = ParticleStore::with_capacity(2);
        store.push(Vec2::ZERO, Vec2::ZERO, 1.0, UNCAPTURED);
        store.set_color(1, [9, 9, 9]);
        store.set_color(0, [7, 7, 7]);
        assert_eq!(store.colors(), &[[7, 7, 7]]);
    }
}
