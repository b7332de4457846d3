//! Double-buffered render snapshots.
//!
//! The scheduler publishes the particle positions once per tick; the render
//! loop reads a copy of the last two publications and blends between them.
//! A single mutex guards the pair and is held only while copying.
//!
//! ```text
//!  scheduler thread            render thread
//!  ----------------            -------------
//!  step world
//!  publish() ──lock──┐
//!                    │ previous <- current
//!                    │ current  <- positions
//!                    └─unlock
//!                               read_into() ──lock── copy pair ──unlock
//!                               alpha = (now - timestamp) / tick
//!                               lerp(previous, current, alpha)
//! ```

use crate::particles::{ParticleStore, Rgb};
use crate::phase::Phase;
use glam::Vec2;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// One consistent view of the particles for rendering.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Positions at the publish before last.
    pub previous: Vec<Vec2>,
    /// Positions at the last publish.
    pub current: Vec<Vec2>,
    pub radii: Vec<f32>,
    pub colors: Vec<Rgb>,
    /// Phase the scheduler was in when it published.
    pub phase: Phase,
    /// Store generation; changes whenever the scene is cleared.
    pub generation: u64,
    /// Number of publishes so far.
    pub sequence: u64,
    /// When the last publish happened. `None` before the first one.
    pub timestamp: Option<Instant>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            previous: Vec::new(),
            current: Vec::new(),
            radii: Vec::new(),
            colors: Vec::new(),
            phase: Phase::Filling,
            generation: 0,
            sequence: 0,
            timestamp: None,
        }
    }
}

impl Snapshot {
    /// Number of particles in the snapshot.
    #[inline]
    pub fn count(&self) -> usize {
        self.current.len()
    }

    /// Blend factor for a frame drawn at `now`.
    pub fn alpha(&self, now: Instant, tick: Duration) -> f32 {
        match self.timestamp {
            Some(ts) => interpolation_alpha(now.saturating_duration_since(ts), tick),
            None => 1.0,
        }
    }

    /// Position of particle `i` blended by `alpha`.
    #[inline]
    pub fn position_at(&self, i: usize, alpha: f32) -> Vec2 {
        self.previous[i].lerp(self.current[i], alpha)
    }

    /// Fill `out` with every position blended by `alpha`.
    pub fn interpolate_into(&self, alpha: f32, out: &mut Vec<Vec2>) {
        out.clear();
        out.extend(
            self.previous
                .iter()
                .zip(&self.current)
                .map(|(p, c)| p.lerp(*c, alpha)),
        );
    }
}

/// `clamp(elapsed / tick, 0, 1)`.
#[inline]
pub fn interpolation_alpha(elapsed: Duration, tick: Duration) -> f32 {
    if tick.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f32() / tick.as_secs_f32()).clamp(0.0, 1.0)
}

/// Mutex-guarded snapshot pair shared between the scheduler and the renderer.
#[derive(Debug, Default)]
pub struct SnapshotBuffer {
    inner: Mutex<Snapshot>,
}

impl SnapshotBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        // A panicking holder can only have been copying; the data is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the pair with the store's current state.
    ///
    /// Particles that did not exist at the previous publish, or every particle
    /// after the store was cleared, start with `previous == current`.
    pub fn publish(&self, store: &ParticleStore, generation: u64, phase: Phase, now: Instant) {
        let positions = store.positions();
        let n = positions.len();

        let mut snap = self.lock();
        let snap = &mut *snap;

        std::mem::swap(&mut snap.previous, &mut snap.current);
        snap.current.clear();
        snap.current.extend_from_slice(positions);

        if snap.generation != generation || snap.previous.len() > n {
            snap.previous.clear();
            snap.radii.clear();
            snap.colors.clear();
        }
        let known = snap.previous.len();
        snap.previous.extend_from_slice(&positions[known..]);

        // Radius and color never change after spawn; only copy new particles.
        let known = snap.radii.len();
        snap.radii.extend_from_slice(&store.radii()[known..]);
        snap.colors.extend_from_slice(&store.colors()[known..]);

        snap.phase = phase;
        snap.generation = generation;
        snap.sequence += 1;
        snap.timestamp = Some(now);
    }

    /// Copy the latest pair into `out`, reusing its allocations.
    pub fn read_into(&self, out: &mut Snapshot) {
        let snap = self.lock();
        out.previous.clone_from(&snap.previous);
        out.current.clone_from(&snap.current);
        out.radii.clone_from(&snap.radii);
        out.colors.clone_from(&snap.colors);
        out.phase = snap.phase;
        out.generation = snap.generation;
        out.sequence = snap.sequence;
        out.timestamp = snap.timestamp;
    }

    /// Copy of the latest pair.
    pub fn read(&self) -> Snapshot {
        let mut out = Snapshot::default();
        self.read_into(&mut out);
        out
    }

    /// Phase at the last publish, without copying positions.
    pub fn phase(&self) -> Phase {
        self.lock().phase
    }
}
