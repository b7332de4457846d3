//! Position Verlet integration with wall bounces.
//!
//! Each particle is advanced from its own current and previous position
//! only, so the per-particle update is independent of every other particle
//! and can be split across threads without changing the result.

use glam::Vec2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Active-count above which integration runs on the rayon pool.
pub const PARALLEL_THRESHOLD: usize = 8192;

/// Named integration preset.
///
/// Active phases run with [`Motion::ACTIVE`]. A settle phase may switch to
/// [`Motion::SETTLE`] to bleed off energy.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Motion {
    /// Multiplier applied to the implied velocity every sub-step.
    pub damping: f32,
    /// Fraction of the configured gravity that is applied.
    pub gravity_scale: f32,
    /// Fraction of the wall-normal velocity kept after a bounce.
    pub restitution: f32,
}

impl Motion {
    /// Full gravity, no damping.
    pub const ACTIVE: Motion = Motion {
        damping: 1.0,
        gravity_scale: 1.0,
        restitution: 0.8,
    };

    /// Reduced gravity with velocity damping.
    pub const SETTLE: Motion = Motion {
        damping: 0.95,
        gravity_scale: 0.2,
        restitution: 0.8,
    };
}

impl Default for Motion {
    fn default() -> Self {
        Motion::ACTIVE
    }
}

/// Per-call integration parameters.
#[derive(Clone, Copy, Debug)]
pub struct StepParams {
    /// Sub-step length in seconds.
    pub dt: f32,
    /// Gravity along +y in pixels per second squared.
    pub gravity: f32,
    /// Canvas size; particles are kept inside `[r, size - r]`.
    pub bounds: Vec2,
    pub motion: Motion,
}

/// Advance every particle one sub-step.
///
/// `positions`, `previous` and `radii` must all be the active slice.
pub fn integrate(positions: &mut [Vec2], previous: &mut [Vec2], radii: &[f32], params: &StepParams) {
    debug_assert_eq!(positions.len(), previous.len());
    debug_assert_eq!(positions.len(), radii.len());

    let accel = params.gravity * params.motion.gravity_scale * params.dt * params.dt;

    if positions.len() >= PARALLEL_THRESHOLD {
        positions
            .par_iter_mut()
            .zip(previous.par_iter_mut())
            .zip(radii.par_iter())
            .for_each(|((pos, prev), &r)| step_particle(pos, prev, r, accel, params));
    } else {
        for ((pos, prev), &r) in positions.iter_mut().zip(previous.iter_mut()).zip(radii) {
            step_particle(pos, prev, r, accel, params);
        }
    }
}

#[inline]
fn step_particle(pos: &mut Vec2, prev: &mut Vec2, r: f32, accel: f32, params: &StepParams) {
    let old = *pos;
    let mut next = old + (old - *prev) * params.motion.damping;
    next.y += accel;

    // Velocity the particle would carry into the wall, per axis.
    let incoming = next - old;
    let mut new_prev = old;
    let e = params.motion.restitution;

    if next.x < r {
        next.x = r;
        new_prev.x = next.x + incoming.x * e;
    } else if next.x > params.bounds.x - r {
        next.x = params.bounds.x - r;
        new_prev.x = next.x + incoming.x * e;
    }
    if next.y < r {
        next.y = r;
        new_prev.y = next.y + incoming.y * e;
    } else if next.y > params.bounds.y - r {
        next.y = params.bounds.y - r;
        new_prev.y = next.y + incoming.y * e;
    }

    *pos = next;
    *prev = new_prev;
}
