//! CPU rasterization of snapshots into RGB frames.
//!
//! Frames are drawn at the canvas resolution whether or not a window is
//! open, so the recording is identical in headless and windowed runs.

use crate::particles::Rgb;
use crate::snapshot::Snapshot;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Particles closer than this to their spout are not drawn.
pub const SPOUT_HIDE_DISTANCE: f32 = 2.0;

/// Drawing options.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Canvas clear color.
    pub background: Rgb,
    /// Draw a 1 px outline around every particle.
    pub borders: bool,
    pub border_color: Rgb,
    /// Skip particles that have not left their spout yet.
    pub hide_at_spout: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            background: [0, 0, 0],
            borders: false,
            border_color: [0, 0, 0],
            hide_at_spout: true,
        }
    }
}

/// An RGB8 image, row-major, top row first.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Order in which the frame was produced.
    pub sequence: u64,
    pub pixels: Vec<Rgb>,
}

impl Frame {
    /// A frame filled with `color`.
    pub fn new(width: u32, height: u32, color: Rgb) -> Self {
        Self {
            width,
            height,
            sequence: 0,
            pixels: vec![color; width as usize * height as usize],
        }
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Rgb {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    /// Packed `rgb24` bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Packed `rgba8` bytes with opaque alpha.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixels.len() * 4);
        for &[r, g, b] in &self.pixels {
            out.extend_from_slice(&[r, g, b, 255]);
        }
        out
    }
}

/// Draws snapshots as filled circles.
#[derive(Debug, Clone)]
pub struct Rasterizer {
    config: RenderConfig,
    width: u32,
    height: u32,
    spouts: Vec<Vec2>,
    sequence: u64,
}

impl Rasterizer {
    /// `spouts` are the spawn points in spout order, used to hide particles
    /// that have just been emitted.
    pub fn new(width: u32, height: u32, spouts: Vec<Vec2>, config: RenderConfig) -> Self {
        Self {
            config,
            width,
            height,
            spouts,
            sequence: 0,
        }
    }

    /// Render `snapshot` blended by `alpha` into a new frame.
    pub fn render(&mut self, snapshot: &Snapshot, alpha: f32) -> Frame {
        let mut frame = Frame::new(self.width, self.height, self.config.background);
        frame.sequence = self.sequence;
        self.sequence += 1;

        for i in 0..snapshot.count() {
            let center = snapshot.position_at(i, alpha);
            if self.config.hide_at_spout && self.near_spout(i, center) {
                continue;
            }
            self.fill_circle(&mut frame, center, snapshot.radii[i], snapshot.colors[i]);
        }
        frame
    }

    /// Output size in pixels.
    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Frames rendered so far.
    #[inline]
    pub fn frames(&self) -> u64 {
        self.sequence
    }

    /// Particle `i` was emitted by spout `i % spouts`.
    fn near_spout(&self, i: usize, center: Vec2) -> bool {
        if self.spouts.is_empty() {
            return false;
        }
        let spout = self.spouts[i % self.spouts.len()];
        center.distance(spout) < SPOUT_HIDE_DISTANCE
    }

    fn fill_circle(&self, frame: &mut Frame, center: Vec2, radius: f32, color: Rgb) {
        let x0 = (center.x - radius).floor().max(0.0) as i64;
        let y0 = (center.y - radius).floor().max(0.0) as i64;
        let x1 = ((center.x + radius).ceil() as i64).min(self.width as i64 - 1);
        let y1 = ((center.y + radius).ceil() as i64).min(self.height as i64 - 1);

        let r2 = radius * radius;
        let inner = (radius - 1.0).max(0.0);
        let inner2 = inner * inner;

        for y in y0..=y1 {
            let dy = y as f32 + 0.5 - center.y;
            let row = y as usize * self.width as usize;
            for x in x0..=x1 {
                let dx = x as f32 + 0.5 - center.x;
                let d2 = dx * dx + dy * dy;
                if d2 > r2 {
                    continue;
                }
                frame.pixels[row + x as usize] = if self.config.borders && d2 > inner2 {
                    self.config.border_color
                } else {
                    color
                };
            }
        }
    }
}
