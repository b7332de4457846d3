//! Color capture and the persisted capture file.
//!
//! At the end of the first settle, every particle takes the color of the
//! source image under its center. The resulting [`CapturedColors`] table is
//! indexed by spawn order, so replaying the same emission sequence lands each
//! color back where it was sampled.
//!
//! The table is written as JSON:
//!
//! ```json
//! {
//!   "particleCount": 2,
//!   "particles": [
//!     { "color": [255, 0, 0], "radius": 4.0 },
//!     { "color": [0, 0, 255], "radius": 4.5 }
//!   ]
//! }
//! ```
//!
//! `radius` is optional when reading; records without it replay at the
//! configured base radius.

use crate::error::CaptureError;
use crate::particles::{ParticleStore, Rgb};
use glam::Vec2;
use image::imageops::FilterType;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Anything that can answer "what color is this pixel".
pub trait ColorSource: Send {
    /// Width and height in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Color at pixel `(x, y)`. Callers keep coordinates inside
    /// [`dimensions`](Self::dimensions).
    fn sample(&self, x: u32, y: u32) -> Rgb;

    /// Color under a canvas position, clamped to the nearest pixel.
    fn sample_at(&self, p: Vec2) -> Rgb {
        let (w, h) = self.dimensions();
        let x = (p.x.max(0.0) as u32).min(w.saturating_sub(1));
        let y = (p.y.max(0.0) as u32).min(h.saturating_sub(1));
        self.sample(x, y)
    }
}

/// A source image resized to the canvas.
#[derive(Debug, Clone)]
pub struct ImageColorSource {
    image: RgbImage,
    sample_radius: u32,
}

impl ImageColorSource {
    /// Load an image and stretch it to `width` x `height`.
    ///
    /// `sample_radius` is the half-width of the square neighbourhood each
    /// sample averages over; 0 reads a single pixel.
    pub fn open(
        path: impl AsRef<Path>,
        width: u32,
        height: u32,
        sample_radius: u32,
    ) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let img = image::open(path)?;
        log::info!(
            "Loaded source image {} ({}x{}), resizing to {}x{}",
            path.display(),
            img.width(),
            img.height(),
            width,
            height
        );
        let image = img.resize_exact(width, height, FilterType::Triangle).to_rgb8();
        Ok(Self::from_image(image, sample_radius))
    }

    /// Wrap an already decoded image.
    pub fn from_image(image: RgbImage, sample_radius: u32) -> Self {
        Self { image, sample_radius }
    }
}

impl ColorSource for ImageColorSource {
    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn sample(&self, x: u32, y: u32) -> Rgb {
        if self.sample_radius == 0 {
            return self.image.get_pixel(x, y).0;
        }

        let (w, h) = self.image.dimensions();
        let r = self.sample_radius;
        let (x0, x1) = (x.saturating_sub(r), (x + r).min(w - 1));
        let (y0, y1) = (y.saturating_sub(r), (y + r).min(h - 1));

        let mut sum = [0u32; 3];
        let mut count = 0u32;
        for sy in y0..=y1 {
            for sx in x0..=x1 {
                let px = self.image.get_pixel(sx, sy).0;
                for c in 0..3 {
                    sum[c] += px[c] as u32;
                }
                count += 1;
            }
        }
        [
            (sum[0] / count) as u8,
            (sum[1] / count) as u8,
            (sum[2] / count) as u8,
        ]
    }
}

/// One captured particle.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct CaptureRecord {
    pub color: Rgb,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f32>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptureFile {
    particle_count: usize,
    particles: Vec<CaptureRecord>,
}

/// Colors (and radii) of every particle at capture time, in spawn order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CapturedColors {
    records: Vec<CaptureRecord>,
}

impl CapturedColors {
    /// Sample a color for every active particle.
    pub fn capture(store: &ParticleStore, source: &dyn ColorSource) -> Self {
        let records = store
            .positions()
            .iter()
            .zip(store.radii())
            .map(|(&p, &r)| CaptureRecord {
                color: source.sample_at(p),
                radius: Some(r),
            })
            .collect();
        Self { records }
    }

    pub fn from_records(records: Vec<CaptureRecord>) -> Self {
        Self { records }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&CaptureRecord> {
        self.records.get(index)
    }

    #[inline]
    pub fn records(&self) -> &[CaptureRecord] {
        &self.records
    }

    pub fn to_json(&self) -> Result<String, CaptureError> {
        let file = CaptureFile {
            particle_count: self.records.len(),
            particles: self.records.clone(),
        };
        Ok(serde_json::to_string(&file)?)
    }

    /// Parse a capture file, rejecting one whose header count is wrong.
    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        let file: CaptureFile = serde_json::from_str(json)?;
        if file.particle_count != file.particles.len() {
            return Err(CaptureError::CountMismatch {
                declared: file.particle_count,
                found: file.particles.len(),
            });
        }
        Ok(Self {
            records: file.particles,
        })
    }

    /// Write the table to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CaptureError> {
        fs::write(path.as_ref(), self.to_json()?)?;
        log::info!("Wrote {} captured colors to {}", self.len(), path.as_ref().display());
        Ok(())
    }

    /// Read a table written by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let table = Self::from_json(&fs::read_to_string(path.as_ref())?)?;
        log::info!("Loaded {} captured colors from {}", table.len(), path.as_ref().display());
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb as Pixel;

    fn checker() -> ImageColorSource {
        let image = RgbImage::from_fn(4, 4, |x, y| {
            if (x + y) % 2 == 0 {
                Pixel([200, 0, 0])
            } else {
                Pixel([0, 0, 100])
            }
        });
        ImageColorSource::from_image(image, 0)
    }

    #[test]
    fn test_single_pixel_sample() {
        let source = checker();
        assert_eq!(source.sample(0, 0), [200, 0, 0]);
        assert_eq!(source.sample(1, 0), [0, 0, 100]);
    }

    #[test]
    fn test_sample_at_clamps_to_image() {
        let source = checker();
        assert_eq!(source.sample_at(Vec2::new(-10.0, -10.0)), [200, 0, 0]);
        assert_eq!(source.sample_at(Vec2::new(99.0, 99.0)), source.sample(3, 3));
        assert_eq!(source.sample_at(Vec2::new(1.9, 0.2)), source.sample(1, 0));
    }

    #[test]
    fn test_neighbourhood_average() {
        let image = RgbImage::from_fn(3, 3, |x, _| if x == 1 { Pixel([90, 90, 90]) } else { Pixel([0, 0, 0]) });
        let source = ImageColorSource::from_image(image, 1);
        assert_eq!(source.sample(1, 1), [30, 30, 30]);
        // Corner window is clipped to 2x2.
        assert_eq!(source.sample(0, 0), [45, 45, 45]);
    }

    #[test]
    fn test_capture_follows_store_order() {
        let mut store = ParticleStore::with_capacity(4);
        store.push(Vec2::new(0.5, 0.5), Vec2::ZERO, 1.0, [255; 3]);
        store.push(Vec2::new(1.5, 0.5), Vec2::ZERO, 1.5, [255; 3]);
        let table = CapturedColors::capture(&store, &checker());
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0).unwrap().color, [200, 0, 0]);
        assert_eq!(table.get(1).unwrap().color, [0, 0, 100]);
        assert_eq!(table.get(1).unwrap().radius, Some(1.5));
    }

    #[test]
    fn test_json_field_names() {
        let table = CapturedColors::from_records(vec![CaptureRecord {
            color: [1, 2, 3],
            radius: None,
        }]);
        let json = table.to_json().unwrap();
        assert_eq!(json, r#"{"particleCount":1,"particles":[{"color":[1,2,3]}]}"#);
    }
}
