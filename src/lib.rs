//! # spoutfill
//!
//! Fills a canvas with particles poured from spouts, paints every particle
//! with the color of an image underneath it, then pours the same particles
//! again so the image assembles itself, and records the result as video.
//!
//! ## Quick Start
//!
//! ```ignore
//! use spoutfill::prelude::*;
//!
//! fn main() -> Result<(), RunError> {
//!     let config = SceneConfig::default()
//!         .with_canvas(1280, 720)
//!         .with_source_image("portrait.png")
//!         .with_output("portrait.mp4");
//!
//!     let summary = Pipeline::from_config(config)?.run_headless()?;
//!     println!("{:?}", summary);
//!     Ok(())
//! }
//! ```
//!
//! ## How a run works
//!
//! The [`Scheduler`] steps the physics at a fixed tick and moves through the
//! run's [`Phase`]s:
//!
//! | Phase | What happens |
//! |-------|--------------|
//! | [`Phase::Filling`] | Spouts emit white particles until the canvas is full |
//! | [`Phase::Settling1`] | The pile settles, then colors are sampled from the image |
//! | [`Phase::Replaying`] | The canvas is cleared and the same sequence is replayed in color |
//! | [`Phase::Settling2`] | The replayed pile settles, then the run ends |
//!
//! Because each tick uses the same fixed sub-step, replaying the emission
//! sequence reproduces the same pile, so each particle comes to rest close to
//! where its color was sampled.
//!
//! ## Physics
//!
//! - [`integrator`]: position Verlet under gravity with wall bounces,
//!   parallel over particles for large counts.
//! - [`spatial`]: a uniform grid rebuilt every sub-step; overlapping pairs
//!   are pushed apart by a fraction of their overlap.
//!
//! ## Threads
//!
//! [`Pipeline`] runs the scheduler, the render loop and the video encoder on
//! separate threads. The scheduler publishes positions through a
//! [`SnapshotBuffer`], and the renderer interpolates between the last two
//! snapshots. Rendered frames go through a bounded queue to the encoder,
//! and frames are dropped rather than stalling the renderer.
//!
//! ## Features
//!
//! - `viewer`: opens a winit/wgpu window that shows the frames as they are
//!   rendered ([`Pipeline::run_windowed`]).

pub mod capture;
pub mod config;
pub mod emitter;
pub mod error;
pub mod integrator;
pub mod particles;
pub mod phase;
pub mod pipeline;
pub mod recorder;
pub mod render;
pub mod scheduler;
pub mod shader;
pub mod snapshot;
pub mod spatial;
pub mod time;
#[cfg(feature = "viewer")]
mod window;
pub mod world;

pub use capture::{CaptureRecord, CapturedColors, ColorSource, ImageColorSource};
pub use config::SceneConfig;
pub use emitter::{Spout, SpoutConfig, SpoutLayout};
pub use error::{CaptureError, ConfigError, RecordError, RunError};
#[cfg(feature = "viewer")]
pub use error::ViewerError;
pub use glam::Vec2;
pub use integrator::Motion;
pub use particles::{ParticleStore, Rgb};
pub use phase::Phase;
pub use pipeline::{CancelToken, Pipeline, RunSummary};
pub use recorder::{FrameSink, RecordStats, Recorder, StopSignal};
pub use render::{Frame, RenderConfig};
pub use scheduler::{Scheduler, SchedulerReport};
pub use snapshot::{Snapshot, SnapshotBuffer};
pub use world::World;

/// Convenient imports for typical use.
///
/// ```ignore
/// use spoutfill::prelude::*;
/// ```
pub mod prelude {
    pub use crate::capture::{CapturedColors, ColorSource, ImageColorSource};
    pub use crate::config::SceneConfig;
    pub use crate::emitter::{SpoutConfig, SpoutLayout};
    pub use crate::error::RunError;
    pub use crate::integrator::Motion;
    pub use crate::phase::Phase;
    pub use crate::pipeline::{CancelToken, Pipeline, RunSummary};
    pub use crate::recorder::{FrameSink, RecordStats};
    pub use crate::render::{Frame, RenderConfig};
    pub use crate::Vec2;
}
