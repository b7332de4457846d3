//! Run orchestration.
//!
//! A run uses three threads:
//!
//! - the **scheduler** thread steps the world at the tick rate and publishes
//!   snapshots,
//! - the calling thread runs the **render loop**, headless or in a window,
//!   and pushes frames into the recorder queue,
//! - the **encoder** thread drains that queue into the output file.
//!
//! The scheduler and the renderer only share the [`SnapshotBuffer`]; the
//! renderer and the encoder only share the frame queue.
//!
//! # Example
//!
//! ```ignore
//! use spoutfill::prelude::*;
//!
//! let config = SceneConfig::load("scene.json")?;
//! let summary = Pipeline::from_config(config)?.run_headless()?;
//! println!("{} frames written", summary.recording.map_or(0, |r| r.written));
//! ```

use crate::capture::{CapturedColors, ColorSource, ImageColorSource};
use crate::config::SceneConfig;
use crate::error::{CaptureError, RunError};
use crate::phase::Phase;
use crate::recorder::{FrameProducer, FrameSink, RecordStats, Recorder, StopSignal};
use crate::render::{Frame, Rasterizer};
use crate::scheduler::{Scheduler, SchedulerReport};
use crate::snapshot::{Snapshot, SnapshotBuffer};
use crate::time::{RateMeter, Ticker};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Cooperative cancellation flag shared by every thread of a run.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// What a finished run produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub scheduler: SchedulerReport,
    /// `None` when recording was disabled.
    pub recording: Option<RecordStats>,
    /// Frames rasterized by the render loop.
    pub frames_rendered: u64,
    /// Whether the run was cancelled before finishing.
    pub cancelled: bool,
}

/// Builder for a run.
pub struct Pipeline {
    config: SceneConfig,
    source: Option<Box<dyn ColorSource>>,
    sink: Option<Box<dyn FrameSink>>,
    cancel: CancelToken,
    record: bool,
}

impl Pipeline {
    /// A pipeline with no color source yet. Recording goes to
    /// `config.output` unless a sink is supplied.
    pub fn new(config: SceneConfig) -> Result<Self, RunError> {
        config.validate()?;
        Ok(Self {
            config,
            source: None,
            sink: None,
            cancel: CancelToken::new(),
            record: true,
        })
    }

    /// A pipeline whose colors come from `config.source_image`.
    ///
    /// The image is loaded here so a missing or unreadable file fails the run
    /// before any simulation starts. Replay runs do not need it.
    pub fn from_config(config: SceneConfig) -> Result<Self, RunError> {
        let mut pipeline = Self::new(config)?;
        if pipeline.config.replay_from.is_none() {
            let source = ImageColorSource::open(
                &pipeline.config.source_image,
                pipeline.config.width,
                pipeline.config.height,
                pipeline.config.color_sample_radius,
            )?;
            pipeline.source = Some(Box::new(source));
        }
        Ok(pipeline)
    }

    /// Use `source` for color capture.
    pub fn with_color_source(mut self, source: Box<dyn ColorSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Record into `sink` instead of opening `config.output`.
    pub fn with_sink(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.sink = Some(sink);
        self.record = true;
        self
    }

    /// Share an existing cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run without writing a video.
    pub fn without_recording(mut self) -> Self {
        self.record = false;
        self.sink = None;
        self
    }

    /// Token that cancels this run.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    #[inline]
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Run with the render loop paced at `render_fps` and no window.
    pub fn run_headless(self) -> Result<RunSummary, RunError> {
        let mut running = self.start()?;
        let mut ticker = Ticker::new(running.render.frame_interval());

        while !running.should_stop() {
            let now = ticker.tick();
            running.render.refresh();
            if running.render.wants_frame() {
                let frame = running.render.render(now);
                running.render.submit(frame);
            }
        }
        running.finish()
    }

    /// Run with a preview window. Closing the window cancels the run.
    #[cfg(feature = "viewer")]
    pub fn run_windowed(self) -> Result<RunSummary, RunError> {
        let mut running = self.start()?;
        let viewed = crate::window::run(&mut running);
        if viewed.is_err() {
            running.cancel.cancel();
        }
        let summary = running.finish();
        viewed?;
        summary
    }

    fn build_scheduler(&mut self) -> Result<Scheduler, RunError> {
        match &self.config.replay_from {
            Some(path) => {
                let table = CapturedColors::load(path)?;
                Ok(Scheduler::from_capture(self.config.clone(), table))
            }
            None => {
                let source = self.source.take().ok_or(CaptureError::MissingSource)?;
                Ok(Scheduler::new(self.config.clone(), Some(source)))
            }
        }
    }

    fn start(mut self) -> Result<Running, RunError> {
        let scheduler = self.build_scheduler()?;
        let config = &self.config;
        let stop = StopSignal::new();

        let recorder = if self.record {
            let recorder = match self.sink.take() {
                Some(sink) => Recorder::spawn(sink, config.frame_queue_capacity, stop.clone())?,
                None => Recorder::to_file(
                    &config.output,
                    config.width,
                    config.height,
                    config.render_fps,
                    config.frame_queue_capacity,
                    stop.clone(),
                )?,
            };
            Some(recorder)
        } else {
            None
        };

        let buffer = Arc::new(SnapshotBuffer::new());
        let spouts = scheduler.world().spouts().iter().map(|s| s.position).collect();
        let render = RenderLoop {
            buffer: Arc::clone(&buffer),
            rasterizer: Rasterizer::new(config.width, config.height, spouts, config.render.clone()),
            snapshot: Snapshot::default(),
            tick: config.tick_interval(),
            fps: config.render_fps,
            producer: recorder.as_ref().map(Recorder::producer),
            stop: stop.clone(),
            record_fill_phase: config.record_fill_phase,
            meter: RateMeter::new(Duration::from_secs(5)),
        };

        let thread_cancel = self.cancel.clone();
        let thread_stop = stop.clone();
        let spawned = thread::Builder::new()
            .name("scheduler".into())
            .spawn(move || scheduler.run(&buffer, &thread_cancel, &thread_stop));

        let scheduler = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                if let Some(recorder) = recorder {
                    recorder.finish().ok();
                }
                return Err(RunError::Thread(e));
            }
        };

        Ok(Running {
            render,
            scheduler,
            recorder,
            cancel: self.cancel,
            stop,
        })
    }
}

/// A started run, owned by the render thread.
pub(crate) struct Running {
    pub(crate) render: RenderLoop,
    scheduler: JoinHandle<Result<SchedulerReport, CaptureError>>,
    recorder: Option<Recorder>,
    pub(crate) cancel: CancelToken,
    stop: StopSignal,
}

impl Running {
    /// Whether the render loop should exit.
    pub(crate) fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || self.stop.is_signalled() || self.scheduler.is_finished()
    }

    /// Join the scheduler, drain the recorder and collect the results.
    fn finish(self) -> Result<RunSummary, RunError> {
        let frames_rendered = self.render.rasterizer.frames();
        drop(self.render);

        let scheduled = self.scheduler.join();
        // Whatever happened to the scheduler, the queued frames still get written.
        self.stop.signal();
        let recorded = self.recorder.map(Recorder::finish).transpose();

        let report = scheduled.map_err(|_| RunError::SchedulerPanicked)??;
        let recording = recorded?;
        let cancelled = self.cancel.is_cancelled() && report.phase != Phase::Done;
        log::info!(
            "Run {} in {} after {} ticks, {} frames rendered",
            if cancelled { "cancelled" } else { "finished" },
            report.phase,
            report.ticks,
            frames_rendered
        );

        Ok(RunSummary {
            scheduler: report,
            recording,
            frames_rendered,
            cancelled,
        })
    }
}

/// Render side of a run: reads snapshots, rasterizes and queues frames.
pub struct RenderLoop {
    buffer: Arc<SnapshotBuffer>,
    rasterizer: Rasterizer,
    snapshot: Snapshot,
    tick: Duration,
    fps: u32,
    producer: Option<FrameProducer>,
    stop: StopSignal,
    record_fill_phase: bool,
    meter: RateMeter,
}

impl RenderLoop {
    /// Copy the latest snapshot pair out of the shared buffer.
    pub fn refresh(&mut self) {
        self.buffer.read_into(&mut self.snapshot);
    }

    /// Phase of the last refreshed snapshot.
    #[inline]
    pub fn phase(&self) -> Phase {
        self.snapshot.phase
    }

    /// Whether a frame rendered now would be recorded.
    pub fn wants_frame(&self) -> bool {
        self.producer.is_some() && !self.stop.is_signalled() && self.records_phase(self.snapshot.phase)
    }

    fn records_phase(&self, phase: Phase) -> bool {
        self.record_fill_phase || phase.is_colored()
    }

    /// Rasterize the current snapshot, interpolated to `now`.
    pub fn render(&mut self, now: Instant) -> Frame {
        let alpha = self.snapshot.alpha(now, self.tick);
        if let Some(fps) = self.meter.record(now) {
            log::debug!(
                "Rendering at {:.1} fps, {} particles, phase {}",
                fps,
                self.snapshot.count(),
                self.snapshot.phase
            );
        }
        self.rasterizer.render(&self.snapshot, alpha)
    }

    /// Hand a frame to the recorder if this phase is being recorded.
    pub fn submit(&mut self, frame: Frame) {
        if !self.wants_frame() {
            return;
        }
        if let Some(producer) = &self.producer {
            producer.try_push(frame);
        }
    }

    /// Canvas size in pixels.
    #[inline]
    pub fn canvas_size(&self) -> (u32, u32) {
        self.rasterizer.size()
    }

    /// Interval between rendered frames.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_missing_image_fails_before_running() {
        let config = SceneConfig::default()
            .with_canvas(256, 128)
            .with_source_image("does/not/exist.png");
        let result = Pipeline::from_config(config);
        assert!(matches!(
            result,
            Err(RunError::Capture(CaptureError::ImageLoad(_)))
        ));
    }

    #[test]
    fn test_missing_source_fails_at_start() {
        let pipeline = Pipeline::new(SceneConfig::default().with_canvas(256, 128))
            .unwrap()
            .without_recording();
        assert!(matches!(
            pipeline.run_headless(),
            Err(RunError::Capture(CaptureError::MissingSource))
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SceneConfig {
            sub_steps: 0,
            ..Default::default()
        };
        assert!(matches!(Pipeline::new(config), Err(RunError::Config(_))));
    }
}
