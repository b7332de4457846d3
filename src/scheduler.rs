//! The simulation scheduler.
//!
//! [`Scheduler`] owns the [`World`] and drives it through the run's phases,
//! one fixed-length tick at a time:
//!
//! 1. **Filling**: every spout emits one particle per tick until the
//!    particles cover `fill_threshold` of the canvas (or capacity runs out).
//! 2. **Settling1**: spawning stops. After `settle_secs` every particle takes
//!    the color of the source image under it and the table is saved. The
//!    painted pile is cleared on the next tick.
//! 3. **Replaying**: the spouts re-emit the same sequence, now colored, until
//!    `replay_fraction` of the captured particles are back.
//! 4. **Settling2**: any remaining replay spawns finish, and after
//!    `final_settle_secs` the run is done.
//!
//! [`tick`](Scheduler::tick) takes the tick's start time as an argument so
//! the whole state machine can be driven with synthetic clocks.
//! [`run`](Scheduler::run) is the real-time loop used by the pipeline.

use crate::capture::{CapturedColors, ColorSource};
use crate::config::SceneConfig;
use crate::error::CaptureError;
use crate::integrator::Motion;
use crate::particles::UNCAPTURED;
use crate::phase::{Phase, PhaseClock, Progress};
use crate::pipeline::CancelToken;
use crate::recorder::StopSignal;
use crate::snapshot::SnapshotBuffer;
use crate::time::{RateMeter, Ticker};
use crate::world::World;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Final state of a scheduler run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerReport {
    /// Phase the scheduler stopped in.
    pub phase: Phase,
    /// Particles at capture time, if capture happened.
    pub original_count: Option<usize>,
    /// Particles on the canvas at the end.
    pub particles: usize,
    /// Ticks executed.
    pub ticks: u64,
    /// Ticks that ran over their interval.
    pub overruns: u64,
}

/// Phase state machine around a [`World`].
pub struct Scheduler {
    world: World,
    config: SceneConfig,
    clock: PhaseClock,
    source: Option<Box<dyn ColorSource>>,
    captured: Option<CapturedColors>,
    /// Next index into the emission sequence of the current phase.
    spawn_index: usize,
    /// Set once, at capture.
    original_count: Option<usize>,
    /// The painted pile is cleared on the first replay tick.
    clear_pending: bool,
    progress: Progress,
    ticks: u64,
    overruns: u64,
}

impl Scheduler {
    /// Start a run in [`Phase::Filling`]. Colors are sampled from `source` at
    /// capture time.
    pub fn new(config: SceneConfig, source: Option<Box<dyn ColorSource>>) -> Self {
        Self {
            world: World::new(&config),
            config,
            clock: PhaseClock::new(Phase::Filling, Instant::now()),
            source,
            captured: None,
            spawn_index: 0,
            original_count: None,
            clear_pending: false,
            progress: Progress::new("Filling"),
            ticks: 0,
            overruns: 0,
        }
    }

    /// Start a run in [`Phase::Replaying`] from an existing capture table.
    pub fn from_capture(config: SceneConfig, captured: CapturedColors) -> Self {
        let mut scheduler = Self::new(config, None);
        scheduler.clock = PhaseClock::new(Phase::Replaying, Instant::now());
        scheduler.original_count = Some(captured.len());
        scheduler.captured = Some(captured);
        scheduler.progress = Progress::new("Replaying");
        scheduler
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.clock.phase()
    }

    #[inline]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The captured color table, once capture has happened.
    #[inline]
    pub fn captured(&self) -> Option<&CapturedColors> {
        self.captured.as_ref()
    }

    /// Particle count at capture time.
    #[inline]
    pub fn original_count(&self) -> Option<usize> {
        self.original_count
    }

    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn report(&self) -> SchedulerReport {
        SchedulerReport {
            phase: self.phase(),
            original_count: self.original_count,
            particles: self.world.len(),
            ticks: self.ticks,
            overruns: self.overruns,
        }
    }

    /// Run one tick starting at `now`: phase bookkeeping and spawning, then
    /// one full physics step. Returns the phase after the tick.
    ///
    /// Fails only if color capture fails.
    pub fn tick(&mut self, now: Instant) -> Result<Phase, CaptureError> {
        if self.ticks == 0 {
            // Phase timers count from the first tick, not from construction.
            self.clock = PhaseClock::new(self.clock.phase(), now);
        }

        match self.clock.phase() {
            Phase::Filling => self.fill(now),
            Phase::Settling1 => {
                if self.clock.in_phase(now) >= settle_duration(self.config.settle_secs) {
                    self.capture(now)?;
                }
            }
            Phase::Replaying => self.replay(now),
            Phase::Settling2 => {
                self.spawn_replay_round();
                if self.clock.in_phase(now) >= settle_duration(self.config.final_settle_secs) {
                    self.clock.advance(Phase::Done, now);
                }
            }
            Phase::Done => return Ok(Phase::Done),
        }

        let phase = self.clock.phase();
        if phase.is_running() {
            self.world.step(self.motion_for(phase));
            self.ticks += 1;
        }
        Ok(phase)
    }

    /// Publish the current particle state for rendering.
    pub fn publish(&self, buffer: &SnapshotBuffer, now: Instant) {
        buffer.publish(self.world.store(), self.world.generation(), self.phase(), now);
    }

    /// Tick in real time until the run is done or `cancel` fires.
    ///
    /// `stop` is signalled on exit, whatever the reason, so the recorder can
    /// drain and finish.
    pub fn run(
        mut self,
        buffer: &SnapshotBuffer,
        cancel: &CancelToken,
        stop: &StopSignal,
    ) -> Result<SchedulerReport, CaptureError> {
        let result = self.run_loop(buffer, cancel);
        stop.signal();
        result.map(|()| self.report())
    }

    fn run_loop(&mut self, buffer: &SnapshotBuffer, cancel: &CancelToken) -> Result<(), CaptureError> {
        let mut ticker = Ticker::new(self.config.tick_interval());
        let mut rate = RateMeter::new(Duration::from_secs(5));
        log::info!(
            "Scheduler started in {} ({} spouts, {} sub-steps, capacity {})",
            self.phase(),
            self.world.spouts().len(),
            self.config.sub_steps,
            self.config.max_particles
        );

        loop {
            let now = ticker.tick();
            self.overruns = ticker.overruns();
            if cancel.is_cancelled() {
                log::info!("Scheduler cancelled in {}", self.phase());
                return Ok(());
            }

            let phase = self.tick_and_publish(buffer, now)?;

            log::trace!("Tick {} took {:?}", self.ticks, now.elapsed());
            if let Some(tps) = rate.record(now) {
                log::debug!(
                    "{:.1} ticks/s, {} particles, phase {}",
                    tps,
                    self.world.len(),
                    phase
                );
            }
            if phase == Phase::Done {
                log::info!("Simulation finished after {} ticks", self.ticks);
                return Ok(());
            }
        }
    }

    /// Tick from `tick_start`, then publish stamped with the time the
    /// physics finished, so a fresh snapshot starts at `alpha == 0`.
    fn tick_and_publish(&mut self, buffer: &SnapshotBuffer, tick_start: Instant) -> Result<Phase, CaptureError> {
        let phase = self.tick(tick_start)?;
        self.publish(buffer, Instant::now());
        Ok(phase)
    }

    fn motion_for(&self, phase: Phase) -> Motion {
        if phase.is_settling() {
            self.config.settle_motion
        } else {
            self.config.motion
        }
    }

    fn fill(&mut self, now: Instant) {
        let threshold = self.config.fill_threshold as f64;
        let spouts = self.world.spouts().len();
        for _ in 0..spouts {
            // Checked per spawn so a round stops as soon as the target is hit.
            if self.world.fullness() >= threshold {
                break;
            }
            let radius = self.config.radius_for(self.spawn_index);
            let spout = self.spawn_index % spouts;
            if self.world.spawn(spout, radius, UNCAPTURED).is_none() {
                break;
            }
            self.spawn_index += 1;
        }

        let fullness = self.world.fullness();
        if threshold > 0.0 {
            self.progress.update(fullness / threshold);
        }
        if fullness >= threshold {
            log::info!(
                "Fill target reached with {} particles ({:.1}% covered)",
                self.world.len(),
                fullness * 100.0
            );
            self.clock.advance(Phase::Settling1, now);
        } else if self.world.is_full() {
            log::info!(
                "Capacity of {} particles reached at {:.1}% coverage",
                self.world.len(),
                fullness * 100.0
            );
            self.clock.advance(Phase::Settling1, now);
        }
    }

    fn capture(&mut self, now: Instant) -> Result<(), CaptureError> {
        let source = self.source.as_deref().ok_or(CaptureError::MissingSource)?;
        let table = CapturedColors::capture(self.world.store(), source);
        self.world.paint(&table);
        log::info!("Captured colors for {} particles", table.len());
        if let Some(path) = &self.config.capture_path {
            table.save(path)?;
        }

        self.original_count = Some(table.len());
        self.captured = Some(table);
        self.clear_pending = true;
        self.spawn_index = 0;
        self.progress = Progress::new("Replaying");
        self.clock.advance(Phase::Replaying, now);
        Ok(())
    }

    fn replay(&mut self, now: Instant) {
        if self.clear_pending {
            self.world.clear();
            self.clear_pending = false;
        }
        self.spawn_replay_round();

        let original = self.original_count.unwrap_or(0);
        let target = self.config.replay_fraction as f64 * original as f64;
        if original > 0 {
            self.progress.update(self.world.len() as f64 / target.max(1.0));
        }
        if self.world.len() as f64 >= target {
            log::info!("Replayed {} of {} particles", self.world.len(), original);
            self.clock.advance(Phase::Settling2, now);
        } else if self.world.is_full() {
            log::warn!(
                "Capacity of {} reached before replaying {} particles",
                self.world.len(),
                original
            );
            self.clock.advance(Phase::Settling2, now);
        }
    }

    /// Emit the next captured particle from every spout.
    fn spawn_replay_round(&mut self) {
        let Some(table) = &self.captured else {
            return;
        };
        let spouts = self.world.spouts().len();
        let max_radius = self.config.max_radius();

        for _ in 0..spouts {
            let Some(record) = table.get(self.spawn_index) else {
                break;
            };
            let radius = record
                .radius
                .unwrap_or(self.config.particle_radius)
                .min(max_radius);
            let spout = self.spawn_index % spouts;
            if self.world.spawn(spout, radius, record.color).is_none() {
                break;
            }
            self.spawn_index += 1;
        }
    }
}

fn settle_duration(secs: f32) -> Duration {
    Duration::from_secs_f32(secs.max(0.0))
}
