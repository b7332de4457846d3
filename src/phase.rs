//! Simulation phases.
//!
//! A run moves forward through five phases and never goes back:
//!
//! ```text
//! Filling -> Settling1 -> Replaying -> Settling2 -> Done
//! ```
//!
//! A run that replays a saved capture file starts directly in `Replaying`.

use std::fmt;
use std::time::{Duration, Instant};

/// Where a run is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Spouts emit uncolored particles until the canvas is full.
    Filling,
    /// No spawning; the pile settles before colors are captured.
    Settling1,
    /// Spouts re-emit the same particles with their captured colors.
    Replaying,
    /// No new spawn target; the replayed pile settles before the run ends.
    Settling2,
    /// Terminal.
    Done,
}

impl Phase {
    /// Whether the phase uses the settle integration preset.
    #[inline]
    pub fn is_settling(self) -> bool {
        matches!(self, Phase::Settling1 | Phase::Settling2)
    }

    /// Whether the physics is still stepping.
    #[inline]
    pub fn is_running(self) -> bool {
        self != Phase::Done
    }

    /// Whether particles carry their final colors.
    #[inline]
    pub fn is_colored(self) -> bool {
        self >= Phase::Replaying
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Filling => "filling",
            Phase::Settling1 => "settling",
            Phase::Replaying => "replaying",
            Phase::Settling2 => "final settling",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Current phase plus the instant it was entered.
#[derive(Debug, Clone, Copy)]
pub struct PhaseClock {
    phase: Phase,
    entered: Instant,
}

impl PhaseClock {
    pub fn new(phase: Phase, now: Instant) -> Self {
        Self { phase, entered: now }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Time spent in the current phase.
    #[inline]
    pub fn in_phase(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.entered)
    }

    /// Move to a later phase. Requests to move backwards or stay put are ignored.
    pub fn advance(&mut self, to: Phase, now: Instant) -> bool {
        if to <= self.phase {
            log::debug!("Ignoring phase change {} -> {}", self.phase, to);
            return false;
        }
        log::info!(
            "Phase {} -> {} after {:.1}s",
            self.phase,
            to,
            self.in_phase(now).as_secs_f32()
        );
        self.phase = to;
        self.entered = now;
        true
    }
}

/// Logs a fraction every time it crosses another 10 % step.
#[derive(Debug, Clone)]
pub struct Progress {
    label: &'static str,
    logged_decile: u32,
}

impl Progress {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            logged_decile: 0,
        }
    }

    /// Report a fraction in `[0, 1]`. Returns the decile if one was logged.
    pub fn update(&mut self, fraction: f64) -> Option<u32> {
        let decile = (fraction.clamp(0.0, 1.0) * 10.0).floor() as u32;
        if decile > self.logged_decile {
            self.logged_decile = decile;
            log::info!("{}: {}%", self.label, decile * 10);
            Some(decile)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        assert!(Phase::Filling < Phase::Settling1);
        assert!(Phase::Settling1 < Phase::Replaying);
        assert!(Phase::Replaying < Phase::Settling2);
        assert!(Phase::Settling2 < Phase::Done);
        assert!(Phase::Settling2.is_settling());
        assert!(!Phase::Replaying.is_settling());
        assert!(Phase::Replaying.is_colored());
        assert!(!Phase::Done.is_running());
    }

    #[test]
    fn test_clock_never_regresses() {
        let t0 = Instant::now();
        let mut clock = PhaseClock::new(Phase::Filling, t0);
        assert!(clock.advance(Phase::Replaying, t0 + Duration::from_secs(1)));
        assert!(!clock.advance(Phase::Filling, t0 + Duration::from_secs(2)));
        assert!(!clock.advance(Phase::Replaying, t0 + Duration::from_secs(2)));
        assert_eq!(clock.phase(), Phase::Replaying);
        assert_eq!(clock.in_phase(t0 + Duration::from_secs(3)), Duration::from_secs(2));
    }

    #[test]
    fn test_progress_logs_each_decile_once() {
        let mut progress = Progress::new("filling");
        assert_eq!(progress.update(0.05), None);
        assert_eq!(progress.update(0.12), Some(1));
        assert_eq!(progress.update(0.19), None);
        assert_eq!(progress.update(0.55), Some(5));
        assert_eq!(progress.update(2.0), Some(10));
        assert_eq!(progress.update(1.0), None);
    }
}
