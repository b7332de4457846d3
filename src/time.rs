//! Fixed-interval pacing and rate measurement.
//!
//! [`Ticker`] paces a loop to a fixed interval. A tick that runs long is
//! never made up for: the next tick simply starts without sleeping, so every
//! tick still advances the simulation by the same fixed step.
//!
//! # Example
//!
//! ```ignore
//! use spoutfill::time::Ticker;
//!
//! let mut ticker = Ticker::new(Duration::from_secs_f32(1.0 / 60.0));
//! loop {
//!     let now = ticker.tick();
//!     // work for this tick
//! }
//! ```

use std::thread;
use std::time::{Duration, Instant};

/// Sleeps away the remainder of each interval.
#[derive(Debug)]
pub struct Ticker {
    interval: Duration,
    /// Start of the previous tick.
    last: Option<Instant>,
    /// Ticks whose work took longer than the interval.
    overruns: u64,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
            overruns: 0,
        }
    }

    /// Wait until the current interval is over and return the start of the
    /// next tick. The first call returns immediately.
    pub fn tick(&mut self) -> Instant {
        if let Some(last) = self.last {
            match remaining(self.interval, last.elapsed()) {
                Some(rest) => thread::sleep(rest),
                None => {
                    self.overruns += 1;
                    if self.overruns == 1 || self.overruns % 600 == 0 {
                        log::warn!(
                            "Tick overran its {:.2} ms budget ({} overruns so far)",
                            self.interval.as_secs_f64() * 1000.0,
                            self.overruns
                        );
                    }
                }
            }
        }
        let now = Instant::now();
        self.last = Some(now);
        now
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of ticks that ran over budget.
    #[inline]
    pub fn overruns(&self) -> u64 {
        self.overruns
    }
}

/// Time left in an interval after `elapsed`, or `None` if it overran.
#[inline]
pub fn remaining(interval: Duration, elapsed: Duration) -> Option<Duration> {
    interval.checked_sub(elapsed).filter(|rest| !rest.is_zero())
}

/// Measures how often an event happens, averaged over a window.
#[derive(Debug)]
pub struct RateMeter {
    window: Duration,
    window_start: Option<Instant>,
    window_count: u64,
    total: u64,
    rate: f32,
}

impl RateMeter {
    /// A meter that refreshes its rate every `window`.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            window_start: None,
            window_count: 0,
            total: 0,
            rate: 0.0,
        }
    }

    /// Count one event at `now`. Returns the new rate whenever a window closes.
    pub fn record(&mut self, now: Instant) -> Option<f32> {
        self.total += 1;
        let start = *self.window_start.get_or_insert(now);
        self.window_count += 1;

        let span = now.saturating_duration_since(start);
        if span >= self.window {
            self.rate = self.window_count as f32 / span.as_secs_f32();
            self.window_start = Some(now);
            self.window_count = 0;
            Some(self.rate)
        } else {
            None
        }
    }

    /// Most recent rate in events per second.
    #[inline]
    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Events recorded since creation.
    #[inline]
    pub fn total(&self) -> u64 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining() {
        let interval = Duration::from_millis(16);
        assert_eq!(remaining(interval, Duration::from_millis(10)), Some(Duration::from_millis(6)));
        assert_eq!(remaining(interval, Duration::from_millis(16)), None);
        assert_eq!(remaining(interval, Duration::from_millis(40)), None);
    }

    #[test]
    fn test_ticker_paces_to_interval() {
        let mut ticker = Ticker::new(Duration::from_millis(10));
        let first = ticker.tick();
        let second = ticker.tick();
        assert!(second.duration_since(first) >= Duration::from_millis(10));
        assert_eq!(ticker.overruns(), 0);
    }

    #[test]
    fn test_ticker_does_not_catch_up() {
        let mut ticker = Ticker::new(Duration::from_millis(5));
        ticker.tick();
        thread::sleep(Duration::from_millis(20));
        let before = Instant::now();
        ticker.tick();
        // An overrun tick returns immediately instead of queueing extra ticks.
        assert!(before.elapsed() < Duration::from_millis(5));
        assert_eq!(ticker.overruns(), 1);
        let late = Instant::now();
        ticker.tick();
        assert!(late.elapsed() >= Duration::from_millis(4));
    }

    #[test]
    fn test_rate_meter() {
        let mut meter = RateMeter::new(Duration::from_secs(1));
        let t0 = Instant::now();
        for i in 0..60 {
            assert_eq!(meter.record(t0 + Duration::from_millis(i * 10)), None);
        }
        let rate = meter.record(t0 + Duration::from_secs(1)).unwrap();
        assert!((rate - 61.0).abs() < 1e-3);
        assert_eq!(meter.total(), 61);
    }
}
