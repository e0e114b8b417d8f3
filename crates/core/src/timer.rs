//! Frame timer used to report presentation throughput.

use std::time::{Duration, Instant};

/// Tracks wall-clock time between presented frames.
///
/// `tick()` is called once per presented frame; the timer accumulates frame
/// counts over a reporting interval so callers can log a frame rate without
/// doing the bookkeeping themselves.
#[derive(Debug)]
pub struct Timer {
    last_tick: Instant,
    interval_start: Instant,
    interval_frames: u32,
    total_frames: u64,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    fn starting_at(now: Instant) -> Self {
        Self {
            last_tick: now,
            interval_start: now,
            interval_frames: 0,
            total_frames: 0,
        }
    }

    /// Total number of ticks recorded.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Record one frame and return the time since the previous one.
    pub fn tick(&mut self) -> Duration {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> Duration {
        let delta = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.interval_frames += 1;
        self.total_frames += 1;
        delta
    }

    /// Returns the average frames per second over the current interval once
    /// `interval` has elapsed, and starts a new interval.
    pub fn fps_every(&mut self, interval: Duration) -> Option<f32> {
        self.fps_every_at(Instant::now(), interval)
    }

    fn fps_every_at(&mut self, now: Instant, interval: Duration) -> Option<f32> {
        let window = now.saturating_duration_since(self.interval_start);
        if window < interval || window.is_zero() {
            return None;
        }
        let fps = self.interval_frames as f32 / window.as_secs_f32();
        self.interval_start = now;
        self.interval_frames = 0;
        Some(fps)
    }}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_counts_frames() {
        let t0 = Instant::now();
        let mut timer = Timer::starting_at(t0);
        let delta = timer.tick_at(t0 + Duration::from_millis(16));
        assert_eq!(delta, Duration::from_millis(16));
        timer.tick_at(t0 + Duration::from_millis(32));
        assert_eq!(timer.total_frames(), 2);
    }

    #[test]
    fn test_fps_reported_after_interval() {
        let t0 = Instant::now();
        let mut timer = Timer::starting_at(t0);
        for i in 1..=60 {
            timer.tick_at(t0 + Duration::from_millis(i * 10));
        }
        assert!(
            timer
                .fps_every_at(t0 + Duration::from_millis(500), Duration::from_secs(1))
                .is_none()
        );

        let fps = timer
            .fps_every_at(t0 + Duration::from_secs(1), Duration::from_secs(1))
            .unwrap();
        assert!((fps - 60.0).abs() < 0.01);

        // Interval restarted.
        assert!(
            timer
                .fps_every_at(t0 + Duration::from_millis(1500), Duration::from_secs(1))
                .is_none()
        );
    }
}
