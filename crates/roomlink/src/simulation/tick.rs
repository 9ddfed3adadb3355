use std::time::{Duration, Instant};

/// Fixed-timestep accumulator driven by scheduler wakes.
///
/// Each wake adds the time since the previous wake, clamped to
/// `max_accumulation`, and runs as many whole steps as fit. Wakes can come as
/// fast as the host likes; the step length never changes.
#[derive(Debug, Clone)]
pub struct TickLoop {
    tick_interval: Option<Duration>,
    max_accumulation: Duration,
    last_time: Instant,
    accumulator: Duration,
    tick_number: u64,
    stopped: bool,
}

impl TickLoop {
    pub fn new(tick_rate: u32, max_accumulation: Duration, now: Instant) -> Self {
        Self::with_interval(Self::interval_for_rate(tick_rate), max_accumulation, now)
    }

    pub fn with_interval(
        tick_interval: Option<Duration>,
        max_accumulation: Duration,
        now: Instant,
    ) -> Self {
        Self {
            tick_interval: tick_interval.filter(|interval| !interval.is_zero()),
            max_accumulation,
            last_time: now,
            accumulator: Duration::ZERO,
            tick_number: 0,
            stopped: false,
        }
    }

    /// A rate of zero disables ticking.
    pub fn interval_for_rate(tick_rate: u32) -> Option<Duration> {
        (tick_rate > 0).then(|| Duration::from_nanos(1_000_000_000 / u64::from(tick_rate)))
    }

    pub fn tick_interval(&self) -> Option<Duration> {
        self.tick_interval
    }

    pub fn max_accumulation(&self) -> Duration {
        self.max_accumulation
    }

    pub fn tick_number(&self) -> u64 {
        self.tick_number
    }

    pub fn is_enabled(&self) -> bool {
        self.tick_interval.is_some()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Whether the host should schedule another wake.
    pub fn is_running(&self) -> bool {
        self.is_enabled() && !self.stopped
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Resumes a stopped loop. Time spent stopped is not simulated.
    pub fn restart(&mut self, now: Instant) {
        self.stopped = false;
        self.last_time = now;
        self.accumulator = Duration::ZERO;
    }

    /// Runs one batch of steps, calling `on_tick` with the tick number of each
    /// step before it is counted. Returns whether the loop wants another wake.
    pub fn wake<F>(&mut self, now: Instant, mut on_tick: F) -> bool
    where
        F: FnMut(u64),
    {
        let Some(interval) = self.tick_interval else {
            return false;
        };
        if self.stopped {
            return false;
        }

        let elapsed = now
            .saturating_duration_since(self.last_time)
            .min(self.max_accumulation);
        self.last_time = now;
        self.accumulator += elapsed;

        while self.accumulator >= interval {
            on_tick(self.tick_number);
            self.accumulator -= interval;
            self.tick_number += 1;
        }

        !self.stopped
    }

    /// Fraction of a step currently accumulated.
    pub fn alpha(&self) -> f32 {
        match self.tick_interval {
            Some(interval) => self.accumulator.as_secs_f32() / interval.as_secs_f32(),
            None => 0.0,
        }
    }
}
