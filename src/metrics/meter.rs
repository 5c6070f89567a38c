use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Moving averages advance in fixed 5 second steps.
const TICK_SECS: u64 = 5;

/// Event throughput: total count, 1/5/15-minute EWMA rates and the mean rate
/// since creation. Rates are events per second.
pub struct Meter {
    start: Instant,
    state: Mutex<MeterState>,
}

/// Immutable read of a meter at flush time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterSnapshot {
    pub count: i64,
    pub m1: f64,
    pub m5: f64,
    pub m15: f64,
    pub mean: f64,
}

struct MeterState {
    count: i64,
    uncounted: i64,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
    last_tick: Instant,
}

/// Exponentially weighted moving average over one window.
struct Ewma {
    alpha: f64,
    rate: f64,
    initialized: bool,
}

impl Ewma {
    fn new(window_minutes: f64) -> Self {
        let alpha = 1.0 - (-(TICK_SECS as f64) / 60.0 / window_minutes).exp();
        Self {
            alpha,
            rate: 0.0,
            initialized: false,
        }
    }

    fn tick(&mut self, uncounted: i64) {
        let instant = uncounted as f64 / TICK_SECS as f64;
        if self.initialized {
            self.rate += self.alpha * (instant - self.rate);
        } else {
            self.rate = instant;
            self.initialized = true;
        }
    }

    /// Equivalent to `ticks` calls of `tick(0)`.
    fn idle(&mut self, ticks: u64) {
        if ticks == 0 {
            return;
        }
        if !self.initialized {
            self.tick(0);
            self.idle(ticks - 1);
            return;
        }
        self.rate *= (1.0 - self.alpha).powf(ticks as f64);
    }
}

impl MeterState {
    /// Apply every tick boundary crossed since the last call.
    fn catch_up(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_tick).as_secs();
        let ticks = elapsed / TICK_SECS;
        if ticks == 0 {
            return;
        }
        self.last_tick += Duration::from_secs(ticks * TICK_SECS);

        let uncounted = std::mem::take(&mut self.uncounted);
        for ewma in [&mut self.m1, &mut self.m5, &mut self.m15] {
            ewma.tick(uncounted);
            ewma.idle(ticks - 1);
        }
    }
}

impl Meter {
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    fn started_at(start: Instant) -> Self {
        Self {
            start,
            state: Mutex::new(MeterState {
                count: 0,
                uncounted: 0,
                m1: Ewma::new(1.0),
                m5: Ewma::new(5.0),
                m15: Ewma::new(15.0),
                last_tick: start,
            }),
        }
    }

    /// Record `n` events.
    pub fn mark(&self, n: i64) {
        self.mark_at(n, Instant::now());
    }

    pub fn count(&self) -> i64 {
        self.state.lock().count
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        self.snapshot_at(Instant::now())
    }

    fn mark_at(&self, n: i64, now: Instant) {
        let mut state = self.state.lock();
        state.catch_up(now);
        state.count = state.count.wrapping_add(n);
        state.uncounted = state.uncounted.wrapping_add(n);
    }

    fn snapshot_at(&self, now: Instant) -> MeterSnapshot {
        let mut state = self.state.lock();
        state.catch_up(now);

        let elapsed = now.saturating_duration_since(self.start).as_secs_f64();
        let mean = if elapsed > 0.0 {
            state.count as f64 / elapsed
        } else {
            0.0
        };

        MeterSnapshot {
            count: state.count,
            m1: state.m1.rate,
            m5: state.m5.rate,
            m15: state.m15.rate,
            mean,
        }
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}
