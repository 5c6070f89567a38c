use std::time::{Duration, Instant};

use super::histogram::{Histogram, HistogramSnapshot};
use super::meter::{Meter, MeterSnapshot};

/// Duration distribution (nanoseconds) plus the rate at which timings arrive.
#[derive(Default)]
pub struct Timer {
    histogram: Histogram,
    meter: Meter,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerSnapshot {
    pub histogram: HistogramSnapshot,
    pub meter: MeterSnapshot,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.histogram.update(nanos);
        self.meter.mark(1);
    }

    pub fn update_since(&self, start: Instant) {
        self.update(start.elapsed());
    }

    /// Run `f` and record how long it took.
    pub fn time<R>(&self, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let out = f();
        self.update_since(start);
        out
    }

    pub fn count(&self) -> u64 {
        self.histogram.count()
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            histogram: self.histogram.snapshot(),
            meter: self.meter.snapshot(),
        }
    }
}
