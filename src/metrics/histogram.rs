use hdrhistogram::Histogram as HdrHistogram;
use parking_lot::Mutex;

use super::percentiles::Percentiles;

/// HdrHistogram precision. The histogram auto-resizes, so no upper bound.
const HIST_SIGFIG: u8 = 3;

/// Distribution of non-negative integer observations.
pub struct Histogram {
    inner: Mutex<HdrHistogram<u64>>,
}

/// Immutable read of a histogram at flush time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub stddev: f64,
    pub variance: f64,
    pub percentiles: Percentiles,
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(new_hdr()),
        }
    }

    /// Record one observation. Values beyond the trackable range are clamped.
    pub fn update(&self, value: u64) {
        self.inner.lock().saturating_record(value);
    }

    pub fn clear(&self) {
        self.inner.lock().reset();
    }

    pub fn count(&self) -> u64 {
        self.inner.lock().len()
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot::from_hdr(&self.inner.lock())
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn new_hdr() -> HdrHistogram<u64> {
    HdrHistogram::<u64>::new(HIST_SIGFIG).expect("histogram creation")
}

impl HistogramSnapshot {
    pub(crate) fn from_hdr(hist: &HdrHistogram<u64>) -> Self {
        if hist.len() == 0 {
            return Self::empty();
        }

        let stddev = hist.stdev();
        Self {
            count: hist.len(),
            min: hist.min(),
            max: hist.max(),
            mean: hist.mean(),
            stddev,
            variance: stddev * stddev,
            percentiles: Percentiles::from_histogram(hist),
        }
    }

    pub fn empty() -> Self {
        Self {
            count: 0,
            min: 0,
            max: 0,
            mean: 0.0,
            stddev: 0.0,
            variance: 0.0,
            percentiles: Percentiles::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot() {
        let h = Histogram::new();
        assert_eq!(h.snapshot(), HistogramSnapshot::empty());
    }

    #[test]
    fn snapshot_tracks_distribution() {
        let h = Histogram::new();
        for v in [10, 20, 30, 40] {
            h.update(v);
        }
        let s = h.snapshot();
        assert_eq!(s.count, 4);
        assert_eq!(s.min, 10);
        assert_eq!(s.max, 40);
        assert!((s.mean - 25.0).abs() < 0.1);
        assert!((s.variance - s.stddev * s.stddev).abs() < 1e-9);
        assert!(s.stddev > 0.0);

        h.clear();
        assert_eq!(h.count(), 0);
    }
}
