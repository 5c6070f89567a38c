use hdrhistogram::Histogram;

/// Quantiles reported for every histogram and timer.
pub const QUANTILES: [f64; 6] = [0.5, 0.75, 0.95, 0.99, 0.999, 0.9999];

/// The fixed percentile breakdown of one distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Percentiles {
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub p99: f64,
    pub p999: f64,
    pub p9999: f64,
}

impl Percentiles {
    /// Read the fixed quantile set out of an HdrHistogram.
    /// Returns zeroed values if the histogram is empty.
    pub fn from_histogram(hist: &Histogram<u64>) -> Self {
        if hist.len() == 0 {
            return Self::empty();
        }

        let [p50, p75, p95, p99, p999, p9999] =
            QUANTILES.map(|q| hist.value_at_quantile(q) as f64);

        Self {
            p50,
            p75,
            p95,
            p99,
            p999,
            p9999,
        }
    }

    /// All-zero placeholder used before any observations are recorded.
    pub fn empty() -> Self {
        Self {
            p50: 0.0,
            p75: 0.0,
            p95: 0.0,
            p99: 0.0,
            p999: 0.0,
            p9999: 0.0,
        }
    }

    /// `(suffix, value)` pairs in ascending quantile order.
    pub fn labelled(&self) -> [(&'static str, f64); 6] {
        [
            ("p50", self.p50),
            ("p75", self.p75),
            ("p95", self.p95),
            ("p99", self.p99),
            ("p999", self.p999),
            ("p9999", self.p9999),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_histogram_is_all_zero() {
        let hist = Histogram::<u64>::new(3).unwrap();
        assert_eq!(Percentiles::from_histogram(&hist), Percentiles::empty());
    }

    #[test]
    fn quantiles_are_monotonic() {
        let mut hist = Histogram::<u64>::new(3).unwrap();
        for v in 1..=10_000u64 {
            hist.record(v).unwrap();
        }
        let p = Percentiles::from_histogram(&hist);
        let values: Vec<f64> = p.labelled().iter().map(|(_, v)| *v).collect();
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert!((p.p50 - 5_000.0).abs() < 10.0);
        assert!(p.p9999 <= 10_000.0 + 10.0);
    }
}
