use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Monotonic-ish event count. May be decremented or cleared.
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicI64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self, n: i64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    pub fn dec(&self, n: i64) {
        self.count.fetch_sub(n, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.count.store(0, Ordering::Relaxed);
    }

    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Last-written integer value.
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Adjust in place, for level-style gauges such as in-flight requests.
    pub fn add(&self, delta: i64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Last-written float value, stored as raw bits.
#[derive(Debug, Default)]
pub struct GaugeFloat {
    bits: AtomicU64,
}

impl GaugeFloat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn value(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_moves_both_ways() {
        let c = Counter::new();
        c.inc(5);
        c.dec(2);
        assert_eq!(c.count(), 3);
        c.clear();
        assert_eq!(c.count(), 0);
    }

    #[test]
    fn gauges_keep_last_value() {
        let g = Gauge::new();
        g.update(7);
        g.update(-3);
        assert_eq!(g.value(), -3);
        g.add(5);
        g.add(-1);
        assert_eq!(g.value(), 1);

        let f = GaugeFloat::new();
        assert_eq!(f.value(), 0.0);
        f.update(0.25);
        assert_eq!(f.value(), 0.25);
    }
}
