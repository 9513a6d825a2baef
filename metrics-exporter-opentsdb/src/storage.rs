use std::sync::{
    atomic::{
        AtomicU64,
        Ordering::{Acquire, Relaxed, Release},
    },
    Arc,
};

use metrics::{atomics::AtomicU64 as MetricsAtomicU64, CounterFn, HistogramFn, Key};
use metrics_util::{registry::Storage, storage::reservoir::AtomicSamplingReservoir};

use crate::snapshot::{HistogramSnapshot, Snapshot};

/// Default number of samples each histogram keeps between reports.
pub(crate) const DEFAULT_HISTOGRAM_RESERVOIR_SIZE: usize = 1028;

/// A cumulative counter whose absolute updates replace the current value.
pub(crate) struct AtomicCounter {
    current: AtomicU64,
}

impl AtomicCounter {
    /// Creates a new `AtomicCounter`.
    fn new() -> Self {
        Self { current: AtomicU64::new(0) }
    }

    /// Returns the current counter value.
    pub fn value(&self) -> u64 {
        self.current.load(Acquire)
    }
}

impl CounterFn for AtomicCounter {
    fn increment(&self, value: u64) {
        self.current.fetch_add(value, Relaxed);
    }

    fn absolute(&self, value: u64) {
        self.current.store(value, Release);
    }
}

/// A histogram that keeps a running count and a bounded sample of the values recorded since the last report.
pub(crate) struct AtomicHistogram {
    count: AtomicU64,
    samples: AtomicSamplingReservoir,
}

impl AtomicHistogram {
    /// Creates a new `AtomicHistogram` keeping up to `reservoir_size` samples.
    fn new(reservoir_size: usize) -> Self {
        Self { count: AtomicU64::new(0), samples: AtomicSamplingReservoir::new(reservoir_size.max(1)) }
    }

    /// Drains the sampled values recorded since the last drain.
    fn drain(&self) -> Vec<f64> {
        let mut values = Vec::new();
        self.samples.consume(|drain| values.extend(drain));
        values
    }

    /// Drains the pending samples into a snapshot, along with the total number of values ever recorded.
    pub fn flush(&self) -> HistogramSnapshot {
        let values = self.drain();

        HistogramSnapshot {
            count: i64::try_from(self.count.load(Relaxed)).unwrap_or(i64::MAX),
            snapshot: Snapshot::from_floats(values),
        }
    }
}

impl HistogramFn for AtomicHistogram {
    fn record(&self, value: f64) {
        self.samples.push(value);
        self.count.fetch_add(1, Relaxed);
    }
}

/// Storage for the metrics recorded through the `metrics` facade.
///
/// # Behavior
///
/// - Counters are cumulative: increments add up across reports, and absolute updates replace the value.
/// - Gauges keep the last value written.
/// - Histograms count every value ever recorded, but only keep a bounded sample of the values recorded since the last
///   report.
pub(crate) struct OpenTsdbStorage {
    histogram_reservoir_size: usize,
}

impl OpenTsdbStorage {
    /// Creates a new `OpenTsdbStorage` whose histograms keep up to `histogram_reservoir_size` samples.
    pub fn new(histogram_reservoir_size: usize) -> Self {
        Self { histogram_reservoir_size }
    }
}

impl Storage<Key> for OpenTsdbStorage {
    type Counter = Arc<AtomicCounter>;
    type Gauge = Arc<MetricsAtomicU64>;
    type Histogram = Arc<AtomicHistogram>;

    fn counter(&self, _: &Key) -> Self::Counter {
        Arc::new(AtomicCounter::new())
    }

    fn gauge(&self, _: &Key) -> Self::Gauge {
        Arc::new(MetricsAtomicU64::new(0.0f64.to_bits()))
    }

    fn histogram(&self, _: &Key) -> Self::Histogram {
        Arc::new(AtomicHistogram::new(self.histogram_reservoir_size))
    }
}
