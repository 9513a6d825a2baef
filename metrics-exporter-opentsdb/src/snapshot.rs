//! Read-only metric state handed to the reporter on every report cycle.
use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::value::MetricValue;

/// A tag attached to a metric, sent as `key=value` after the value.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    key: String,
    value: String,
}

impl Tag {
    /// Creates a new `Tag`.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }

    /// Returns the tag key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the tag value.
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Identifies a metric: a name plus any tags.
///
/// Ids order by name first, so maps keyed by `MetricId` iterate in lexicographic name order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetricId {
    name: String,
    tags: Vec<Tag>,
}

impl MetricId {
    /// Creates a new `MetricId` with the given name and tags.
    pub fn new(name: impl Into<String>, tags: Vec<Tag>) -> Self {
        Self { name: name.into(), tags }
    }

    /// Returns the metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the metric tags.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }
}

impl From<&str> for MetricId {
    fn from(name: &str) -> Self {
        Self::new(name, Vec::new())
    }
}

impl From<String> for MetricId {
    fn from(name: String) -> Self {
        Self::new(name, Vec::new())
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for tag in &self.tags {
            write!(f, " {}={}", tag.key, tag.value)?;
        }
        Ok(())
    }
}

/// Metric kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricKind {
    /// A point-in-time value.
    Gauge,
    /// An adjustable integer count.
    Counter,
    /// A distribution of observed values.
    Histogram,
    /// An event-rate tracker.
    Meter,
    /// A distribution of durations plus the rate of invocations.
    Timer,
}

/// Statistical summary of a distribution.
///
/// Built by whatever registry holds the distribution. [`Snapshot::from_integers`] and [`Snapshot::from_floats`] compute
/// one from raw samples.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    /// Smallest value.
    pub min: MetricValue,
    /// Largest value.
    pub max: MetricValue,
    /// Arithmetic mean.
    pub mean: f64,
    /// Sample standard deviation.
    pub std_dev: f64,
    /// 50th percentile.
    pub median: f64,
    /// 75th percentile.
    pub p75: f64,
    /// 95th percentile.
    pub p95: f64,
    /// 98th percentile.
    pub p98: f64,
    /// 99th percentile.
    pub p99: f64,
    /// 99.9th percentile.
    pub p999: f64,
}

impl Snapshot {
    /// Computes a snapshot of integer samples, such as durations in nanoseconds.
    pub fn from_integers(mut values: Vec<i64>) -> Self {
        values.sort_unstable();
        let floats = values.iter().map(|v| *v as f64).collect::<Vec<_>>();
        Self::from_sorted(
            &floats,
            MetricValue::Integer(values.first().copied().unwrap_or(0)),
            MetricValue::Integer(values.last().copied().unwrap_or(0)),
        )
    }

    /// Computes a snapshot of floating-point samples.
    pub fn from_floats(mut values: Vec<f64>) -> Self {
        values.sort_unstable_by(f64::total_cmp);
        let min = values.first().copied().unwrap_or(0.0);
        let max = values.last().copied().unwrap_or(0.0);
        Self::from_sorted(&values, MetricValue::FloatingPoint(min), MetricValue::FloatingPoint(max))
    }

    fn from_sorted(values: &[f64], min: MetricValue, max: MetricValue) -> Self {
        let mean = mean(values);
        Self {
            min,
            max,
            mean,
            std_dev: std_dev(values, mean),
            median: quantile(values, 0.5),
            p75: quantile(values, 0.75),
            p95: quantile(values, 0.95),
            p98: quantile(values, 0.98),
            p99: quantile(values, 0.99),
            p999: quantile(values, 0.999),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    let sum_of_squares = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    (sum_of_squares / (values.len() - 1) as f64).sqrt()
}

// `values` must be sorted.
fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let pos = q * (values.len() + 1) as f64;
    let index = pos as usize;
    if index < 1 {
        return values[0];
    }
    if index >= values.len() {
        return values[values.len() - 1];
    }

    let lower = values[index - 1];
    let upper = values[index];
    lower + (pos - pos.floor()) * (upper - lower)
}

/// A histogram reading: total count plus the distribution snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct HistogramSnapshot {
    /// Number of values recorded.
    pub count: i64,
    /// Distribution of the recorded values.
    pub snapshot: Snapshot,
}

/// A meter reading.
///
/// All rates are in events per second.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeterSnapshot {
    /// Number of events.
    pub count: i64,
    /// One-minute exponentially weighted rate.
    pub one_minute_rate: f64,
    /// Five-minute exponentially weighted rate.
    pub five_minute_rate: f64,
    /// Fifteen-minute exponentially weighted rate.
    pub fifteen_minute_rate: f64,
    /// Mean rate since the meter was created.
    pub mean_rate: f64,
}

/// A timer reading.
#[derive(Clone, Debug, PartialEq)]
pub struct TimerSnapshot {
    /// Distribution of durations, in nanoseconds.
    pub durations: Snapshot,
    /// Rate of timed events.
    pub rates: MeterSnapshot,
}

/// The state of every metric, grouped by kind and sorted by id.
#[derive(Clone, Debug, Default)]
pub struct MetricSet {
    /// Gauge values. `None` marks a value the registry could not represent, which is skipped.
    pub gauges: BTreeMap<MetricId, Option<MetricValue>>,
    /// Counter values.
    pub counters: BTreeMap<MetricId, i64>,
    /// Histogram readings.
    pub histograms: BTreeMap<MetricId, HistogramSnapshot>,
    /// Meter readings.
    pub meters: BTreeMap<MetricId, MeterSnapshot>,
    /// Timer readings.
    pub timers: BTreeMap<MetricId, TimerSnapshot>,
}

impl MetricSet {
    /// Returns `true` if the set holds no metrics.
    pub fn is_empty(&self) -> bool {
        self.gauges.is_empty()
            && self.counters.is_empty()
            && self.histograms.is_empty()
            && self.meters.is_empty()
            && self.timers.is_empty()
    }

    /// Removes every metric the filter rejects.
    pub fn retain(&mut self, filter: &dyn MetricFilter) {
        self.gauges.retain(|id, _| filter.matches(id, MetricKind::Gauge));
        self.counters.retain(|id, _| filter.matches(id, MetricKind::Counter));
        self.histograms.retain(|id, _| filter.matches(id, MetricKind::Histogram));
        self.meters.retain(|id, _| filter.matches(id, MetricKind::Meter));
        self.timers.retain(|id, _| filter.matches(id, MetricKind::Timer));
    }
}

/// Decides which metrics get reported.
pub trait MetricFilter: Send + Sync {
    /// Returns `true` if the metric should be reported.
    fn matches(&self, id: &MetricId, kind: MetricKind) -> bool;
}

impl<F> MetricFilter for F
where
    F: Fn(&MetricId, MetricKind) -> bool + Send + Sync,
{
    fn matches(&self, id: &MetricId, kind: MetricKind) -> bool {
        self(id, kind)
    }
}

/// A filter that accepts every metric.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllMetrics;

impl MetricFilter for AllMetrics {
    fn matches(&self, _: &MetricId, _: MetricKind) -> bool {
        true
    }
}

/// Something that can produce the current state of its metrics.
pub trait MetricSource {
    /// Returns the current state of every metric.
    fn metrics(&self) -> MetricSet;
}

impl MetricSource for MetricSet {
    fn metrics(&self) -> MetricSet {
        self.clone()
    }
}

impl<T: MetricSource + ?Sized> MetricSource for Arc<T> {
    fn metrics(&self) -> MetricSet {
        (**self).metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::{MetricId, MetricKind, MetricSet, MetricValue, Snapshot, Tag};

    #[test]
    fn ids_sort_by_name_then_tags() {
        let mut ids = vec![
            MetricId::new("b", vec![]),
            MetricId::new("a", vec![Tag::new("host", "2")]),
            MetricId::new("a", vec![Tag::new("host", "1")]),
            MetricId::from("a"),
        ];
        ids.sort();

        let rendered = ids.iter().map(ToString::to_string).collect::<Vec<_>>();
        assert_eq!(rendered, vec!["a", "a host=1", "a host=2", "b"]);
    }

    #[test]
    fn empty_snapshot_is_all_zeroes() {
        let snapshot = Snapshot::from_integers(Vec::new());
        assert_eq!(snapshot.min, MetricValue::Integer(0));
        assert_eq!(snapshot.max, MetricValue::Integer(0));
        assert_eq!(snapshot.mean, 0.0);
        assert_eq!(snapshot.std_dev, 0.0);
        assert_eq!(snapshot.median, 0.0);
        assert_eq!(snapshot.p999, 0.0);
    }

    #[test]
    fn single_value_snapshot() {
        let snapshot = Snapshot::from_floats(vec![2.5]);
        assert_eq!(snapshot.min, MetricValue::FloatingPoint(2.5));
        assert_eq!(snapshot.max, MetricValue::FloatingPoint(2.5));
        assert_eq!(snapshot.mean, 2.5);
        assert_eq!(snapshot.std_dev, 0.0);
        assert_eq!(snapshot.median, 2.5);
        assert_eq!(snapshot.p99, 2.5);
    }

    #[test]
    fn snapshot_of_integers() {
        let snapshot = Snapshot::from_integers(vec![5, 1, 4, 2, 3]);
        assert_eq!(snapshot.min, MetricValue::Integer(1));
        assert_eq!(snapshot.max, MetricValue::Integer(5));
        assert_eq!(snapshot.mean, 3.0);
        assert!((snapshot.std_dev - 1.581_138_830_084_189_8).abs() < 1e-12);

        // Position q * (n + 1) with linear interpolation between neighbours.
        assert_eq!(snapshot.median, 3.0);
        assert_eq!(snapshot.p75, 4.5);
        assert_eq!(snapshot.p95, 5.0);
        assert_eq!(snapshot.p999, 5.0);
    }

    #[test]
    fn low_quantiles_clamp_to_the_smallest_value() {
        let snapshot = Snapshot::from_floats(vec![10.0, 20.0, 30.0, 40.0]);
        // 0.5 * 5 = 2.5, between the 2nd and 3rd samples.
        assert_eq!(snapshot.median, 25.0);
        assert_eq!(super::quantile(&[10.0, 20.0, 30.0, 40.0], 0.1), 10.0);
    }

    #[test]
    fn retain_applies_filter_per_kind() {
        let mut set = MetricSet::default();
        set.gauges.insert("keep".into(), Some(MetricValue::Integer(1)));
        set.gauges.insert("drop".into(), Some(MetricValue::Integer(1)));
        set.counters.insert("keep".into(), 1);

        set.retain(&|id: &MetricId, kind: MetricKind| id.name() == "keep" && kind == MetricKind::Gauge);

        assert_eq!(set.gauges.len(), 1);
        assert!(set.gauges.contains_key(&MetricId::from("keep")));
        assert!(set.counters.is_empty());
        assert!(!set.is_empty());
    }
}
