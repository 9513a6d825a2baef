use std::sync::atomic::Ordering::Acquire;

use metrics::Key;
use metrics_util::registry::Registry;

use crate::{
    snapshot::{MetricId, MetricSet, MetricSource, Tag},
    storage::OpenTsdbStorage,
    value::MetricValue,
};

/// Recorder state shared between the application and the reporter.
pub(crate) struct State {
    registry: Registry<Key, OpenTsdbStorage>,
}

impl State {
    /// Creates a new, empty `State` whose histograms keep up to `histogram_reservoir_size` samples per report.
    pub fn new(histogram_reservoir_size: usize) -> Self {
        State { registry: Registry::new(OpenTsdbStorage::new(histogram_reservoir_size)) }
    }

    /// Returns a reference to the registry.
    pub fn registry(&self) -> &Registry<Key, OpenTsdbStorage> {
        &self.registry
    }
}

impl MetricSource for State {
    fn metrics(&self) -> MetricSet {
        let mut metrics = MetricSet::default();

        for (key, counter) in self.registry.get_counter_handles() {
            let value = i64::try_from(counter.value()).unwrap_or(i64::MAX);
            metrics.counters.insert(metric_id(&key), value);
        }

        for (key, gauge) in self.registry.get_gauge_handles() {
            let value = f64::from_bits(gauge.load(Acquire));
            metrics.gauges.insert(metric_id(&key), Some(MetricValue::FloatingPoint(value)));
        }

        for (key, histogram) in self.registry.get_histogram_handles() {
            metrics.histograms.insert(metric_id(&key), histogram.flush());
        }

        metrics
    }
}

fn metric_id(key: &Key) -> MetricId {
    let tags = key.labels().map(|label| Tag::new(label.key(), label.value())).collect();
    MetricId::new(key.name(), tags)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use metrics::{Counter, Gauge, Histogram, Key, Label};

    use super::State;
    use crate::{
        snapshot::{MetricId, MetricSource, Tag},
        value::MetricValue,
    };

    #[test]
    fn collects_registered_metrics() {
        let state = State::new(1028);
        let registry = state.registry();

        let counter = registry.get_or_create_counter(&Key::from_name("hits"), |c| Counter::from_arc(Arc::clone(c)));
        counter.increment(4);
        counter.increment(3);

        let key = Key::from_parts("temp", vec![Label::new("room", "kitchen")]);
        let gauge = registry.get_or_create_gauge(&key, |g| Gauge::from_arc(Arc::clone(g)));
        gauge.set(21.5);

        let histogram =
            registry.get_or_create_histogram(&Key::from_name("latency"), |h| Histogram::from_arc(Arc::clone(h)));
        histogram.record(1.0);
        histogram.record(3.0);

        let metrics = state.metrics();
        assert_eq!(metrics.counters.get(&MetricId::from("hits")), Some(&7));

        let gauge_id = MetricId::new("temp", vec![Tag::new("room", "kitchen")]);
        assert_eq!(metrics.gauges.get(&gauge_id), Some(&Some(MetricValue::FloatingPoint(21.5))));

        let latency = &metrics.histograms[&MetricId::from("latency")];
        assert_eq!(latency.count, 2);
        assert_eq!(latency.snapshot.mean, 2.0);

        // Counters stay cumulative, histogram samples are drained.
        counter.increment(1);
        let metrics = state.metrics();
        assert_eq!(metrics.counters.get(&MetricId::from("hits")), Some(&8));
        let latency = &metrics.histograms[&MetricId::from("latency")];
        assert_eq!(latency.count, 2);
        assert_eq!(latency.snapshot.max, MetricValue::FloatingPoint(0.0));
    }

    #[test]
    fn absolute_counter_updates_replace_the_value() {
        let state = State::new(1028);
        let counter =
            state.registry().get_or_create_counter(&Key::from_name("hits"), |c| Counter::from_arc(Arc::clone(c)));

        counter.increment(10);
        assert_eq!(state.metrics().counters.get(&MetricId::from("hits")), Some(&10));

        counter.absolute(5);
        assert_eq!(state.metrics().counters.get(&MetricId::from("hits")), Some(&5));
    }
}
