use std::sync::Arc;

use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};

use crate::{
    snapshot::{MetricSet, MetricSource},
    state::State,
    storage::DEFAULT_HISTOGRAM_RESERVOIR_SIZE,
};

/// A recorder that keeps metrics in memory until they are reported to OpenTSDB.
///
/// Labels become OpenTSDB tags. Descriptions and units are ignored.
pub struct OpenTsdbRecorder {
    state: Arc<State>,
}

impl OpenTsdbRecorder {
    /// Creates a new, empty `OpenTsdbRecorder`.
    ///
    /// Nothing is reported until the recorder's [`source`][OpenTsdbRecorder::source] is handed to a reporter.
    pub fn new() -> Self {
        Self::with_reservoir_size(DEFAULT_HISTOGRAM_RESERVOIR_SIZE)
    }

    /// Creates a new, empty `OpenTsdbRecorder` whose histograms keep up to `histogram_reservoir_size` samples between
    /// reports.
    ///
    /// Histograms recording more values than that in one report interval are sampled uniformly. Their `count` field
    /// still covers every recorded value.
    pub fn with_reservoir_size(histogram_reservoir_size: usize) -> Self {
        OpenTsdbRecorder { state: Arc::new(State::new(histogram_reservoir_size)) }
    }

    /// Returns a handle that yields the current state of every metric recorded so far.
    pub fn source(&self) -> RecorderSource {
        RecorderSource { state: Arc::clone(&self.state) }
    }
}

impl Default for OpenTsdbRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder for OpenTsdbRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        self.state
            .registry()
            .get_or_create_counter(key, |existing| Counter::from_arc(Arc::clone(existing)))
    }

    fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
        self.state
            .registry()
            .get_or_create_gauge(key, |existing| Gauge::from_arc(Arc::clone(existing)))
    }

    fn register_histogram(&self, key: &Key, _: &Metadata<'_>) -> Histogram {
        self.state
            .registry()
            .get_or_create_histogram(key, |existing| Histogram::from_arc(Arc::clone(existing)))
    }
}

/// The metrics recorded by an [`OpenTsdbRecorder`], as a [`MetricSource`].
///
/// Reading from the source drains pending histogram samples, so a recorder should feed a single reporter.
#[derive(Clone)]
pub struct RecorderSource {
    state: Arc<State>,
}

impl MetricSource for RecorderSource {
    fn metrics(&self) -> MetricSet {
        self.state.metrics()
    }
}
