use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    client::{ClientError, Connector, OpenTsdb, UdpConnector},
    snapshot::{
        AllMetrics, HistogramSnapshot, MeterSnapshot, MetricFilter, MetricId, MetricSet, MetricSource, Snapshot,
        TimerSnapshot,
    },
    time::{Clock, SystemClock, TimeUnit},
    value::{MetricValue, MetricValueFormatter},
};

/// Reporter configuration.
///
/// Defaults to no prefix, the system clock, rates in events per second, durations in milliseconds, and no filtering.
#[derive(Clone)]
pub struct ReporterConfig {
    /// Clock used to timestamp each report cycle.
    pub clock: Arc<dyn Clock>,

    /// Prefix prepended to every metric name, joined with a `.`.
    pub prefix: Option<String>,

    /// Unit rates are converted to, as events per unit.
    pub rate_unit: TimeUnit,

    /// Unit timer durations are converted to.
    pub duration_unit: TimeUnit,

    /// Filter deciding which metrics are reported.
    pub filter: Arc<dyn MetricFilter>,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            prefix: None,
            rate_unit: TimeUnit::Seconds,
            duration_unit: TimeUnit::Milliseconds,
            filter: Arc::new(AllMetrics),
        }
    }
}

/// Reports the state of a metrics registry to an OpenTSDB tcollector.
///
/// Every call to [`report`][Reporter::report] is one report cycle: the client is connected, every metric is sent with
/// a single shared timestamp, and the client is closed again. Errors never escape a cycle; they are logged, and the
/// next cycle starts from scratch.
pub struct Reporter<C: Connector = UdpConnector> {
    client: OpenTsdb<C>,
    clock: Arc<dyn Clock>,
    prefix: Option<String>,
    rate_unit: TimeUnit,
    rate_factor: f64,
    duration_unit: TimeUnit,
    duration_factor: f64,
    filter: Arc<dyn MetricFilter>,
    formatter: MetricValueFormatter,
    name_buf: String,
}

impl<C: Connector> Reporter<C> {
    /// Creates a new `Reporter` sending through the given client.
    pub fn new(client: OpenTsdb<C>, config: ReporterConfig) -> Self {
        Self {
            client,
            clock: config.clock,
            prefix: config.prefix.filter(|p| !p.is_empty()),
            rate_unit: config.rate_unit,
            rate_factor: config.rate_unit.as_secs_f64(),
            duration_unit: config.duration_unit,
            duration_factor: 1.0 / config.duration_unit.as_nanos() as f64,
            filter: config.filter,
            formatter: MetricValueFormatter::new(),
            name_buf: String::new(),
        }
    }

    /// Returns the client used by this reporter.
    pub fn client(&self) -> &OpenTsdb<C> {
        &self.client
    }

    /// Returns the unit rates are reported in.
    pub fn rate_unit(&self) -> TimeUnit {
        self.rate_unit
    }

    /// Returns the unit durations are reported in.
    pub fn duration_unit(&self) -> TimeUnit {
        self.duration_unit
    }

    /// Runs a report cycle over the filtered metrics of `source`.
    pub fn report<S: MetricSource + ?Sized>(&mut self, source: &S) {
        let mut metrics = source.metrics();
        metrics.retain(self.filter.as_ref());
        self.report_metrics(&metrics);
    }

    /// Runs a report cycle over the given metrics, as-is.
    pub fn report_metrics(&mut self, metrics: &MetricSet) {
        let timestamp = self.clock.time_millis() / 1000;

        if let Err(e) = self.try_report(metrics, timestamp) {
            warn!(error = %e, failures = self.client.failures(), "Unable to report to OpenTSDB.");
        }

        if let Err(e) = self.client.close() {
            debug!(error = %e, "Error disconnecting from OpenTSDB.");
        }
    }

    fn try_report(&mut self, metrics: &MetricSet, timestamp: u64) -> Result<(), ClientError> {
        self.client.connect()?;

        for (id, value) in &metrics.gauges {
            self.report_gauge(id, *value, timestamp)?;
        }

        for (id, count) in &metrics.counters {
            self.send(id, "count", MetricValue::Integer(*count), timestamp)?;
        }

        for (id, histogram) in &metrics.histograms {
            self.report_histogram(id, histogram, timestamp)?;
        }

        for (id, meter) in &metrics.meters {
            self.report_metered(id, meter, timestamp)?;
        }

        for (id, timer) in &metrics.timers {
            self.report_timer(id, timer, timestamp)?;
        }

        debug!(
            gauges = metrics.gauges.len(),
            counters = metrics.counters.len(),
            histograms = metrics.histograms.len(),
            meters = metrics.meters.len(),
            timers = metrics.timers.len(),
            "Reported metrics to OpenTSDB."
        );

        Ok(())
    }

    fn report_gauge(
        &mut self,
        id: &MetricId,
        value: Option<MetricValue>,
        timestamp: u64,
    ) -> Result<(), ClientError> {
        match value {
            Some(value) => self.send(id, "", value, timestamp),
            None => Ok(()),
        }
    }

    fn report_histogram(
        &mut self,
        id: &MetricId,
        histogram: &HistogramSnapshot,
        timestamp: u64,
    ) -> Result<(), ClientError> {
        self.send(id, "count", MetricValue::Integer(histogram.count), timestamp)?;
        self.report_snapshot(id, &histogram.snapshot, timestamp, None)
    }

    fn report_timer(&mut self, id: &MetricId, timer: &TimerSnapshot, timestamp: u64) -> Result<(), ClientError> {
        self.report_snapshot(id, &timer.durations, timestamp, Some(self.duration_factor))?;
        self.report_metered(id, &timer.rates, timestamp)
    }

    fn report_snapshot(
        &mut self,
        id: &MetricId,
        snapshot: &Snapshot,
        timestamp: u64,
        scale: Option<f64>,
    ) -> Result<(), ClientError> {
        let convert = |value: MetricValue| match scale {
            Some(factor) => MetricValue::FloatingPoint(value.as_f64() * factor),
            None => value,
        };
        let fields = [
            ("max", convert(snapshot.max)),
            ("mean", convert(MetricValue::FloatingPoint(snapshot.mean))),
            ("min", convert(snapshot.min)),
            ("stddev", convert(MetricValue::FloatingPoint(snapshot.std_dev))),
            ("p50", convert(MetricValue::FloatingPoint(snapshot.median))),
            ("p75", convert(MetricValue::FloatingPoint(snapshot.p75))),
            ("p95", convert(MetricValue::FloatingPoint(snapshot.p95))),
            ("p98", convert(MetricValue::FloatingPoint(snapshot.p98))),
            ("p99", convert(MetricValue::FloatingPoint(snapshot.p99))),
            ("p999", convert(MetricValue::FloatingPoint(snapshot.p999))),
        ];

        for (field, value) in fields {
            self.send(id, field, value, timestamp)?;
        }
        Ok(())
    }

    fn report_metered(&mut self, id: &MetricId, meter: &MeterSnapshot, timestamp: u64) -> Result<(), ClientError> {
        let rate = |value: f64| MetricValue::FloatingPoint(value * self.rate_factor);
        let fields = [
            ("count", MetricValue::Integer(meter.count)),
            ("m1_rate", rate(meter.one_minute_rate)),
            ("m5_rate", rate(meter.five_minute_rate)),
            ("m15_rate", rate(meter.fifteen_minute_rate)),
            ("mean_rate", rate(meter.mean_rate)),
        ];

        for (field, value) in fields {
            self.send(id, field, value, timestamp)?;
        }
        Ok(())
    }

    fn send(&mut self, id: &MetricId, field: &str, value: MetricValue, timestamp: u64) -> Result<(), ClientError> {
        qualified_name(&mut self.name_buf, self.prefix.as_deref(), id.name(), field);
        let value = self.formatter.format(value);
        self.client.send_tagged(&self.name_buf, value, timestamp, id.tags())
    }
}

/// Joins the non-empty components with `.`.
fn qualified_name(buf: &mut String, prefix: Option<&str>, name: &str, field: &str) {
    buf.clear();
    for component in [prefix.unwrap_or_default(), name, field] {
        if component.is_empty() {
            continue;
        }
        if !buf.is_empty() {
            buf.push('.');
        }
        buf.push_str(component);
    }
}
