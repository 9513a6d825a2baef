//! A [`metrics`]-compatible reporter for sending metrics to an [OpenTSDB][opentsdb] tcollector over UDP.
//!
//! [opentsdb]: http://opentsdb.net/docs/build/html/user_guide/utilities/tcollector.html
//!
//! # Usage
//!
//! Using the reporter with the `metrics` facade is straightforward:
//!
//! ```no_run
//! # use metrics_exporter_opentsdb::OpenTsdbBuilder;
//! // First, create a builder.
//! //
//! // The builder can configure the remote address, the report interval, and how metric names and values are
//! // reported.
//! let builder = OpenTsdbBuilder::default();
//!
//! // Normally, most users will want to "install" the recorder, which sets it as the global recorder for all `metrics`
//! // calls, and spawns the background thread that reports to the tcollector at a fixed interval.
//! let handle = builder.install().expect("failed to install recorder");
//!
//! // Reporting stops when the handle is stopped or dropped.
//! handle.stop();
//! ```
//!
//! Applications with their own metrics registry can skip the recorder entirely, and drive a [`Reporter`] directly
//! with a [`MetricSet`] (or anything implementing [`MetricSource`]) on whatever schedule they like:
//!
//! ```no_run
//! # use metrics_exporter_opentsdb::{MetricSet, MetricValue, OpenTsdb, Reporter, ReporterConfig};
//! let mut reporter = Reporter::new(OpenTsdb::default(), ReporterConfig::default());
//!
//! let mut metrics = MetricSet::default();
//! metrics.gauges.insert("temp".into(), Some(MetricValue::Integer(36)));
//! metrics.counters.insert("hits".into(), 7);
//!
//! // Sends `temp <now> 36` and `hits.count <now> 7`.
//! reporter.report(&metrics);
//! ```
//!
//! # Protocol
//!
//! Every reading is sent as its own line, and its own datagram:
//!
//! ```text
//! <metric-name> <unix-timestamp-seconds> <value>[ <tagk>=<tagv>...]\n
//! ```
//!
//! Whitespace in names, values, and tags is replaced with `-`. Integer values are written as plain decimals, and
//! floating-point values with exactly two fractional digits, regardless of the host locale.
//!
//! # Metric fields
//!
//! Each metric kind is reported as one or more fields, appended to the metric name:
//!
//! - gauges: the bare name
//! - counters: `count`
//! - histograms: `count`, `max`, `mean`, `min`, `stddev`, `p50`, `p75`, `p95`, `p98`, `p99`, `p999`
//! - meters: `count`, `m1_rate`, `m5_rate`, `m15_rate`, `mean_rate`
//! - timers: the histogram fields except `count`, converted to the duration unit, then the meter fields
//!
//! # Delivery
//!
//! There is no retry, reconnect, or backoff. A cycle that fails is logged and dropped, and the next cycle starts from
//! scratch. There is no write timeout either: a blocked socket write blocks the reporting thread.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod builder;
pub use self::builder::{BuildError, OpenTsdbBuilder};

mod client;
pub use self::client::{
    ClientError, Connector, Datagrams, OpenTsdb, UdpConnector, DEFAULT_ADDRESS, DEFAULT_BUFFER_SIZE,
};

mod recorder;
pub use self::recorder::{OpenTsdbRecorder, RecorderSource};

mod reporter;
pub use self::reporter::{Reporter, ReporterConfig};

mod scheduler;
pub use self::scheduler::{ReporterHandle, ScheduledReporter};

mod snapshot;
pub use self::snapshot::{
    AllMetrics, HistogramSnapshot, MeterSnapshot, MetricFilter, MetricId, MetricKind, MetricSet, MetricSource,
    Snapshot, Tag, TimerSnapshot,
};

mod state;
mod storage;

mod time;
pub use self::time::{Clock, SystemClock, TimeUnit};

mod value;
pub use self::value::{Charset, MetricValue};
