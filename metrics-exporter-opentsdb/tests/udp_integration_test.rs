use std::{net::UdpSocket, sync::Arc, time::Duration};

use metrics::{Key, Label, Recorder};
use metrics_exporter_opentsdb::{
    Clock, MetricSet, MetricValue, OpenTsdb, OpenTsdbBuilder, OpenTsdbRecorder, Reporter, ReporterConfig,
};

static METADATA: metrics::Metadata =
    metrics::Metadata::new(module_path!(), metrics::Level::INFO, Some(module_path!()));

struct FixedClock(u64);

impl Clock for FixedClock {
    fn time_millis(&self) -> u64 {
        self.0
    }
}

fn collector() -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap_or_else(|e| panic!("failed to bind collector: {e:?}"));
    socket.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    socket
}

fn receive(socket: &UdpSocket, count: usize) -> Vec<String> {
    let mut buf = [0u8; 2048];
    (0..count)
        .map(|_| {
            let len = socket.recv(&mut buf).unwrap_or_else(|e| panic!("no datagram received: {e:?}"));
            String::from_utf8(buf[..len].to_vec()).unwrap()
        })
        .collect()
}

fn config() -> ReporterConfig {
    ReporterConfig { clock: Arc::new(FixedClock(100_000)), ..Default::default() }
}

#[test]
fn test_client_sends_one_datagram_per_line() {
    let collector = collector();
    let mut client = OpenTsdb::udp(collector.local_addr().unwrap());

    client.connect().unwrap();
    client.send("name woo", "value", 100).unwrap();
    client.send("other", "1.00", 101).unwrap();
    client.close().unwrap();

    assert_eq!(receive(&collector, 2), vec!["name-woo 100 value\n", "other 101 1.00\n"]);
    assert_eq!(client.failures(), 0);
}

#[test]
fn test_reporter_cycle_over_udp() {
    let collector = collector();
    let mut reporter = Reporter::new(OpenTsdb::udp(collector.local_addr().unwrap()), config());

    let mut metrics = MetricSet::default();
    metrics.gauges.insert("temp".into(), Some(MetricValue::Integer(36)));
    metrics.counters.insert("hits".into(), 7);
    reporter.report(&metrics);

    assert_eq!(receive(&collector, 2), vec!["temp 100 36\n", "hits.count 100 7\n"]);
    assert!(!reporter.client().is_connected());
}

#[test]
fn test_recorder_metrics_over_udp() {
    let collector = collector();
    let recorder = OpenTsdbRecorder::new();

    let key = Key::from_parts("requests", vec![Label::new("route", "home")]);
    recorder.register_counter(&key, &METADATA).increment(3);
    recorder.register_gauge(&Key::from_name("queue depth"), &METADATA).set(-1.234);

    let config = ReporterConfig { prefix: Some("svc".to_string()), ..config() };
    let mut reporter = Reporter::new(OpenTsdb::udp(collector.local_addr().unwrap()), config);
    reporter.report(&recorder.source());

    assert_eq!(receive(&collector, 2), vec!["svc.queue-depth 100 -1.23\n", "svc.requests.count 100 3 route=home\n"]);
}

#[test]
fn test_builder_reports_on_interval() {
    let collector = collector();
    let (recorder, handle) = OpenTsdbBuilder::default()
        .with_remote_address(collector.local_addr().unwrap().to_string())
        .unwrap()
        .with_report_interval(Duration::from_millis(20))
        .with_reporter_config(config())
        .build()
        .unwrap_or_else(|e| panic!("failed to build recorder: {e:?}"));

    recorder.register_counter(&Key::from_name("ticks"), &METADATA).increment(1);

    let lines = receive(&collector, 1);
    handle.stop();

    assert_eq!(lines, vec!["ticks.count 100 1\n"]);
}
