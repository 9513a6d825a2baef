use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_opentsdb::{OpenTsdbBuilder, ReporterConfig, TimeUnit};
use rand::Rng;

fn main() {
    tracing_subscriber::fmt::init();

    let config = ReporterConfig {
        prefix: Some("example".to_string()),
        duration_unit: TimeUnit::Milliseconds,
        ..Default::default()
    };

    let _handle = OpenTsdbBuilder::default()
        .with_remote_address("localhost:8953")
        .expect("failed to parse remote address")
        .with_report_interval(Duration::from_secs(5))
        .with_reporter_config(config)
        .install()
        .expect("failed to install OpenTSDB recorder");

    gauge!("testing").set(42.0);

    let server_loops = counter!("tcp_server_loops", "system" => "foo");
    let server_loops_delta_secs = histogram!("tcp_server_loop_delta_secs", "system" => "foo");

    let mut rng = rand::rng();

    // Loop over and over, pretending to do some work.
    loop {
        server_loops.increment(1);
        server_loops_delta_secs.record(rng.random_range(0.0..1.0));

        let gauge = gauge!("lucky_iterations");
        if rng.random_bool(0.75) {
            gauge.increment(1.0);
        } else {
            gauge.decrement(1.0);
        }

        std::thread::sleep(Duration::from_millis(10));
    }
}
