use std::{
    io,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::debug;

use crate::{client::Connector, reporter::Reporter, snapshot::MetricSource};

const THREAD_NAME: &str = "metrics-exporter-opentsdb-reporter";

/// Runs a [`Reporter`] against a [`MetricSource`] at a fixed interval.
pub struct ScheduledReporter<S, C: Connector> {
    reporter: Reporter<C>,
    source: S,
}

impl<S, C> ScheduledReporter<S, C>
where
    S: MetricSource + Send + 'static,
    C: Connector + Send + 'static,
    C::Connection: Send,
{
    /// Creates a new `ScheduledReporter`.
    pub fn new(reporter: Reporter<C>, source: S) -> Self {
        Self { reporter, source }
    }

    /// Starts reporting on a background thread, once per `interval`.
    ///
    /// The first report happens one interval after starting. Reporting stops when the returned handle is stopped or
    /// dropped.
    ///
    /// # Errors
    ///
    /// If the background thread cannot be spawned, an error is returned.
    pub fn start(self, interval: Duration) -> io::Result<ReporterHandle> {
        let (shutdown_tx, shutdown_rx) = bounded(1);
        let thread =
            thread::Builder::new().name(THREAD_NAME.to_string()).spawn(move || self.run(interval, &shutdown_rx))?;

        Ok(ReporterHandle { shutdown: Some(shutdown_tx), thread: Some(thread) })
    }

    fn run(mut self, interval: Duration, shutdown: &Receiver<()>) {
        let mut next_report = Instant::now() + interval;
        loop {
            // Wait until our target report deadline, or until we're told to stop.
            //
            // If the previous cycle took longer than the interval, we won't wait at all.
            let timeout = next_report.saturating_duration_since(Instant::now());
            match shutdown.recv_timeout(timeout) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }

            next_report = Instant::now() + interval;

            let started = Instant::now();
            self.reporter.report(&self.source);
            debug!(elapsed = ?started.elapsed(), "Finished report cycle.");
        }

        debug!("Reporter stopped.");
    }
}

/// Handle to a running [`ScheduledReporter`].
///
/// Dropping the handle stops the reporter without waiting for it.
pub struct ReporterHandle {
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ReporterHandle {
    /// Stops the reporter and waits for the background thread to exit.
    ///
    /// A report cycle that is already running is allowed to finish.
    pub fn stop(mut self) {
        drop(self.shutdown.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                debug!("Reporter thread panicked.");
            }
        }
    }
}

impl Drop for ReporterHandle {
    fn drop(&mut self) {
        // Disconnecting the channel is enough for the thread to notice.
        drop(self.shutdown.take());
    }
}
