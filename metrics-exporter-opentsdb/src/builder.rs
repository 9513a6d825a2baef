use std::{
    net::{SocketAddr, ToSocketAddrs as _},
    time::Duration,
};

use thiserror::Error;

use crate::{
    client::{OpenTsdb, UdpConnector, DEFAULT_ADDRESS, DEFAULT_BUFFER_SIZE},
    recorder::OpenTsdbRecorder,
    reporter::{Reporter, ReporterConfig},
    scheduler::{ReporterHandle, ScheduledReporter},
    storage::DEFAULT_HISTOGRAM_RESERVOIR_SIZE,
    value::Charset,
};

const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Errors that could occur while building or installing an OpenTSDB recorder/reporter.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Failed to parse the remote address.
    #[error("invalid remote address: {reason}")]
    InvalidRemoteAddress {
        /// Details about the parsing failure.
        reason: String,
    },

    /// The buffer size must be at least one byte.
    #[error("buffer size must be at least one byte")]
    InvalidBufferSize,

    /// The histogram reservoir must hold at least one sample.
    #[error("histogram reservoir size must be at least one sample")]
    InvalidHistogramReservoirSize,

    /// Failed to spawn the background reporting thread.
    #[error("failed to spawn background thread for reporter")]
    Backend,

    /// Failed to install the recorder due to an existing global recorder already being installed.
    #[error("failed to install recorder as global recorder")]
    FailedToInstall,
}

/// Builder for an OpenTSDB recorder and its reporter.
pub struct OpenTsdbBuilder {
    remote_addrs: Vec<SocketAddr>,
    charset: Charset,
    buffer_size: usize,
    report_interval: Duration,
    reporter_config: ReporterConfig,
    histogram_reservoir_size: usize,
}

impl OpenTsdbBuilder {
    /// Set the remote address to send metrics to.
    ///
    /// The address needs to be in the format of `<host>:<port>`. Host names are resolved immediately.
    ///
    /// Defaults to `127.0.0.1:8953`, where the `udp_bridge` tcollector listens.
    ///
    /// # Errors
    ///
    /// If the given address is not able to be parsed or resolved, an error will be returned indicating the reason.
    pub fn with_remote_address<A>(mut self, addr: A) -> Result<Self, BuildError>
    where
        A: AsRef<str>,
    {
        let addrs = addr
            .as_ref()
            .to_socket_addrs()
            .map_err(|e| BuildError::InvalidRemoteAddress { reason: e.to_string() })?
            .collect::<Vec<_>>();
        if addrs.is_empty() {
            return Err(BuildError::InvalidRemoteAddress {
                reason: format!("'{}' did not resolve to any address", addr.as_ref()),
            });
        }

        self.remote_addrs = addrs;
        Ok(self)
    }

    /// Set the character encoding of outgoing lines.
    ///
    /// Defaults to [`Charset::Utf8`].
    #[must_use]
    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Set the size of the write buffer in front of the socket.
    ///
    /// Defaults to 1024 bytes.
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Set how often metrics are reported.
    ///
    /// Defaults to 10 seconds.
    #[must_use]
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Set the reporter configuration: clock, name prefix, rate and duration units, and filter.
    ///
    /// Defaults to [`ReporterConfig::default`].
    #[must_use]
    pub fn with_reporter_config(mut self, config: ReporterConfig) -> Self {
        self.reporter_config = config;
        self
    }

    /// Set the number of samples each histogram keeps between reports.
    ///
    /// When a histogram records more values than this in one report interval, the kept values are a uniform random
    /// sample of everything recorded. The reported `count` always covers every recorded value.
    ///
    /// Defaults to 1,028.
    #[must_use]
    pub fn with_histogram_reservoir_size(mut self, reservoir_size: usize) -> Self {
        self.histogram_reservoir_size = reservoir_size;
        self
    }

    /// Builds the reporter without a recorder or a background thread.
    ///
    /// # Errors
    ///
    /// If the configured buffer size is zero, an error is returned.
    pub fn build_reporter(self) -> Result<Reporter<UdpConnector>, BuildError> {
        if self.buffer_size == 0 {
            return Err(BuildError::InvalidBufferSize);
        }

        let client = OpenTsdb::new(UdpConnector::new(self.remote_addrs), self.charset, self.buffer_size);
        Ok(Reporter::new(client, self.reporter_config))
    }

    /// Builds the recorder.
    ///
    /// A background thread is spawned to report the recorder's metrics at the configured interval, but the recorder
    /// must be manually installed by the caller.
    ///
    /// # Errors
    ///
    /// If the configuration is invalid or the background thread cannot be spawned, an error is returned.
    pub fn build(self) -> Result<(OpenTsdbRecorder, ReporterHandle), BuildError> {
        if self.histogram_reservoir_size == 0 {
            return Err(BuildError::InvalidHistogramReservoirSize);
        }

        let interval = self.report_interval;
        let reservoir_size = self.histogram_reservoir_size;
        let reporter = self.build_reporter()?;

        let recorder = OpenTsdbRecorder::with_reservoir_size(reservoir_size);
        let handle = ScheduledReporter::new(reporter, recorder.source())
            .start(interval)
            .map_err(|_| BuildError::Backend)?;

        Ok((recorder, handle))
    }

    /// Builds and installs the recorder.
    ///
    /// The background reporter is spawned, and the recorder is installed as the global recorder.
    ///
    /// # Errors
    ///
    /// If the configuration is invalid, the background thread cannot be spawned, or a global recorder is already
    /// installed, an error is returned.
    pub fn install(self) -> Result<ReporterHandle, BuildError> {
        let (recorder, handle) = self.build()?;

        metrics::set_global_recorder(recorder).map_err(|_| BuildError::FailedToInstall)?;
        Ok(handle)
    }
}

impl Default for OpenTsdbBuilder {
    fn default() -> Self {
        OpenTsdbBuilder {
            remote_addrs: vec![DEFAULT_ADDRESS],
            charset: Charset::Utf8,
            buffer_size: DEFAULT_BUFFER_SIZE,
            report_interval: DEFAULT_REPORT_INTERVAL,
            reporter_config: ReporterConfig::default(),
            histogram_reservoir_size: DEFAULT_HISTOGRAM_RESERVOIR_SIZE,
        }
    }
}
