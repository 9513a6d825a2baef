use std::{
    io::{self, BufWriter, Write},
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket},
};

use thiserror::Error;
use tracing::trace;

use crate::{
    snapshot::Tag,
    value::{sanitize, Charset},
};

/// Default address the `udp_bridge` tcollector listens on.
pub const DEFAULT_ADDRESS: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8953);

/// Default size, in bytes, of the write buffer in front of the socket.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Errors that could occur while talking to the collector.
#[derive(Debug, Error)]
pub enum ClientError {
    /// `connect` was called on a client that is already connected.
    #[error("already connected")]
    AlreadyConnected,

    /// `send` was called on a client that is not connected.
    #[error("not connected")]
    NotConnected,

    /// Creating the socket or writing to it failed.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

/// Opens connections to the collector.
///
/// Every `write` on the returned connection is expected to be delivered as a single unit, such as one datagram.
pub trait Connector {
    /// The connection type.
    type Connection: Write;

    /// Opens a new connection.
    ///
    /// # Errors
    ///
    /// If the underlying transport cannot be set up, an error is returned.
    fn connect(&self) -> io::Result<Self::Connection>;
}

/// Connects to the collector over UDP.
#[derive(Clone, Debug)]
pub struct UdpConnector {
    remote_addrs: Vec<SocketAddr>,
}

impl UdpConnector {
    /// Creates a connector sending to the given address(es).
    ///
    /// When multiple addresses are given, the socket is connected to the first one that accepts it.
    pub fn new(remote_addrs: Vec<SocketAddr>) -> Self {
        Self { remote_addrs }
    }

    /// Returns the address(es) this connector sends to.
    pub fn remote_addrs(&self) -> &[SocketAddr] {
        &self.remote_addrs
    }
}

impl Default for UdpConnector {
    fn default() -> Self {
        Self::new(vec![DEFAULT_ADDRESS])
    }
}

impl Connector for UdpConnector {
    type Connection = Datagrams;

    fn connect(&self) -> io::Result<Datagrams> {
        let unspecified = match self.remote_addrs.first() {
            Some(SocketAddr::V6(_)) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
            _ => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        };

        let socket = UdpSocket::bind(unspecified)?;
        socket.connect(&self.remote_addrs[..])?;
        Ok(Datagrams(socket))
    }
}

/// A connected UDP socket where each `write` is sent as one datagram.
#[derive(Debug)]
pub struct Datagrams(UdpSocket);

impl Write for Datagrams {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.send(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A client to an OpenTSDB tcollector.
///
/// The client has an explicit lifecycle: [`connect`][OpenTsdb::connect] opens the socket, [`send`][OpenTsdb::send]
/// writes one line per call, and [`close`][OpenTsdb::close] releases the socket so the client can connect again later.
///
/// Each line has the form `<name> <timestamp> <value>\n`, with whitespace in the name and value replaced by hyphens.
pub struct OpenTsdb<C: Connector = UdpConnector> {
    connector: C,
    charset: Charset,
    buffer_size: usize,
    writer: Option<BufWriter<C::Connection>>,
    line_buf: Vec<u8>,
    failures: u64,
}

impl OpenTsdb<UdpConnector> {
    /// Creates a client sending to the given address with the default charset and buffer size.
    pub fn udp(remote_addr: SocketAddr) -> Self {
        Self::new(UdpConnector::new(vec![remote_addr]), Charset::Utf8, DEFAULT_BUFFER_SIZE)
    }
}

impl Default for OpenTsdb<UdpConnector> {
    fn default() -> Self {
        Self::udp(DEFAULT_ADDRESS)
    }
}

impl<C: Connector> OpenTsdb<C> {
    /// Creates a client using the given connector, charset, and buffer size.
    ///
    /// The buffer size is clamped to at least one byte.
    pub fn new(connector: C, charset: Charset, buffer_size: usize) -> Self {
        Self {
            connector,
            charset,
            buffer_size: buffer_size.max(1),
            writer: None,
            line_buf: Vec::new(),
            failures: 0,
        }
    }

    /// Returns the connector used to open connections.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Returns `true` if the client is connected.
    pub fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    /// Opens a connection.
    ///
    /// # Errors
    ///
    /// If the client is already connected, [`ClientError::AlreadyConnected`] is returned and the existing connection is
    /// left untouched. If the connection cannot be opened, [`ClientError::Io`] is returned.
    pub fn connect(&mut self) -> Result<(), ClientError> {
        if self.writer.is_some() {
            return Err(ClientError::AlreadyConnected);
        }

        let connection = self.connector.connect()?;
        self.writer = Some(BufWriter::with_capacity(self.buffer_size, connection));
        Ok(())
    }

    /// Sends the given measurement.
    ///
    /// # Errors
    ///
    /// If the client is not connected, [`ClientError::NotConnected`] is returned. If the write fails, the failure
    /// counter is incremented and [`ClientError::Io`] is returned.
    pub fn send(&mut self, name: &str, value: &str, timestamp: u64) -> Result<(), ClientError> {
        self.send_tagged(name, value, timestamp, &[])
    }

    /// Sends the given measurement with the given tags appended as `key=value` pairs.
    ///
    /// # Errors
    ///
    /// Same as [`send`][OpenTsdb::send].
    pub fn send_tagged(
        &mut self,
        name: &str,
        value: &str,
        timestamp: u64,
        tags: &[Tag],
    ) -> Result<(), ClientError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(ClientError::NotConnected);
        };

        self.line_buf.clear();
        write_line(&mut self.line_buf, self.charset, name, value, timestamp, tags);
        trace!(line = %String::from_utf8_lossy(&self.line_buf).trim_end(), "Sending line.");

        match writer.write_all(&self.line_buf).and_then(|()| writer.flush()) {
            Ok(()) => {
                self.failures = 0;
                Ok(())
            }
            Err(e) => {
                self.failures += 1;
                discard_buffered(&mut self.writer, self.buffer_size);
                Err(ClientError::Io(e))
            }
        }
    }

    /// Returns the number of consecutive failed writes.
    ///
    /// Reset to zero by the next successful write.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Flushes and releases the connection, if any.
    ///
    /// Closing an unconnected client does nothing. The connection is released even if the final flush fails, so the
    /// client can always connect again afterwards.
    ///
    /// # Errors
    ///
    /// If flushing buffered data fails, [`ClientError::Io`] is returned.
    pub fn close(&mut self) -> Result<(), ClientError> {
        match self.writer.take() {
            Some(mut writer) => writer.flush().map_err(ClientError::from),
            None => Ok(()),
        }
    }
}

// A line that failed to go out must not be glued onto the next one.
fn discard_buffered<W: Write>(writer: &mut Option<BufWriter<W>>, buffer_size: usize) {
    if let Some(w) = writer.take() {
        let (inner, _) = w.into_parts();
        *writer = Some(BufWriter::with_capacity(buffer_size, inner));
    }
}

fn write_line(buf: &mut Vec<u8>, charset: Charset, name: &str, value: &str, timestamp: u64, tags: &[Tag]) {
    charset.encode_into(&sanitize(name), buf);
    buf.push(b' ');
    buf.extend_from_slice(itoa::Buffer::new().format(timestamp).as_bytes());
    buf.push(b' ');
    charset.encode_into(&sanitize(value), buf);
    for tag in tags {
        buf.push(b' ');
        charset.encode_into(&sanitize(tag.key()), buf);
        buf.push(b'=');
        charset.encode_into(&sanitize(tag.value()), buf);
    }
    buf.push(b'\n');
}
