//! Serial/USB transport implementation.
//!
//! This module provides serial port communication with the controller
//! board connected via USB.

use std::io;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilder, SerialPortBuilderExt, SerialStream};

use crate::error::LinkError;
use crate::transport::{LinkResult, MAX_LINE_LEN, Transport, timeout_ms};

/// Default baud rate of the controller firmware.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default delay after opening before the first request.
pub const DEFAULT_CONNECTION_DELAY: Duration = Duration::from_millis(300);

/// Configuration for serial transport.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0" or "COM3").
    pub port: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Delay after opening before sending requests.
    pub connection_delay: Duration,
}

impl SerialConfig {
    /// Creates a new serial configuration with default settings.
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            connection_delay: DEFAULT_CONNECTION_DELAY,
        }
    }

    /// Sets the baud rate.
    #[must_use]
    pub const fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Sets the connection delay.
    #[must_use]
    pub const fn connection_delay(mut self, delay: Duration) -> Self {
        self.connection_delay = delay;
        self
    }
}

/// Serial transport to the controller.
///
/// The link is half-duplex: one request byte out, one response in. The
/// stream is held whole rather than split since reads never overlap writes.
pub struct SerialTransport {
    config: SerialConfig,
    stream: Option<SerialStream>,
}

impl SerialTransport {
    /// Creates a new serial transport with the given configuration.
    #[must_use]
    pub const fn new(config: SerialConfig) -> Self {
        Self {
            config,
            stream: None,
        }
    }

    /// Creates a new serial transport for the given port with default settings.
    #[must_use]
    pub fn with_port(port: impl Into<String>) -> Self {
        Self::new(SerialConfig::new(port))
    }

    /// Returns the transport configuration.
    #[must_use]
    pub const fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Port settings used by [`open`](Transport::open).
    ///
    /// DTR is deasserted as part of the open rather than afterwards: the
    /// board resets on a DTR edge. On POSIX the driver may still pulse DTR
    /// while opening, which this cannot prevent.
    fn port_builder(&self) -> SerialPortBuilder {
        tokio_serial::new(&self.config.port, self.config.baud_rate).dtr_on_open(false)
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> BoxFuture<'_, LinkResult<()>> {
        Box::pin(async move {
            if self.stream.is_some() {
                return Ok(());
            }

            tracing::debug!("opening serial port: {}", self.config.port);

            let stream = self.port_builder().open_native_async()?;

            if !self.config.connection_delay.is_zero() {
                tokio::time::sleep(self.config.connection_delay).await;
            }

            self.stream = Some(stream);
            tracing::info!("opened serial port {}", self.config.port);
            Ok(())
        })
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::info!("closed serial port {}", self.config.port);
        }
    }

    fn write(&mut self, data: Bytes) -> BoxFuture<'_, LinkResult<()>> {
        Box::pin(async move {
            let stream = self.stream.as_mut().ok_or(LinkError::NotConnected)?;

            // Drop anything left over from a request that timed out
            if let Err(e) = stream.clear(ClearBuffer::Input) {
                tracing::warn!("failed to clear input buffer: {}", e);
            }

            tracing::trace!("tx {}", hex::encode(&data));

            let result = async {
                stream.write_all(&data).await?;
                stream.flush().await
            }
            .await;

            if let Err(e) = result {
                tracing::warn!("serial write error: {}", e);
                self.close();
                return Err(LinkError::Io(e));
            }
            Ok(())
        })
    }

    fn read(&mut self, len: usize, timeout: Duration) -> BoxFuture<'_, LinkResult<Bytes>> {
        Box::pin(async move {
            let stream = self.stream.as_mut().ok_or(LinkError::NotConnected)?;
            let mut buf = vec![0u8; len];
            let mut got = 0usize;

            let result = tokio::time::timeout(timeout, async {
                while got < len {
                    let n = stream.read(&mut buf[got..]).await?;
                    if n == 0 {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "serial port closed",
                        ));
                    }
                    got += n;
                }
                Ok(())
            })
            .await;

            match result {
                Ok(Ok(())) => {
                    tracing::trace!("rx {}", hex::encode(&buf));
                    Ok(Bytes::from(buf))
                }
                Ok(Err(e)) => {
                    tracing::warn!("serial read error: {}", e);
                    self.close();
                    Err(LinkError::Io(e))
                }
                Err(_) => Err(LinkError::Timeout {
                    timeout_ms: timeout_ms(timeout),
                    expected: len,
                    got,
                }),
            }
        })
    }

    fn read_line(&mut self, timeout: Duration) -> BoxFuture<'_, LinkResult<Bytes>> {
        Box::pin(async move {
            let stream = self.stream.as_mut().ok_or(LinkError::NotConnected)?;
            let mut line = Vec::with_capacity(16);

            // Ok(false) means the line overflowed before a terminator arrived
            let result = tokio::time::timeout(timeout, async {
                let mut byte = [0u8; 1];
                loop {
                    if stream.read(&mut byte).await? == 0 {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "serial port closed",
                        ));
                    }
                    line.push(byte[0]);
                    if byte[0] == b'\n' {
                        return Ok(true);
                    }
                    if line.len() >= MAX_LINE_LEN {
                        return Ok(false);
                    }
                }
            })
            .await;

            match result {
                Ok(Ok(true)) => {
                    tracing::trace!("rx line {}", hex::encode(&line));
                    Ok(Bytes::from(line))
                }
                Ok(Ok(false)) => {
                    self.close();
                    Err(LinkError::LineTooLong { max: MAX_LINE_LEN })
                }
                Ok(Err(e)) => {
                    tracing::warn!("serial read error: {}", e);
                    self.close();
                    Err(LinkError::Io(e))
                }
                Err(_) => Err(LinkError::Timeout {
                    timeout_ms: timeout_ms(timeout),
                    expected: line.len() + 1,
                    got: line.len(),
                }),
            }
        })
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

/// Lists available serial ports.
///
/// # Errors
///
/// Returns an error if the port list cannot be retrieved.
pub fn list_ports() -> LinkResult<Vec<String>> {
    let ports = tokio_serial::available_ports()?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_defaults() {
        let config = SerialConfig::new("/dev/ttyUSB0");
        assert_eq!(config.port, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.connection_delay, DEFAULT_CONNECTION_DELAY);
    }

    #[test]
    fn test_serial_config_builder() {
        let config = SerialConfig::new("/dev/ttyACM0")
            .baud_rate(9600)
            .connection_delay(Duration::ZERO);
        assert_eq!(config.baud_rate, 9600);
        assert!(config.connection_delay.is_zero());
    }

    #[tokio::test]
    async fn test_open_missing_port_fails_and_stays_closed() {
        let mut transport = SerialTransport::with_port("/dev/telegino-does-not-exist");
        assert!(transport.open().await.is_err());
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_io_on_closed_link_is_not_connected() {
        let mut transport = SerialTransport::with_port("/dev/telegino-does-not-exist");
        let err = transport.write(Bytes::from_static(&[0x00])).await.unwrap_err();
        assert!(matches!(err, LinkError::NotConnected));
        let err = transport
            .read(1, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::NotConnected));
    }

    #[test]
    fn test_dtr_deasserted_on_open() {
        let transport = SerialTransport::with_port("/dev/ttyUSB0");
        let builder = format!("{:?}", transport.port_builder());
        assert!(builder.contains("dtr_on_open: Some(false)"), "{builder}");
    }

    /// A transport whose stream is one end of a pseudo-terminal pair; the
    /// other end plays the controller.
    #[cfg(unix)]
    fn pty_link() -> (SerialTransport, SerialStream) {
        let (local, controller) = SerialStream::pair().unwrap();
        let mut transport = SerialTransport::new(
            SerialConfig::new("pty").connection_delay(Duration::ZERO),
        );
        transport.stream = Some(local);
        (transport, controller)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pty_read_timeout_keeps_link_open() {
        let (mut transport, _controller) = pty_link();
        transport.write(Bytes::from_static(&[0x00])).await.unwrap();

        let err = transport
            .read(1, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LinkError::Timeout {
                timeout_ms: 100,
                expected: 1,
                got: 0
            }
        ));
        assert!(transport.is_open());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pty_stale_input_dropped_before_request() {
        let (mut transport, mut controller) = pty_link();

        // late answer to an earlier request
        controller.write_all(&[0x55]).await.unwrap();
        controller.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        transport.write(Bytes::from_static(&[0x00])).await.unwrap();
        let mut request = [0u8; 1];
        controller.read_exact(&mut request).await.unwrap();
        assert_eq!(request, [0x00]);
        controller.write_all(&[0xAA]).await.unwrap();
        controller.flush().await.unwrap();

        let reply = transport.read(1, Duration::from_secs(1)).await.unwrap();
        assert_eq!(&reply[..], &[0xAA]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pty_overlong_line_closes_link() {
        let (mut transport, mut controller) = pty_link();
        controller.write_all(&[b'7'; 80]).await.unwrap();
        controller.flush().await.unwrap();

        let err = transport
            .read_line(Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::LineTooLong { max: MAX_LINE_LEN }));
        assert!(!transport.is_open());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pty_temperature_line() {
        let (mut transport, mut controller) = pty_link();
        controller.write_all(b"21.3\r\n").await.unwrap();
        controller.flush().await.unwrap();

        let line = transport.read_line(Duration::from_secs(1)).await.unwrap();
        assert!(line.ends_with(b"\n"));
        let value = crate::protocol::parse_temperature(&line).unwrap();
        assert!((value - 21.3).abs() < 1e-9);
        assert!(transport.is_open());
    }

    #[test]
    #[ignore = "Requires /sys/class/tty - not available in sandboxed builds"]
    fn test_list_ports() {
        let _ = list_ports();
    }
}
