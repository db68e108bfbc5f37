//! Request/response exchanges with the controller.
//!
//! [`Commands`] borrows an open link for the duration of one critical
//! section and turns each protocol request into a write followed by a
//! bounded read.

use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;
use crate::protocol::{Port, Request, decode_output_state, is_ack, parse_temperature};
use crate::transport::{DEFAULT_RESPONSE_TIMEOUT, Transport};

/// Command handler over a borrowed link.
pub struct Commands<'a, T> {
    link: &'a mut T,
    timeout: Duration,
}

impl<'a, T: Transport> Commands<'a, T> {
    /// Creates a command handler with the default response timeout.
    pub fn new(link: &'a mut T) -> Self {
        Self {
            link,
            timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    /// Sets the response timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sends a request and reads a single-byte response.
    async fn exchange_byte(&mut self, request: Request) -> Result<u8> {
        self.link.write(Bytes::copy_from_slice(&[request.encode()])).await?;
        let reply = self.link.read(1, self.timeout).await?;
        Ok(reply[0])
    }

    /// Probes the controller. `Ok(false)` means it answered something other
    /// than an ack.
    pub async fn ping(&mut self) -> Result<bool> {
        let reply = self.exchange_byte(Request::Ping).await?;
        Ok(is_ack(reply))
    }

    /// Reads the hardware state of an output.
    pub async fn read_output(&mut self, port: Port) -> Result<bool> {
        let reply = self.exchange_byte(Request::ReadOutput(port)).await?;
        Ok(decode_output_state(reply))
    }

    /// Switches an output. Returns whether the controller acknowledged.
    pub async fn set_output(&mut self, port: Port, on: bool) -> Result<bool> {
        let reply = self.exchange_byte(Request::SetOutput(port, on)).await?;
        Ok(is_ack(reply))
    }

    /// Reads a raw temperature from a sensor.
    pub async fn read_temperature(&mut self, port: Port) -> Result<f64> {
        self.link
            .write(Bytes::copy_from_slice(&[Request::ReadTemperature(port).encode()]))
            .await?;
        let line = self.link.read_line(self.timeout).await?;
        Ok(parse_temperature(&line)?)
    }
}
