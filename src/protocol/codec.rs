//! Response decoding for the controller protocol.
//!
//! All functions here are pure. A rejected acknowledgement is a plain
//! `false`, not an error, so callers can keep polling other devices.

use crate::error::ProtocolError;

/// Acknowledgement byte returned by ping and output writes.
pub const ACK: u8 = 0xAA;

/// Returns true if `byte` acknowledges the request.
#[must_use]
pub const fn is_ack(byte: u8) -> bool {
    byte == ACK
}

/// Decodes an output state byte. Any non-zero value means on.
#[must_use]
pub const fn decode_output_state(byte: u8) -> bool {
    byte != 0
}

/// Parses a temperature response line such as `b"21.3\r\n"`.
pub fn parse_temperature(line: &[u8]) -> Result<f64, ProtocolError> {
    let malformed = || ProtocolError::MalformedTemperature {
        line: String::from_utf8_lossy(line).into_owned(),
    };

    let text = std::str::from_utf8(line).map_err(|_| malformed())?.trim();
    if text.is_empty() {
        return Err(ProtocolError::EmptyResponse);
    }

    let value: f64 = text.parse().map_err(|_| malformed())?;
    if !value.is_finite() {
        return Err(malformed());
    }
    Ok(value)
}
