//! Request opcodes for the controller protocol.
//!
//! Every request is a single byte: the high nibble selects the operation
//! and the low nibble carries the port index.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Mask selecting the opcode nibble of a request byte.
const OPCODE_MASK: u8 = 0xF0;

/// Mask selecting the port nibble of a request byte.
const PORT_MASK: u8 = 0x0F;

/// Request opcodes sent to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandOpcode {
    /// Liveness probe, answered with the ack byte.
    Ping = 0x00,
    /// Read the state of a digital output.
    ReadOutput = 0x10,
    /// Switch a digital output off.
    SetOutputOff = 0x20,
    /// Switch a digital output on.
    SetOutputOn = 0x30,
    /// Read a temperature sensor, answered with an ASCII line.
    ReadTemperature = 0x60,
}

impl CommandOpcode {
    /// Parses the opcode nibble of a request byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte & OPCODE_MASK {
            0x00 => Some(Self::Ping),
            0x10 => Some(Self::ReadOutput),
            0x20 => Some(Self::SetOutputOff),
            0x30 => Some(Self::SetOutputOn),
            0x60 => Some(Self::ReadTemperature),
            _ => None,
        }
    }
}

impl From<CommandOpcode> for u8 {
    fn from(cmd: CommandOpcode) -> Self {
        cmd as Self
    }
}

/// A controller port index, 0-7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Port(u8);

impl Port {
    /// Highest addressable port.
    pub const MAX: u8 = 7;

    /// Creates a port, rejecting indices the protocol cannot address.
    pub const fn new(index: u8) -> Result<Self, ProtocolError> {
        if index <= Self::MAX {
            Ok(Self(index))
        } else {
            Err(ProtocolError::InvalidPort(index))
        }
    }

    /// Returns the port index.
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Port {
    type Error = ProtocolError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::new(index)
    }
}

impl From<Port> for u8 {
    fn from(port: Port) -> Self {
        port.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Liveness probe.
    Ping,
    /// Read an output's state.
    ReadOutput(Port),
    /// Switch an output on (`true`) or off (`false`).
    SetOutput(Port, bool),
    /// Read a temperature sensor.
    ReadTemperature(Port),
}

impl Request {
    /// Returns the opcode of this request.
    #[must_use]
    pub const fn opcode(&self) -> CommandOpcode {
        match self {
            Self::Ping => CommandOpcode::Ping,
            Self::ReadOutput(_) => CommandOpcode::ReadOutput,
            Self::SetOutput(_, true) => CommandOpcode::SetOutputOn,
            Self::SetOutput(_, false) => CommandOpcode::SetOutputOff,
            Self::ReadTemperature(_) => CommandOpcode::ReadTemperature,
        }
    }

    /// Encodes the request as its wire byte.
    #[must_use]
    pub const fn encode(&self) -> u8 {
        let port = match self {
            Self::Ping => 0,
            Self::ReadOutput(port) | Self::SetOutput(port, _) | Self::ReadTemperature(port) => {
                port.0
            }
        };
        self.opcode() as u8 | port
    }

    /// Decodes a wire byte back into a request.
    ///
    /// Returns `None` for unknown opcodes, ports above 7, or a ping with a
    /// non-zero port nibble.
    #[must_use]
    pub fn decode(byte: u8) -> Option<Self> {
        let opcode = CommandOpcode::from_byte(byte)?;
        let port = Port::new(byte & PORT_MASK).ok()?;
        match opcode {
            CommandOpcode::Ping => (port.0 == 0).then_some(Self::Ping),
            CommandOpcode::ReadOutput => Some(Self::ReadOutput(port)),
            CommandOpcode::SetOutputOff => Some(Self::SetOutput(port, false)),
            CommandOpcode::SetOutputOn => Some(Self::SetOutput(port, true)),
            CommandOpcode::ReadTemperature => Some(Self::ReadTemperature(port)),
        }
    }
}
