//! Protocol definitions for controller communication.
//!
//! This module contains the low-level protocol types including:
//! - Request opcodes and the port nibble
//! - Response decoding (acks, output state, temperature lines)

pub mod codec;
pub mod command;

pub use codec::{ACK, decode_output_state, is_ack, parse_temperature};
pub use command::{CommandOpcode, Port, Request};
