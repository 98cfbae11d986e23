//! Roland sysex codec
//!
//! Address table, 7-bit value packing, DT1/RQ1 frame building and lenient
//! reply parsing for Roland digital pianos.

pub mod address;
pub mod builder;
pub mod commands;
pub mod error;
pub mod nibble;
pub mod parser;
pub mod tones;

pub use address::{lookup_by_address, lookup_by_name, Address, AddressEntry, ValueKind};
pub use builder::{Command, DeviceProfile, OutgoingMessage, SysexBuilder};
pub use commands::{KeyboardMode, PianoCommands, ToneSlot};
pub use error::CodecError;
pub use parser::{FieldReply, ParsedReply, ReplyValue, SysexParser};
pub use tones::{Tone, ToneCode};
