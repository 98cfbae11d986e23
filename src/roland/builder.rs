//! Outgoing sysex frame builder (DT1 / RQ1)
//!
//! Frame layout:
//! `F0 <manufacturer> <device-id> <model-id...> <cmd> <addr x3> <payload|size x3> <checksum> F7`

use serde::{Deserialize, Serialize};
use std::fmt;

use super::address::{lookup_by_name, Address, AddressEntry, ValueKind};
use super::error::CodecError;
use super::nibble::{checksum, pack_value};

pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;
pub const ROLAND_ID: u8 = 0x41;

/// Width of the RQ1 size field, same as the address
const SIZE_BYTES: usize = 3;

/// Sysex command byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Data Set 1 (write)
    Dt1,
    /// Request Data 1 (read)
    Rq1,
}

impl Command {
    pub fn byte(self) -> u8 {
        match self {
            Command::Dt1 => 0x12,
            Command::Rq1 => 0x11,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x12 => Some(Command::Dt1),
            0x11 => Some(Command::Rq1),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Command::Dt1 => "DT1",
            Command::Rq1 => "RQ1",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope identity of the target device
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceProfile {
    #[serde(default = "default_manufacturer_id")]
    pub manufacturer_id: u8,
    #[serde(default = "default_device_id")]
    pub device_id: u8,
    #[serde(default = "default_model_id")]
    pub model_id: Vec<u8>,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            manufacturer_id: default_manufacturer_id(),
            device_id: default_device_id(),
            model_id: default_model_id(),
        }
    }
}

impl DeviceProfile {
    /// Bytes from F0 up to and including the command byte
    pub fn header_len(&self) -> usize {
        3 + self.model_id.len() + 1
    }

    /// Shortest frame the parser accepts: header, address, checksum, F7
    pub fn min_frame_len(&self) -> usize {
        self.header_len() + 3 + 2
    }
}

fn default_manufacturer_id() -> u8 { ROLAND_ID }
fn default_device_id() -> u8 { 0x10 }
fn default_model_id() -> Vec<u8> { vec![0x28] }

/// A fully framed message, ready for the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub command: Command,
    pub address: Address,
    /// Encoded value bytes (DT1) or size field (RQ1)
    pub payload: Vec<u8>,
    pub checksum: u8,
    frame: Vec<u8>,
}

impl OutgoingMessage {
    pub fn as_bytes(&self) -> &[u8] {
        &self.frame
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.frame
    }
}

/// Composes sysex frames for one device profile
#[derive(Debug, Clone, Default)]
pub struct SysexBuilder {
    profile: DeviceProfile,
}

impl SysexBuilder {
    pub fn new(profile: DeviceProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    /// DT1 write of a numeric value
    ///
    /// Text entries only accept [`SysexBuilder::build_set_text`].
    pub fn build_set(&self, name: &str, value: u32) -> Result<OutgoingMessage, CodecError> {
        let entry = lookup_by_name(name)?;
        let max = entry.max_value().unwrap_or(0);
        if entry.kind == ValueKind::AsciiBlock || value > max {
            return Err(CodecError::ValueOutOfRange {
                name: entry.name.to_string(),
                value,
                max,
            });
        }

        let payload = pack_value(entry.kind, entry.length as usize, value);
        Ok(self.frame(Command::Dt1, entry.address, payload))
    }

    /// DT1 write of a text entry, space padded to the declared length
    pub fn build_set_text(&self, name: &str, text: &str) -> Result<OutgoingMessage, CodecError> {
        let entry = lookup_by_name(name)?;
        let length = entry.length as usize;
        if entry.kind != ValueKind::AsciiBlock || text.len() > length || !text.is_ascii() {
            return Err(CodecError::ValueOutOfRange {
                name: entry.name.to_string(),
                value: text.len() as u32,
                max: if entry.kind == ValueKind::AsciiBlock { length as u32 } else { 0 },
            });
        }

        let mut payload = text.as_bytes().to_vec();
        payload.resize(length, b' ');
        Ok(self.frame(Command::Dt1, entry.address, payload))
    }

    /// RQ1 for the entry's declared length
    pub fn build_request(&self, name: &str) -> Result<OutgoingMessage, CodecError> {
        let entry = lookup_by_name(name)?;
        self.request(entry, entry.length as u32)
    }

    /// RQ1 starting at the entry but covering `length` bytes (block reads)
    pub fn build_request_span(&self, name: &str, length: u32) -> Result<OutgoingMessage, CodecError> {
        let entry = lookup_by_name(name)?;
        self.request(entry, length)
    }

    fn request(&self, entry: &AddressEntry, length: u32) -> Result<OutgoingMessage, CodecError> {
        let max = (1u32 << (7 * SIZE_BYTES)) - 1;
        if length > max {
            return Err(CodecError::ValueOutOfRange {
                name: entry.name.to_string(),
                value: length,
                max,
            });
        }
        let size = pack_value(ValueKind::Byte, SIZE_BYTES, length);
        Ok(self.frame(Command::Rq1, entry.address, size))
    }

    /// Wrap address and payload into the sysex envelope
    pub fn frame(&self, command: Command, address: Address, payload: Vec<u8>) -> OutgoingMessage {
        let sum = checksum(address.bytes(), &payload);

        let mut frame = Vec::with_capacity(self.profile.min_frame_len() + payload.len());
        frame.push(SYSEX_START);
        frame.push(self.profile.manufacturer_id);
        frame.push(self.profile.device_id);
        frame.extend_from_slice(&self.profile.model_id);
        frame.push(command.byte());
        frame.extend_from_slice(address.bytes());
        frame.extend_from_slice(&payload);
        frame.push(sum);
        frame.push(SYSEX_END);

        OutgoingMessage {
            command,
            address,
            payload,
            checksum: sum,
            frame,
        }
    }
}
