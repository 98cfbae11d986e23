//! Inbound sysex frame parser
//!
//! Parsing is lenient: only framing problems are returned as `Err`. Unknown
//! addresses, short payloads and checksum mismatches are reported inline in
//! [`ParsedReply::err`] next to a best-effort decoded value.

use std::fmt;

use super::address::{entries_within, lookup_by_address, Address, AddressEntry, ValueKind};
use super::builder::{Command, DeviceProfile, SYSEX_END, SYSEX_START};
use super::error::CodecError;
use super::nibble::{checksum, unpack_value, verify_checksum};

/// Decoded payload value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyValue {
    Number(u32),
    Text(String),
    /// Payload bytes that could not be attributed to an entry
    Raw(Vec<u8>),
}

impl ReplyValue {
    pub fn as_number(&self) -> Option<u32> {
        match self {
            ReplyValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for ReplyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyValue::Number(n) => write!(f, "{}", n),
            ReplyValue::Text(s) => write!(f, "\"{}\"", s.trim_end()),
            ReplyValue::Raw(bytes) => write!(f, "{}", hex::encode(bytes)),
        }
    }
}

/// One table entry decoded out of a block reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldReply {
    pub name: &'static str,
    pub value: ReplyValue,
    pub hexval: String,
}

/// Result of parsing one inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    /// Matched entry name, `None` when the address is unmapped
    pub addr: Option<&'static str>,
    pub address: Address,
    /// Position of `address` inside the matched entry
    pub offset: u32,
    pub mode: Command,
    pub value: ReplyValue,
    /// Lower-case hex of the payload
    pub hexval: String,
    /// Every entry fully covered by a block payload, in address order
    pub fields: Vec<FieldReply>,
    pub err: Option<CodecError>,
}

/// Parses frames addressed from one device profile
#[derive(Debug, Clone, Default)]
pub struct SysexParser {
    profile: DeviceProfile,
}

impl SysexParser {
    pub fn new(profile: DeviceProfile) -> Self {
        Self { profile }
    }

    pub fn parse(&self, bytes: &[u8]) -> Result<ParsedReply, CodecError> {
        let (command, address, payload, received) = self.split_frame(bytes)?;

        let mut reply = match command {
            Command::Rq1 => Self::decode_request(address, payload),
            Command::Dt1 => Self::decode_data(address, payload),
        };

        // Checksum mismatch overrides any other inline error
        if !verify_checksum(address.bytes(), payload, received) {
            reply.err = Some(CodecError::ChecksumMismatch {
                expected: checksum(address.bytes(), payload),
                actual: received,
            });
        }

        Ok(reply)
    }

    /// Validate the envelope and slice out command, address, payload, checksum
    fn split_frame<'a>(&self, bytes: &'a [u8]) -> Result<(Command, Address, &'a [u8], u8), CodecError> {
        if bytes.first() != Some(&SYSEX_START) {
            return Err(CodecError::malformed("missing F0 start byte"));
        }
        if bytes.last() != Some(&SYSEX_END) {
            return Err(CodecError::malformed("missing F7 end byte"));
        }
        if bytes.len() < self.profile.min_frame_len() {
            return Err(CodecError::malformed(format!(
                "frame too short ({} bytes, need {})",
                bytes.len(),
                self.profile.min_frame_len()
            )));
        }

        let body = &bytes[1..bytes.len() - 1];
        if let Some(pos) = body.iter().position(|&b| b >= 0x80) {
            return Err(CodecError::malformed(format!(
                "status byte {:02X} inside frame at {}",
                body[pos],
                pos + 1
            )));
        }

        if bytes[1] != self.profile.manufacturer_id {
            return Err(CodecError::malformed(format!(
                "manufacturer {:02X} is not {:02X}",
                bytes[1], self.profile.manufacturer_id
            )));
        }
        if bytes[2] != self.profile.device_id {
            return Err(CodecError::malformed(format!(
                "device id {:02X} is not {:02X}",
                bytes[2], self.profile.device_id
            )));
        }
        let model_end = 3 + self.profile.model_id.len();
        if bytes[3..model_end] != self.profile.model_id[..] {
            return Err(CodecError::malformed("model id mismatch"));
        }

        let command = Command::from_byte(bytes[model_end]).ok_or_else(|| {
            CodecError::malformed(format!("unknown command {:02X}", bytes[model_end]))
        })?;

        let addr_start = self.profile.header_len();
        let address = Address::new(bytes[addr_start], bytes[addr_start + 1], bytes[addr_start + 2]);
        let payload = &bytes[addr_start + 3..bytes.len() - 2];
        let received = bytes[bytes.len() - 2];

        Ok((command, address, payload, received))
    }

    fn decode_request(address: Address, payload: &[u8]) -> ParsedReply {
        let found = lookup_by_address(address);
        let (addr, offset, err) = match found {
            Ok(m) => (Some(m.entry.name), m.offset, None),
            Err(e) => (None, 0, Some(e)),
        };

        ParsedReply {
            addr,
            address,
            offset,
            mode: Command::Rq1,
            value: ReplyValue::Number(unpack_value(ValueKind::Byte, payload)),
            hexval: hex::encode(payload),
            fields: Vec::new(),
            err,
        }
    }

    fn decode_data(address: Address, payload: &[u8]) -> ParsedReply {
        let hexval = hex::encode(payload);

        let found = match lookup_by_address(address) {
            Ok(found) => found,
            Err(e) => {
                return ParsedReply {
                    addr: None,
                    address,
                    offset: 0,
                    mode: Command::Dt1,
                    value: ReplyValue::Raw(payload.to_vec()),
                    hexval,
                    fields: Vec::new(),
                    err: Some(e),
                }
            }
        };

        let entry = found.entry;
        let remaining = entry.length as usize - found.offset as usize;
        let own = &payload[..payload.len().min(remaining)];
        let value = decode_value(entry, own);

        let mut err = None;
        if found.offset == 0 && own.len() < remaining {
            err = Some(CodecError::ShortPayload {
                name: entry.name,
                expected: remaining,
                actual: own.len(),
            });
        }

        let fields = if payload.len() > remaining {
            decode_fields(address, payload)
        } else {
            Vec::new()
        };

        ParsedReply {
            addr: Some(entry.name),
            address,
            offset: found.offset,
            mode: Command::Dt1,
            value,
            hexval,
            fields,
            err,
        }
    }
}

fn decode_value(entry: &AddressEntry, bytes: &[u8]) -> ReplyValue {
    match entry.kind {
        ValueKind::AsciiBlock => ReplyValue::Text(bytes.iter().map(|&b| b as char).collect()),
        kind => ReplyValue::Number(unpack_value(kind, bytes)),
    }
}

fn decode_fields(start: Address, payload: &[u8]) -> Vec<FieldReply> {
    let base = start.to_linear();
    entries_within(start, payload.len())
        .map(|entry| {
            let from = (entry.address.to_linear() - base) as usize;
            let bytes = &payload[from..from + entry.length as usize];
            FieldReply {
                name: entry.name,
                value: decode_value(entry, bytes),
                hexval: hex::encode(bytes),
            }
        })
        .collect()
}
