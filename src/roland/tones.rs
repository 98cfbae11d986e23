//! Instrument catalog
//!
//! Each tone has the three-byte code the piano stores in `toneForSingle` /
//! `toneForSplit` / `toneForDual`, plus the bank select and program change
//! used to audition it locally.

use std::fmt;
use std::str::FromStr;

use super::address::ValueKind;
use super::nibble::{pack_value, unpack_value};

/// Three-byte device tone code, rendered as six hex digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToneCode(pub [u8; 3]);

impl ToneCode {
    /// Numeric value as written through `build_set`
    pub fn to_value(self) -> u32 {
        unpack_value(ValueKind::Byte, &self.0)
    }

    pub fn from_value(value: u32) -> Self {
        let bytes = pack_value(ValueKind::Byte, 3, value);
        Self([bytes[0], bytes[1], bytes[2]])
    }
}

impl fmt::Display for ToneCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for ToneCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| format!("invalid tone code '{}': {}", s, e))?;
        match bytes.as_slice() {
            [a, b, c] if bytes.iter().all(|&x| x < 0x80) => Ok(Self([*a, *b, *c])),
            _ => Err(format!("tone code '{}' must be three 7-bit bytes", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tone {
    pub name: &'static str,
    pub code: ToneCode,
    pub bank_msb: u8,
    pub bank_lsb: u8,
    /// Zero-based program number
    pub program: u8,
}

#[derive(Debug)]
pub struct ToneGroup {
    pub name: &'static str,
    pub tones: &'static [Tone],
}

const fn tone(name: &'static str, code: [u8; 3], bank_msb: u8, bank_lsb: u8, program: u8) -> Tone {
    Tone {
        name,
        code: ToneCode(code),
        bank_msb,
        bank_lsb,
        program,
    }
}

pub static TONE_GROUPS: &[ToneGroup] = &[
    ToneGroup {
        name: "Piano",
        tones: &[
            tone("Concert Piano", [0x00, 0x00, 0x00], 0, 68, 0),
            tone("Ballad Piano", [0x00, 0x00, 0x01], 16, 67, 0),
            tone("Mellow Piano", [0x00, 0x00, 0x02], 4, 64, 0),
            tone("Bright Piano", [0x00, 0x00, 0x03], 8, 66, 1),
            tone("Upright Piano", [0x00, 0x00, 0x04], 16, 64, 0),
            tone("Mellow Upright", [0x00, 0x00, 0x05], 1, 67, 0),
            tone("Bright Upright", [0x00, 0x00, 0x06], 1, 65, 1),
            tone("Rock Piano", [0x00, 0x00, 0x07], 8, 64, 2),
        ],
    },
    ToneGroup {
        name: "E.Piano",
        tones: &[
            tone("Tremolo EP", [0x01, 0x00, 0x00], 0, 69, 4),
            tone("1976SuitCase", [0x01, 0x00, 0x01], 0, 70, 4),
            tone("Wurly 200", [0x01, 0x00, 0x02], 25, 65, 4),
            tone("Phaser Wurly", [0x01, 0x00, 0x03], 0, 71, 4),
            tone("FM E.Piano", [0x01, 0x00, 0x04], 0, 68, 5),
            tone("'60s E.Piano", [0x01, 0x00, 0x05], 24, 65, 4),
            tone("Clav.", [0x01, 0x00, 0x06], 0, 67, 7),
            tone("Vibraphone", [0x01, 0x00, 0x07], 0, 64, 11),
        ],
    },
    ToneGroup {
        name: "Other",
        tones: &[
            tone("Strings", [0x02, 0x00, 0x00], 0, 71, 48),
            tone("Mellow Strings", [0x02, 0x00, 0x01], 0, 65, 49),
            tone("Jazz Organ", [0x02, 0x00, 0x02], 0, 70, 17),
            tone("Church Organ", [0x02, 0x00, 0x03], 0, 66, 19),
            tone("Harpsichord", [0x02, 0x00, 0x04], 0, 66, 6),
            tone("Choir", [0x02, 0x00, 0x05], 8, 64, 52),
            tone("Nylon-str.Gt", [0x02, 0x00, 0x06], 0, 64, 24),
            tone("Acoustic Bass", [0x02, 0x00, 0x07], 0, 66, 32),
        ],
    },
];

/// Every catalog tone with its group name
pub fn all_tones() -> impl Iterator<Item = (&'static str, &'static Tone)> {
    TONE_GROUPS
        .iter()
        .flat_map(|group| group.tones.iter().map(move |t| (group.name, t)))
}

pub fn find_by_code(code: ToneCode) -> Option<&'static Tone> {
    all_tones().map(|(_, t)| t).find(|t| t.code == code)
}

/// Case-insensitive exact name match
pub fn find_by_name(name: &str) -> Option<&'static Tone> {
    all_tones()
        .map(|(_, t)| t)
        .find(|t| t.name.eq_ignore_ascii_case(name))
}

/// Resolve either a six-digit hex code or a tone name
pub fn resolve(query: &str) -> Option<&'static Tone> {
    query.parse::<ToneCode>()
        .ok()
        .and_then(find_by_code)
        .or_else(|| find_by_name(query))
}
