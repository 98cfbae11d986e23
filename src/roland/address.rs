//! Device address table
//!
//! Static map from symbolic parameter names to three-byte device addresses.
//! Each address byte is 7-bit, so range arithmetic is done on the linear
//! 21-bit value (offsets carry at 0x80, not 0x100).

use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::error::CodecError;

/// Three-byte device memory address (`hi`, `mid`, `lo`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; 3]);

impl Address {
    pub const fn new(hi: u8, mid: u8, lo: u8) -> Self {
        Self([hi, mid, lo])
    }

    /// Linear position in 7-bit address space
    pub fn to_linear(self) -> u32 {
        let [hi, mid, lo] = self.0;
        ((hi as u32 & 0x7F) << 14) | ((mid as u32 & 0x7F) << 7) | (lo as u32 & 0x7F)
    }

    pub fn from_linear(value: u32) -> Self {
        Self([
            ((value >> 14) & 0x7F) as u8,
            ((value >> 7) & 0x7F) as u8,
            (value & 0x7F) as u8,
        ])
    }

    /// Address `n` bytes further on, carrying at 0x80
    pub fn offset(self, n: u32) -> Self {
        Self::from_linear(self.to_linear() + n)
    }

    pub fn bytes(&self) -> &[u8; 3] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {:02X} {:02X}", self.0[0], self.0[1], self.0[2])
    }
}

/// How an entry's payload bytes map to a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// `length` wire bytes of 7 bits each, big-endian
    Byte,
    /// Every wire byte carries one nibble; two wire bytes per logical byte
    NibblePair,
    /// 7-bit ASCII text, space padded
    AsciiBlock,
}

/// One parameter of the device memory map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressEntry {
    pub name: &'static str,
    pub address: Address,
    /// Payload length in wire bytes
    pub length: u8,
    pub kind: ValueKind,
}

impl AddressEntry {
    const fn new(name: &'static str, address: [u8; 3], length: u8, kind: ValueKind) -> Self {
        Self {
            name,
            address: Address(address),
            length,
            kind,
        }
    }

    /// Number of value bits the payload can carry (None for text)
    pub fn bit_width(&self) -> Option<u32> {
        match self.kind {
            ValueKind::Byte => Some(7 * self.length as u32),
            ValueKind::NibblePair => Some(4 * self.length as u32),
            ValueKind::AsciiBlock => None,
        }
    }

    /// Largest value accepted by `build_set`
    pub fn max_value(&self) -> Option<u32> {
        self.bit_width()
            .map(|bits| if bits >= 32 { u32::MAX } else { (1u32 << bits) - 1 })
    }

    /// First linear address past the end of this entry
    pub fn end(&self) -> u32 {
        self.address.to_linear() + self.length as u32
    }

    pub fn contains(&self, address: Address) -> bool {
        let linear = address.to_linear();
        linear >= self.address.to_linear() && linear < self.end()
    }
}

use ValueKind::{AsciiBlock, Byte, NibblePair};

/// Full parameter map, ordered by address
pub static ADDRESS_TABLE: &[AddressEntry] = &[
    // 01 00 xx
    AddressEntry::new("serverSetupFileName", [0x01, 0x00, 0x00], 32, AsciiBlock),
    // 01 01 xx (read-only status)
    AddressEntry::new("songToneLanguage", [0x01, 0x01, 0x00], 1, Byte),
    AddressEntry::new("keyTransposeRO", [0x01, 0x01, 0x01], 1, Byte),
    AddressEntry::new("songTransposeRO", [0x01, 0x01, 0x02], 1, Byte),
    AddressEntry::new("sequencerStatus", [0x01, 0x01, 0x03], 2, Byte),
    AddressEntry::new("sequencerMeasure", [0x01, 0x01, 0x05], 2, NibblePair),
    AddressEntry::new("sequencerTempoNotation", [0x01, 0x01, 0x07], 1, Byte),
    AddressEntry::new("sequencerTempoRO", [0x01, 0x01, 0x08], 2, Byte),
    AddressEntry::new("sequencerBeatNumerator", [0x01, 0x01, 0x0A], 1, Byte),
    AddressEntry::new("sequencerBeatDenominator", [0x01, 0x01, 0x0B], 1, Byte),
    AddressEntry::new("sequencerPartSwAccomp", [0x01, 0x01, 0x0C], 1, Byte),
    AddressEntry::new("sequencerPartSwLeft", [0x01, 0x01, 0x0D], 1, Byte),
    AddressEntry::new("sequencerPartSwRight", [0x01, 0x01, 0x0E], 1, Byte),
    AddressEntry::new("metronomeStatus", [0x01, 0x01, 0x0F], 1, Byte),
    AddressEntry::new("headphonesConnection", [0x01, 0x01, 0x10], 1, Byte),
    // 01 02 xx
    AddressEntry::new("keyBoardMode", [0x01, 0x02, 0x00], 1, Byte),
    AddressEntry::new("splitPoint", [0x01, 0x02, 0x01], 1, Byte),
    AddressEntry::new("splitOctaveShift", [0x01, 0x02, 0x02], 1, Byte),
    AddressEntry::new("splitBalance", [0x01, 0x02, 0x03], 1, Byte),
    AddressEntry::new("dualOctaveShift", [0x01, 0x02, 0x04], 1, Byte),
    AddressEntry::new("dualBalance", [0x01, 0x02, 0x05], 1, Byte),
    AddressEntry::new("twinPianoMode", [0x01, 0x02, 0x06], 1, Byte),
    AddressEntry::new("toneForSingle", [0x01, 0x02, 0x07], 3, Byte),
    AddressEntry::new("toneForSplit", [0x01, 0x02, 0x0A], 3, Byte),
    AddressEntry::new("toneForDual", [0x01, 0x02, 0x0D], 3, Byte),
    AddressEntry::new("songNumber", [0x01, 0x02, 0x10], 3, Byte),
    AddressEntry::new("masterVolume", [0x01, 0x02, 0x13], 1, Byte),
    AddressEntry::new("masterVolumeLimit", [0x01, 0x02, 0x14], 1, Byte),
    AddressEntry::new("allSongPlayMode", [0x01, 0x02, 0x15], 1, Byte),
    AddressEntry::new("splitRightOctaveShift", [0x01, 0x02, 0x16], 1, Byte),
    AddressEntry::new("dualTone1OctaveShift", [0x01, 0x02, 0x17], 1, Byte),
    AddressEntry::new("masterTuning", [0x01, 0x02, 0x18], 2, Byte),
    AddressEntry::new("ambience", [0x01, 0x02, 0x1A], 1, Byte),
    AddressEntry::new("headphones3DAmbience", [0x01, 0x02, 0x1B], 1, Byte),
    AddressEntry::new("brilliance", [0x01, 0x02, 0x1C], 1, Byte),
    AddressEntry::new("keyTouch", [0x01, 0x02, 0x1D], 1, Byte),
    AddressEntry::new("transposeMode", [0x01, 0x02, 0x1E], 1, Byte),
    AddressEntry::new("metronomeBeat", [0x01, 0x02, 0x1F], 1, Byte),
    AddressEntry::new("metronomePattern", [0x01, 0x02, 0x20], 1, Byte),
    AddressEntry::new("metronomeVolume", [0x01, 0x02, 0x21], 1, Byte),
    AddressEntry::new("metronomeTone", [0x01, 0x02, 0x22], 1, Byte),
    AddressEntry::new("metronomeDownBeat", [0x01, 0x02, 0x23], 1, Byte),
    // 01 03 xx (write-only application controls)
    AddressEntry::new("applicationMode", [0x01, 0x03, 0x00], 2, NibblePair),
    AddressEntry::new("scorePageTurn", [0x01, 0x03, 0x02], 1, Byte),
    AddressEntry::new("arrangerPedalFunction", [0x01, 0x03, 0x03], 1, Byte),
    AddressEntry::new("arrangerBalance", [0x01, 0x03, 0x05], 1, Byte),
    AddressEntry::new("connection", [0x01, 0x03, 0x06], 1, Byte),
    AddressEntry::new("keyTransposeWO", [0x01, 0x03, 0x07], 1, Byte),
    AddressEntry::new("songTransposeWO", [0x01, 0x03, 0x08], 1, Byte),
    AddressEntry::new("sequencerTempoWO", [0x01, 0x03, 0x09], 2, Byte),
    AddressEntry::new("tempoReset", [0x01, 0x03, 0x0B], 1, Byte),
    // 01 04 xx
    AddressEntry::new("soundEffect", [0x01, 0x04, 0x00], 2, NibblePair),
    AddressEntry::new("soundEffectStopAll", [0x01, 0x04, 0x02], 1, Byte),
    // 01 05 xx (triggers)
    AddressEntry::new("sequencerREW", [0x01, 0x05, 0x00], 1, Byte),
    AddressEntry::new("sequencerFF", [0x01, 0x05, 0x01], 1, Byte),
    AddressEntry::new("sequencerReset", [0x01, 0x05, 0x02], 1, Byte),
    AddressEntry::new("sequencerTempoDown", [0x01, 0x05, 0x03], 1, Byte),
    AddressEntry::new("sequencerTempoUp", [0x01, 0x05, 0x04], 1, Byte),
    AddressEntry::new("sequencerPlayStopToggle", [0x01, 0x05, 0x05], 1, Byte),
    AddressEntry::new("sequencerAccompPartSwitchToggle", [0x01, 0x05, 0x06], 1, Byte),
    AddressEntry::new("sequencerLeftPartSwitchToggle", [0x01, 0x05, 0x07], 1, Byte),
    AddressEntry::new("sequencerRightPartSwitchToggle", [0x01, 0x05, 0x08], 1, Byte),
    AddressEntry::new("metronomeSwToggle", [0x01, 0x05, 0x09], 1, Byte),
    AddressEntry::new("sequencerPreviousSong", [0x01, 0x05, 0x0A], 1, Byte),
    AddressEntry::new("sequencerNextSong", [0x01, 0x05, 0x0B], 1, Byte),
    // 01 06 xx
    AddressEntry::new("pageTurnPreviousPage", [0x01, 0x06, 0x00], 1, Byte),
    AddressEntry::new("pageTurnNextPage", [0x01, 0x06, 0x01], 1, Byte),
    // 01 08 xx
    AddressEntry::new("addressMapVersion", [0x01, 0x08, 0x00], 1, Byte),
];

/// Entry resolved from an inbound address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressMatch {
    pub entry: &'static AddressEntry,
    /// Distance of the looked-up address from the entry start (0 = exact)
    pub offset: u32,
}

struct TableIndex {
    by_name: HashMap<&'static str, usize>,
    by_start: BTreeMap<u32, usize>,
}

static INDEX: Lazy<TableIndex> = Lazy::new(|| {
    let mut by_name = HashMap::with_capacity(ADDRESS_TABLE.len());
    let mut by_start = BTreeMap::new();
    for (idx, entry) in ADDRESS_TABLE.iter().enumerate() {
        by_name.insert(entry.name, idx);
        by_start.insert(entry.address.to_linear(), idx);
    }
    TableIndex { by_name, by_start }
});

/// Resolve a symbolic parameter name
pub fn lookup_by_name(name: &str) -> Result<&'static AddressEntry, CodecError> {
    INDEX
        .by_name
        .get(name)
        .map(|&idx| &ADDRESS_TABLE[idx])
        .ok_or_else(|| CodecError::UnknownAddress(name.to_string()))
}

/// Resolve an inbound address to the entry whose range contains it
pub fn lookup_by_address(address: Address) -> Result<AddressMatch, CodecError> {
    let linear = address.to_linear();
    INDEX
        .by_start
        .range(..=linear)
        .next_back()
        .map(|(_, &idx)| &ADDRESS_TABLE[idx])
        .filter(|entry| entry.contains(address))
        .map(|entry| AddressMatch {
            entry,
            offset: linear - entry.address.to_linear(),
        })
        .ok_or(CodecError::UnmappedAddress(address))
}

/// Entries lying entirely inside `[start, start + len)`, in address order
pub fn entries_within(start: Address, len: usize) -> impl Iterator<Item = &'static AddressEntry> {
    let from = start.to_linear();
    let to = from + len as u32;
    INDEX
        .by_start
        .range(from..to)
        .map(|(_, &idx)| &ADDRESS_TABLE[idx])
        .filter(move |entry| entry.end() <= to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_and_addresses_unique() {
        let names: HashSet<_> = ADDRESS_TABLE.iter().map(|e| e.name).collect();
        let starts: HashSet<_> = ADDRESS_TABLE.iter().map(|e| e.address).collect();
        assert_eq!(names.len(), ADDRESS_TABLE.len());
        assert_eq!(starts.len(), ADDRESS_TABLE.len());
    }

    #[test]
    fn test_ranges_do_not_overlap() {
        for pair in ADDRESS_TABLE.windows(2) {
            assert!(
                pair[0].end() <= pair[1].address.to_linear(),
                "{} overlaps {}",
                pair[0].name,
                pair[1].name
            );
        }
    }

    #[test]
    fn test_nibble_entries_have_even_length() {
        for entry in ADDRESS_TABLE.iter().filter(|e| e.kind == ValueKind::NibblePair) {
            assert_eq!(entry.length % 2, 0, "{}", entry.name);
        }
    }

    #[test]
    fn test_lookup_by_name() {
        let entry = lookup_by_name("masterVolume").unwrap();
        assert_eq!(entry.address, Address::new(0x01, 0x02, 0x13));
        assert_eq!(entry.length, 1);

        assert_eq!(
            lookup_by_name("bogus"),
            Err(CodecError::UnknownAddress("bogus".to_string()))
        );
    }

    #[test]
    fn test_lookup_exact_address() {
        let found = lookup_by_address(Address::new(0x01, 0x02, 0x07)).unwrap();
        assert_eq!(found.entry.name, "toneForSingle");
        assert_eq!(found.offset, 0);
    }

    #[test]
    fn test_lookup_inside_range() {
        let found = lookup_by_address(Address::new(0x01, 0x02, 0x09)).unwrap();
        assert_eq!(found.entry.name, "toneForSingle");
        assert_eq!(found.offset, 2);

        let found = lookup_by_address(Address::new(0x01, 0x00, 0x1F)).unwrap();
        assert_eq!(found.entry.name, "serverSetupFileName");
    }

    #[test]
    fn test_lookup_gap_is_unmapped() {
        // 01 03 04 sits between arrangerPedalFunction and arrangerBalance
        let addr = Address::new(0x01, 0x03, 0x04);
        assert_eq!(lookup_by_address(addr), Err(CodecError::UnmappedAddress(addr)));

        let addr = Address::new(0x7F, 0x7F, 0x7F);
        assert!(lookup_by_address(addr).is_err());
    }

    #[test]
    fn test_offset_carries_at_0x80() {
        let addr = Address::new(0x01, 0x00, 0x7F).offset(1);
        assert_eq!(addr, Address::new(0x01, 0x01, 0x00));
    }

    #[test]
    fn test_entries_within_keyboard_block() {
        let names: Vec<_> = entries_within(Address::new(0x01, 0x02, 0x00), 16)
            .map(|e| e.name)
            .collect();
        assert_eq!(names.first(), Some(&"keyBoardMode"));
        assert!(names.contains(&"toneForSingle"));
        assert!(names.contains(&"toneForSplit"));
        assert!(names.contains(&"toneForDual"));
        assert!(!names.contains(&"songNumber"));
    }

    #[test]
    fn test_max_value_from_width() {
        assert_eq!(lookup_by_name("masterVolume").unwrap().max_value(), Some(127));
        assert_eq!(lookup_by_name("masterTuning").unwrap().max_value(), Some(16383));
        assert_eq!(lookup_by_name("applicationMode").unwrap().max_value(), Some(255));
        assert_eq!(lookup_by_name("serverSetupFileName").unwrap().max_value(), None);
    }
}
