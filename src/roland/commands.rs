//! Piano command set built on the sysex builder

use std::fmt;
use std::str::FromStr;

use super::builder::{OutgoingMessage, SysexBuilder};
use super::error::CodecError;
use super::tones::ToneCode;

/// Bytes covered by a keyboard-mode block read (mode through dual tone)
pub const KEYBOARD_BLOCK_LEN: u32 = 16;

/// Parameters queried right after the connection is established
const STATUS_QUERIES: &[&str] = &[
    "masterVolume",
    "metronomeVolume",
    "metronomeStatus",
    "sequencerTempoRO",
    "keyTouch",
    "masterTuning",
    "ambience",
    "brilliance",
    "splitPoint",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardMode {
    Single = 0,
    Split = 1,
    Dual = 2,
    Twin = 3,
}

impl KeyboardMode {
    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            0 => Some(KeyboardMode::Single),
            1 => Some(KeyboardMode::Split),
            2 => Some(KeyboardMode::Dual),
            3 => Some(KeyboardMode::Twin),
            _ => None,
        }
    }
}

impl FromStr for KeyboardMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(KeyboardMode::Single),
            "split" => Ok(KeyboardMode::Split),
            "dual" => Ok(KeyboardMode::Dual),
            "twin" => Ok(KeyboardMode::Twin),
            other => Err(format!("unknown keyboard mode '{}'", other)),
        }
    }
}

impl fmt::Display for KeyboardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyboardMode::Single => "single",
            KeyboardMode::Split => "split",
            KeyboardMode::Dual => "dual",
            KeyboardMode::Twin => "twin",
        };
        f.write_str(name)
    }
}

/// Which part a tone is assigned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToneSlot {
    Single,
    Split,
    Dual,
}

impl ToneSlot {
    pub fn address_name(self) -> &'static str {
        match self {
            ToneSlot::Single => "toneForSingle",
            ToneSlot::Split => "toneForSplit",
            ToneSlot::Dual => "toneForDual",
        }
    }
}

impl FromStr for ToneSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(ToneSlot::Single),
            "split" => Ok(ToneSlot::Split),
            "dual" => Ok(ToneSlot::Dual),
            other => Err(format!("unknown tone slot '{}'", other)),
        }
    }
}

impl fmt::Display for ToneSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ToneSlot::Single => "single",
            ToneSlot::Split => "split",
            ToneSlot::Dual => "dual",
        };
        f.write_str(name)
    }
}

/// High-level piano operations, each returning a ready frame
#[derive(Debug, Clone, Default)]
pub struct PianoCommands {
    builder: SysexBuilder,
}

impl PianoCommands {
    pub fn new(builder: SysexBuilder) -> Self {
        Self { builder }
    }

    pub fn builder(&self) -> &SysexBuilder {
        &self.builder
    }

    pub fn set_keyboard_mode(&self, mode: KeyboardMode) -> Result<OutgoingMessage, CodecError> {
        self.builder.build_set("keyBoardMode", mode as u32)
    }

    /// Read mode, split/dual settings and the three tones in one reply
    pub fn check_keyboard_mode(&self) -> Result<OutgoingMessage, CodecError> {
        self.builder.build_request_span("keyBoardMode", KEYBOARD_BLOCK_LEN)
    }

    pub fn set_tone(&self, slot: ToneSlot, code: ToneCode) -> Result<OutgoingMessage, CodecError> {
        self.builder.build_set(slot.address_name(), code.to_value())
    }

    pub fn set_master_volume(&self, volume: u32) -> Result<OutgoingMessage, CodecError> {
        self.builder.build_set("masterVolume", volume)
    }

    pub fn set_metronome_volume(&self, volume: u32) -> Result<OutgoingMessage, CodecError> {
        self.builder.build_set("metronomeVolume", volume)
    }

    pub fn toggle_metronome(&self) -> Result<OutgoingMessage, CodecError> {
        self.builder.build_set("metronomeSwToggle", 0)
    }

    pub fn set_metronome_tempo(&self, tempo: u32) -> Result<OutgoingMessage, CodecError> {
        self.builder.build_set("sequencerTempoWO", tempo)
    }

    pub fn set_master_tune(&self, value: u32) -> Result<OutgoingMessage, CodecError> {
        self.builder.build_set("masterTuning", value)
    }

    pub fn check_master_tune(&self) -> Result<OutgoingMessage, CodecError> {
        self.builder.build_request("masterTuning")
    }

    pub fn set_key_touch(&self, value: u32) -> Result<OutgoingMessage, CodecError> {
        self.builder.build_set("keyTouch", value)
    }

    pub fn check_key_touch(&self) -> Result<OutgoingMessage, CodecError> {
        self.builder.build_request("keyTouch")
    }

    pub fn set_ambience(&self, value: u32) -> Result<OutgoingMessage, CodecError> {
        self.builder.build_set("ambience", value)
    }

    pub fn set_brilliance(&self, value: u32) -> Result<OutgoingMessage, CodecError> {
        self.builder.build_set("brilliance", value)
    }

    pub fn set_split_point(&self, value: u32) -> Result<OutgoingMessage, CodecError> {
        self.builder.build_set("splitPoint", value)
    }

    /// Initialization sequence sent once the ports are open
    ///
    /// Announces the controller, then reads back every value the panel shows.
    pub fn connect_sequence(&self) -> Result<Vec<OutgoingMessage>, CodecError> {
        let mut messages = vec![
            self.builder.build_set("connection", 1)?,
            self.check_keyboard_mode()?,
        ];
        for name in STATUS_QUERIES {
            messages.push(self.builder.build_request(name)?);
        }
        Ok(messages)
    }
}
