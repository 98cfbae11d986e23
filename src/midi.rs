//! MIDI utilities and message types
//!
//! Channel message parsing/encoding, status byte helpers and the local tone
//! preview sequence.

use crate::roland::Tone;

pub const CMD_NOTE_OFF: u8 = 0x8;
pub const CMD_NOTE_ON: u8 = 0x9;
pub const CMD_CONTROL_CHANGE: u8 = 0xB;
pub const CMD_PROGRAM: u8 = 0xC;

/// Bank select MSB
pub const CC_BANK_0: u8 = 0;
/// Bank select LSB
pub const CC_BANK_1: u8 = 32;
/// Middle C (C4)
pub const MID_C: u8 = 60;

/// Compose a status byte from a command nibble and a 0-based channel
pub fn to_cmd(cmd: u8, channel: u8) -> u8 {
    ((cmd & 0x0F) << 4) | (channel & 0x0F)
}

/// Command nibble of a status byte
pub fn from_cmd(status: u8) -> u8 {
    status >> 4
}

/// 0-based channel of a status byte
pub fn chan_from_cmd(status: u8) -> u8 {
    status & 0x0F
}

/// Velocity from a 0.0-1.0 fraction
pub fn to_val(fraction: f32) -> u8 {
    (fraction.clamp(0.0, 1.0) * 127.0).round() as u8
}

/// MIDI message types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOff { channel: u8, note: u8, velocity: u8 },
    NoteOn { channel: u8, note: u8, velocity: u8 },
    PolyPressure { channel: u8, note: u8, pressure: u8 },
    ControlChange { channel: u8, cc: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    ChannelPressure { channel: u8, pressure: u8 },
    /// 14-bit value, 8192 = center
    PitchBend { channel: u8, value: u16 },
    /// Complete frame including F0 and F7
    SysEx { data: Vec<u8> },
    TimingClock,
    ActiveSensing,
}

impl MidiMessage {
    /// Parse a MIDI message from raw bytes
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;

        // Running status is not tracked
        if status < 0x80 {
            return None;
        }

        if status < 0xF0 {
            let channel = chan_from_cmd(status);
            let d1 = rest.first().map(|b| b & 0x7F);
            let d2 = rest.get(1).map(|b| b & 0x7F);

            return match from_cmd(status) {
                0x8 => Some(MidiMessage::NoteOff { channel, note: d1?, velocity: d2? }),
                0x9 => {
                    let (note, velocity) = (d1?, d2?);
                    // Velocity 0 is a note off
                    if velocity == 0 {
                        Some(MidiMessage::NoteOff { channel, note, velocity })
                    } else {
                        Some(MidiMessage::NoteOn { channel, note, velocity })
                    }
                }
                0xA => Some(MidiMessage::PolyPressure { channel, note: d1?, pressure: d2? }),
                0xB => Some(MidiMessage::ControlChange { channel, cc: d1?, value: d2? }),
                0xC => Some(MidiMessage::ProgramChange { channel, program: d1? }),
                0xD => Some(MidiMessage::ChannelPressure { channel, pressure: d1? }),
                0xE => {
                    let (lsb, msb) = (d1? as u16, d2? as u16);
                    Some(MidiMessage::PitchBend { channel, value: (msb << 7) | lsb })
                }
                _ => None,
            };
        }

        match status {
            0xF0 => {
                let end = data.iter().position(|&b| b == 0xF7)?;
                Some(MidiMessage::SysEx { data: data[..=end].to_vec() })
            }
            0xF8 => Some(MidiMessage::TimingClock),
            0xFE => Some(MidiMessage::ActiveSensing),
            _ => None,
        }
    }

    /// Encode the message to MIDI bytes
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                vec![to_cmd(CMD_NOTE_OFF, channel), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                vec![to_cmd(CMD_NOTE_ON, channel), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::PolyPressure { channel, note, pressure } => {
                vec![to_cmd(0xA, channel), note & 0x7F, pressure & 0x7F]
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                vec![to_cmd(CMD_CONTROL_CHANGE, channel), cc & 0x7F, value & 0x7F]
            }
            MidiMessage::ProgramChange { channel, program } => {
                vec![to_cmd(CMD_PROGRAM, channel), program & 0x7F]
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                vec![to_cmd(0xD, channel), pressure & 0x7F]
            }
            MidiMessage::PitchBend { channel, value } => {
                vec![to_cmd(0xE, channel), (value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8]
            }
            MidiMessage::SysEx { ref data } => data.clone(),
            MidiMessage::TimingClock => vec![0xF8],
            MidiMessage::ActiveSensing => vec![0xFE],
        }
    }

    /// Short lower-case type label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            MidiMessage::NoteOff { .. } => "noteoff",
            MidiMessage::NoteOn { .. } => "noteon",
            MidiMessage::PolyPressure { .. } => "polypressure",
            MidiMessage::ControlChange { .. } => "controlchange",
            MidiMessage::ProgramChange { .. } => "programchange",
            MidiMessage::ChannelPressure { .. } => "channelpressure",
            MidiMessage::PitchBend { .. } => "pitchbend",
            MidiMessage::SysEx { .. } => "sysex",
            MidiMessage::TimingClock => "clock",
            MidiMessage::ActiveSensing => "activesensing",
        }
    }
}

/// Messages auditioning `tone` on `channel`: bank select, program, note on, note off
///
/// The caller spaces the final note off from the note on.
pub fn tone_preview(tone: &Tone, channel: u8) -> [MidiMessage; 5] {
    [
        MidiMessage::ControlChange { channel, cc: CC_BANK_0, value: tone.bank_msb },
        MidiMessage::ControlChange { channel, cc: CC_BANK_1, value: tone.bank_lsb },
        MidiMessage::ProgramChange { channel, program: tone.program },
        MidiMessage::NoteOn { channel, note: MID_C, velocity: to_val(0.5) },
        MidiMessage::NoteOff { channel, note: MID_C, velocity: to_val(0.2) },
    ]
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roland::tones;

    #[test]
    fn test_status_helpers() {
        assert_eq!(to_cmd(CMD_NOTE_ON, 3), 0x93);
        assert_eq!(from_cmd(0xB5), CMD_CONTROL_CHANGE);
        assert_eq!(chan_from_cmd(0xB5), 5);
        assert_eq!(to_val(0.5), 64);
        assert_eq!(to_val(0.2), 25);
        assert_eq!(to_val(2.0), 127);
    }

    #[test]
    fn test_note_on_parsing() {
        let msg = MidiMessage::parse(&[0x90, 60, 100]).unwrap();
        assert_eq!(msg, MidiMessage::NoteOn { channel: 0, note: 60, velocity: 100 });
    }

    #[test]
    fn test_note_on_velocity_zero() {
        let msg = MidiMessage::parse(&[0x90, 60, 0]).unwrap();
        assert_eq!(msg, MidiMessage::NoteOff { channel: 0, note: 60, velocity: 0 });
    }

    #[test]
    fn test_truncated_channel_message() {
        assert_eq!(MidiMessage::parse(&[0xB0, 7]), None);
        assert_eq!(MidiMessage::parse(&[0x40]), None);
        assert_eq!(MidiMessage::parse(&[]), None);
    }

    #[test]
    fn test_sysex_keeps_framing() {
        let frame = [0xF0, 0x41, 0x10, 0xF7];
        let msg = MidiMessage::parse(&frame).unwrap();
        assert_eq!(msg.encode(), frame.to_vec());
        assert_eq!(MidiMessage::parse(&[0xF0, 0x41]), None);
    }

    #[test]
    fn test_encode_program_change() {
        let msg = MidiMessage::ProgramChange { channel: 2, program: 5 };
        assert_eq!(msg.encode(), vec![0xC2, 5]);
    }

    #[test]
    fn test_tone_preview() {
        let tone = tones::find_by_name("Jazz Organ").unwrap();
        let seq = tone_preview(tone, 0);
        assert_eq!(seq[0].encode(), vec![0xB0, CC_BANK_0, tone.bank_msb]);
        assert_eq!(seq[1].encode(), vec![0xB0, CC_BANK_1, tone.bank_lsb]);
        assert_eq!(seq[2].encode(), vec![0xC0, tone.program]);
        assert_eq!(seq[3].encode(), vec![0x90, MID_C, 64]);
        assert_eq!(seq[4].encode(), vec![0x80, MID_C, 25]);
    }
}
