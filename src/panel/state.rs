//! Panel values with the controller's clamping rules

use std::fmt;

use super::PanelEvent;
use crate::roland::{tones, KeyboardMode, ToneCode, ToneSlot};

pub const MASTER_VOLUME_MAX: u32 = 100;
pub const MASTER_VOLUME_STEP: u32 = 5;
pub const METRONOME_VOLUME_MAX: u32 = 6;
pub const METRONOME_VOLUME_STEP: u32 = 1;
pub const TEMPO_MIN: u32 = 10;
pub const TEMPO_MAX: u32 = 400;
pub const TUNE_MIN: u32 = 10;
pub const TUNE_MAX: u32 = 511;
/// Raw tuning value for A4 = 440 Hz
pub const TUNE_CENTER: u32 = 256;

/// Pitch of A4 in Hz for a raw tuning value
pub fn to_pitch(value: u32) -> f32 {
    (value as f32 - TUNE_CENTER as f32) / 10.0 + 440.0
}

/// Bound on the raw offset from 440 Hz; far outside the device range
const PITCH_OFFSET_LIMIT: f32 = (1 << 20) as f32;

/// Raw tuning value for a pitch in Hz; may fall outside the device range
///
/// NaN maps to the 440 Hz value.
pub fn from_pitch(pitch: f32) -> i32 {
    let offset = ((pitch - 440.0) * 10.0)
        .round()
        .clamp(-PITCH_OFFSET_LIMIT, PITCH_OFFSET_LIMIT);
    offset as i32 + TUNE_CENTER as i32
}

/// Raw values that may be jumped to directly (440 Hz and 442 Hz)
fn is_preset_tune(value: i32) -> bool {
    value == TUNE_CENTER as i32 || value == TUNE_CENTER as i32 + 20
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelState {
    pub keyboard_mode: Option<KeyboardMode>,
    pub single_tone: Option<ToneCode>,
    pub split_tone: Option<ToneCode>,
    pub dual_tone: Option<ToneCode>,
    pub master_volume: u32,
    pub metronome_volume: u32,
    pub metronome_on: bool,
    pub tempo: u32,
    pub key_touch: u32,
    pub master_tune: u32,
    pub ambience: u32,
    pub brilliance: u32,
    pub split_point: u32,
}

impl Default for PanelState {
    fn default() -> Self {
        Self {
            keyboard_mode: None,
            single_tone: None,
            split_tone: None,
            dual_tone: None,
            master_volume: 0,
            metronome_volume: 0,
            metronome_on: false,
            tempo: TEMPO_MIN,
            key_touch: 0,
            master_tune: TUNE_CENTER,
            ambience: 0,
            brilliance: 0,
            split_point: 0,
        }
    }
}

impl PanelState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a reported value into the panel
    pub fn apply(&mut self, event: &PanelEvent) {
        match *event {
            PanelEvent::KeyboardMode(mode) => self.keyboard_mode = Some(mode),
            PanelEvent::Tone { slot, code } => *self.tone_mut(slot) = Some(code),
            PanelEvent::MasterVolume(v) => {
                self.set_master_volume(v);
            }
            PanelEvent::MetronomeVolume(v) => {
                self.set_metronome_volume(v);
            }
            PanelEvent::Metronome(on) => self.metronome_on = on,
            PanelEvent::Tempo(v) => {
                self.set_tempo(v);
            }
            PanelEvent::KeyTouch(v) => self.key_touch = v,
            PanelEvent::MasterTuning(v) => {
                self.set_master_tune(v as i32);
            }
            PanelEvent::Ambience(v) => self.ambience = v,
            PanelEvent::Brilliance(v) => self.brilliance = v,
            PanelEvent::SplitPoint(v) => self.split_point = v,
        }
    }

    pub fn tone(&self, slot: ToneSlot) -> Option<ToneCode> {
        match slot {
            ToneSlot::Single => self.single_tone,
            ToneSlot::Split => self.split_tone,
            ToneSlot::Dual => self.dual_tone,
        }
    }

    fn tone_mut(&mut self, slot: ToneSlot) -> &mut Option<ToneCode> {
        match slot {
            ToneSlot::Single => &mut self.single_tone,
            ToneSlot::Split => &mut self.split_tone,
            ToneSlot::Dual => &mut self.dual_tone,
        }
    }

    pub fn set_master_volume(&mut self, value: u32) -> u32 {
        self.master_volume = value.min(MASTER_VOLUME_MAX);
        self.master_volume
    }

    pub fn master_volume_up(&mut self) -> u32 {
        self.set_master_volume(self.master_volume + MASTER_VOLUME_STEP)
    }

    pub fn master_volume_down(&mut self) -> u32 {
        self.set_master_volume(self.master_volume.saturating_sub(MASTER_VOLUME_STEP))
    }

    pub fn set_metronome_volume(&mut self, value: u32) -> u32 {
        self.metronome_volume = value.min(METRONOME_VOLUME_MAX);
        self.metronome_volume
    }

    pub fn metronome_volume_up(&mut self) -> u32 {
        self.set_metronome_volume(self.metronome_volume + METRONOME_VOLUME_STEP)
    }

    pub fn metronome_volume_down(&mut self) -> u32 {
        self.set_metronome_volume(self.metronome_volume.saturating_sub(METRONOME_VOLUME_STEP))
    }

    pub fn set_tempo(&mut self, value: u32) -> u32 {
        self.tempo = value.clamp(TEMPO_MIN, TEMPO_MAX);
        self.tempo
    }

    /// Move the master tuning toward `value`
    ///
    /// Only the 440 Hz and 442 Hz presets are taken as-is; any other target
    /// moves the tuning a single step from where it is. The result is
    /// clamped to the device range.
    pub fn set_master_tune(&mut self, value: i32) -> u32 {
        let current = self.master_tune as i32;
        let next = if is_preset_tune(value) {
            value
        } else if value > current {
            current + 1
        } else if value < current {
            current - 1
        } else {
            value
        };
        self.master_tune = next.clamp(TUNE_MIN as i32, TUNE_MAX as i32) as u32;
        self.master_tune
    }

    pub fn pitch(&self) -> f32 {
        to_pitch(self.master_tune)
    }
}

fn tone_label(code: Option<ToneCode>) -> String {
    match code {
        Some(code) => match tones::find_by_code(code) {
            Some(tone) => format!("{} ({})", tone.name, code),
            None => code.to_string(),
        },
        None => "-".to_string(),
    }
}

impl fmt::Display for PanelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = self
            .keyboard_mode
            .map(|m| m.to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(f, "keyboard mode     {}", mode)?;
        writeln!(f, "  single tone     {}", tone_label(self.single_tone))?;
        writeln!(f, "  split tone      {}", tone_label(self.split_tone))?;
        writeln!(f, "  dual tone       {}", tone_label(self.dual_tone))?;
        writeln!(f, "  split point     {}", self.split_point)?;
        writeln!(f, "master volume     {}%", self.master_volume)?;
        writeln!(
            f,
            "metronome         {} (volume {}, tempo {})",
            if self.metronome_on { "on" } else { "off" },
            self.metronome_volume,
            self.tempo
        )?;
        writeln!(f, "master tune       {:.1} Hz ({})", self.pitch(), self.master_tune)?;
        writeln!(f, "key touch         {}", self.key_touch)?;
        writeln!(f, "ambience          {}", self.ambience)?;
        write!(f, "brilliance        {}", self.brilliance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_conversion() {
        assert_eq!(to_pitch(256), 440.0);
        assert_eq!(to_pitch(276), 442.0);
        assert_eq!(from_pitch(440.0), 256);
        assert_eq!(from_pitch(442.0), 276);
        assert_eq!(from_pitch(415.3), 9);
    }

    #[test]
    fn test_extreme_pitches_step_once() {
        let mut state = PanelState::new();
        assert_eq!(state.set_master_tune(from_pitch(f32::INFINITY)), 257);
        assert_eq!(state.set_master_tune(from_pitch(1e30)), 258);
        assert_eq!(state.set_master_tune(from_pitch(f32::NEG_INFINITY)), 257);
        assert_eq!(state.set_master_tune(from_pitch(-1e30)), 256);
        assert_eq!(from_pitch(f32::NAN), TUNE_CENTER as i32);
    }

    #[test]
    fn test_tune_ratchet_steps_by_one() {
        let mut state = PanelState::new();
        assert_eq!(state.set_master_tune(from_pitch(445.0)), 257);
        assert_eq!(state.set_master_tune(from_pitch(445.0)), 258);
        assert_eq!(state.set_master_tune(from_pitch(430.0)), 257);
        assert_eq!(state.set_master_tune(257), 257);
    }

    #[test]
    fn test_tune_presets_jump() {
        let mut state = PanelState::new();
        assert_eq!(state.set_master_tune(from_pitch(442.0)), 276);
        assert_eq!(state.set_master_tune(from_pitch(440.0)), 256);
    }

    #[test]
    fn test_tune_clamped() {
        let mut state = PanelState::new();
        state.master_tune = TUNE_MIN;
        assert_eq!(state.set_master_tune(-50), TUNE_MIN);
        state.master_tune = TUNE_MAX;
        assert_eq!(state.set_master_tune(2000), TUNE_MAX);
    }

    #[test]
    fn test_reported_tuning_goes_through_ratchet() {
        let mut state = PanelState::new();
        state.apply(&PanelEvent::MasterTuning(300));
        assert_eq!(state.master_tune, 257);
        state.apply(&PanelEvent::MasterTuning(276));
        assert_eq!(state.master_tune, 276);
    }

    #[test]
    fn test_volume_clamps_and_steps() {
        let mut state = PanelState::new();
        assert_eq!(state.set_master_volume(130), 100);
        assert_eq!(state.master_volume_up(), 100);
        assert_eq!(state.master_volume_down(), 95);
        state.set_master_volume(3);
        assert_eq!(state.master_volume_down(), 0);

        assert_eq!(state.set_metronome_volume(9), 6);
        assert_eq!(state.metronome_volume_down(), 5);
        state.set_metronome_volume(0);
        assert_eq!(state.metronome_volume_down(), 0);
    }

    #[test]
    fn test_tempo_clamped() {
        let mut state = PanelState::new();
        assert_eq!(state.set_tempo(5), 10);
        assert_eq!(state.set_tempo(500), 400);
        assert_eq!(state.set_tempo(120), 120);
    }

    #[test]
    fn test_apply_events() {
        let mut state = PanelState::new();
        state.apply(&PanelEvent::KeyboardMode(KeyboardMode::Split));
        state.apply(&PanelEvent::Tone {
            slot: ToneSlot::Split,
            code: ToneCode([0x02, 0x00, 0x07]),
        });
        state.apply(&PanelEvent::KeyTouch(4));
        state.apply(&PanelEvent::Metronome(true));

        assert_eq!(state.keyboard_mode, Some(KeyboardMode::Split));
        assert_eq!(state.tone(ToneSlot::Split), Some(ToneCode([0x02, 0x00, 0x07])));
        assert_eq!(state.tone(ToneSlot::Single), None);
        assert_eq!(state.key_touch, 4);
        assert!(state.metronome_on);
        assert!(state.to_string().contains("Acoustic Bass"));
    }
}
