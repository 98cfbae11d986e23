//! Control panel model
//!
//! Parsed replies are turned into [`PanelEvent`]s by the [`ReplyRouter`] and
//! folded into [`PanelState`], which applies the same clamping rules the
//! console uses for local edits.

pub mod router;
pub mod state;

use std::fmt;

use crate::roland::{KeyboardMode, ToneCode, ToneSlot};

pub use router::ReplyRouter;
pub use state::{from_pitch, to_pitch, PanelState};

/// A panel value reported by the piano
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelEvent {
    KeyboardMode(KeyboardMode),
    Tone { slot: ToneSlot, code: ToneCode },
    MasterVolume(u32),
    MetronomeVolume(u32),
    Metronome(bool),
    Tempo(u32),
    KeyTouch(u32),
    MasterTuning(u32),
    Ambience(u32),
    Brilliance(u32),
    SplitPoint(u32),
}

impl fmt::Display for PanelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PanelEvent::KeyboardMode(mode) => write!(f, "keyboard mode = {}", mode),
            PanelEvent::Tone { slot, code } => write!(f, "{} tone = {}", slot, code),
            PanelEvent::MasterVolume(v) => write!(f, "master volume = {}", v),
            PanelEvent::MetronomeVolume(v) => write!(f, "metronome volume = {}", v),
            PanelEvent::Metronome(on) => write!(f, "metronome = {}", if on { "on" } else { "off" }),
            PanelEvent::Tempo(v) => write!(f, "tempo = {}", v),
            PanelEvent::KeyTouch(v) => write!(f, "key touch = {}", v),
            PanelEvent::MasterTuning(v) => write!(f, "master tuning = {}", v),
            PanelEvent::Ambience(v) => write!(f, "ambience = {}", v),
            PanelEvent::Brilliance(v) => write!(f, "brilliance = {}", v),
            PanelEvent::SplitPoint(v) => write!(f, "split point = {}", v),
        }
    }
}
