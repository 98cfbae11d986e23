//! Reply routing
//!
//! Maps address names to handlers that turn a decoded value into a
//! [`PanelEvent`]. Handlers are registered once, when the router is built.

use std::collections::HashMap;

use tracing::trace;

use super::PanelEvent;
use crate::roland::{CodecError, Command, KeyboardMode, ParsedReply, ReplyValue, ToneCode, ToneSlot};

pub type ReplyHandler = fn(&ReplyValue) -> Option<PanelEvent>;

pub struct ReplyRouter {
    handlers: HashMap<&'static str, ReplyHandler>,
}

impl Default for ReplyRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyRouter {
    /// Router with the panel handlers registered
    pub fn new() -> Self {
        let mut router = Self::empty();

        router.register("keyBoardMode", |v| {
            KeyboardMode::from_value(v.as_number()?).map(PanelEvent::KeyboardMode)
        });
        router.register("toneForSingle", |v| tone(ToneSlot::Single, v));
        router.register("toneForSplit", |v| tone(ToneSlot::Split, v));
        router.register("toneForDual", |v| tone(ToneSlot::Dual, v));
        router.register("masterVolume", |v| v.as_number().map(PanelEvent::MasterVolume));
        router.register("metronomeVolume", |v| v.as_number().map(PanelEvent::MetronomeVolume));
        router.register("metronomeStatus", |v| v.as_number().map(|n| PanelEvent::Metronome(n != 0)));
        router.register("sequencerTempoRO", |v| v.as_number().map(PanelEvent::Tempo));
        router.register("keyTouch", |v| v.as_number().map(PanelEvent::KeyTouch));
        router.register("masterTuning", |v| v.as_number().map(PanelEvent::MasterTuning));
        router.register("ambience", |v| v.as_number().map(PanelEvent::Ambience));
        router.register("brilliance", |v| v.as_number().map(PanelEvent::Brilliance));
        router.register("splitPoint", |v| v.as_number().map(PanelEvent::SplitPoint));

        router
    }

    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &'static str, handler: ReplyHandler) {
        self.handlers.insert(name, handler);
    }

    pub fn handles(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Events carried by a reply
    ///
    /// Block replies yield one event per routed field. Requests, unmapped
    /// addresses, mid-entry starts and short payloads yield nothing.
    pub fn route(&self, reply: &ParsedReply) -> Vec<PanelEvent> {
        if reply.mode != Command::Dt1 {
            return Vec::new();
        }

        if !reply.fields.is_empty() {
            return reply
                .fields
                .iter()
                .filter_map(|field| self.dispatch(field.name, &field.value))
                .collect();
        }

        if reply.offset != 0
            || matches!(
                reply.err,
                Some(CodecError::ShortPayload { .. }) | Some(CodecError::UnmappedAddress(_))
            )
        {
            return Vec::new();
        }

        reply
            .addr
            .and_then(|name| self.dispatch(name, &reply.value))
            .into_iter()
            .collect()
    }

    fn dispatch(&self, name: &str, value: &ReplyValue) -> Option<PanelEvent> {
        let handler = self.handlers.get(name)?;
        let event = handler(value);
        trace!("Routed {} -> {:?}", name, event);
        event
    }
}

fn tone(slot: ToneSlot, value: &ReplyValue) -> Option<PanelEvent> {
    let code = ToneCode::from_value(value.as_number()?);
    Some(PanelEvent::Tone { slot, code })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roland::nibble::checksum;
    use crate::roland::SysexParser;

    fn dt1(address: [u8; 3], payload: &[u8]) -> ParsedReply {
        let mut frame = vec![0xF0, 0x41, 0x10, 0x28, 0x12];
        frame.extend_from_slice(&address);
        frame.extend_from_slice(payload);
        frame.push(checksum(&address, payload));
        frame.push(0xF7);
        SysexParser::default().parse(&frame).unwrap()
    }

    #[test]
    fn test_single_value() {
        let router = ReplyRouter::new();
        let events = router.route(&dt1([0x01, 0x02, 0x13], &[0x50]));
        assert_eq!(events, vec![PanelEvent::MasterVolume(80)]);
    }

    #[test]
    fn test_metronome_status() {
        let router = ReplyRouter::new();
        assert_eq!(
            router.route(&dt1([0x01, 0x01, 0x0F], &[0x01])),
            vec![PanelEvent::Metronome(true)]
        );
    }

    #[test]
    fn test_keyboard_block_fans_out() {
        let mut payload = vec![0u8; 16];
        payload[0] = 0x02;
        payload[7..10].copy_from_slice(&[0x00, 0x00, 0x03]);
        payload[10..13].copy_from_slice(&[0x01, 0x00, 0x01]);
        payload[13..16].copy_from_slice(&[0x02, 0x00, 0x04]);

        let events = ReplyRouter::new().route(&dt1([0x01, 0x02, 0x00], &payload));

        assert_eq!(events[0], PanelEvent::KeyboardMode(KeyboardMode::Dual));
        assert!(events.contains(&PanelEvent::Tone {
            slot: ToneSlot::Single,
            code: ToneCode([0x00, 0x00, 0x03]),
        }));
        assert!(events.contains(&PanelEvent::Tone {
            slot: ToneSlot::Split,
            code: ToneCode([0x01, 0x00, 0x01]),
        }));
        assert!(events.contains(&PanelEvent::Tone {
            slot: ToneSlot::Dual,
            code: ToneCode([0x02, 0x00, 0x04]),
        }));
        assert!(events.contains(&PanelEvent::SplitPoint(0)));
    }

    #[test]
    fn test_ignored_replies() {
        let router = ReplyRouter::new();
        // Unmapped gap
        assert!(router.route(&dt1([0x01, 0x03, 0x04], &[0x01])).is_empty());
        // Short tone payload
        assert!(router.route(&dt1([0x01, 0x02, 0x07], &[0x00])).is_empty());
        // Entry without a handler
        assert!(router.route(&dt1([0x01, 0x02, 0x14], &[0x05])).is_empty());
    }

    #[test]
    fn test_custom_registration() {
        let mut router = ReplyRouter::empty();
        assert!(!router.handles("masterVolume"));
        router.register("masterVolume", |_| Some(PanelEvent::Metronome(false)));
        assert_eq!(
            router.route(&dt1([0x01, 0x02, 0x13], &[0x10])),
            vec![PanelEvent::Metronome(false)]
        );
    }
}
