//! Controller glue
//!
//! Turns console commands into paced frames and folds inbound replies into
//! the panel state.

use std::time::Duration;

use colored::*;
use tracing::{debug, info, warn};

use crate::cli::{Adjust, ConsoleCommand, SetValue};
use crate::config::{AppConfig, PreviewConfig};
use crate::connection::InboundFrame;
use crate::midi::tone_preview;
use crate::monitor::{self, Decoded};
use crate::pacer::{PacerHandle, QueueEntry};
use crate::panel::{from_pitch, PanelEvent, PanelState, ReplyRouter};
use crate::roland::{tones, CodecError, OutgoingMessage, PianoCommands, SysexBuilder, SysexParser};

/// Gap between the preview note on and its note off
pub const PREVIEW_NOTE_LENGTH: Duration = Duration::from_millis(500);

pub struct Controller {
    commands: PianoCommands,
    parser: SysexParser,
    router: ReplyRouter,
    state: PanelState,
    preview: PreviewConfig,
    pacer: PacerHandle,
    /// Print every inbound frame
    echo: bool,
}

impl Controller {
    pub fn new(config: &AppConfig, pacer: PacerHandle) -> Self {
        Self {
            commands: PianoCommands::new(SysexBuilder::new(config.device.clone())),
            parser: SysexParser::new(config.device.clone()),
            router: ReplyRouter::new(),
            state: PanelState::new(),
            preview: config.preview.clone(),
            pacer,
            echo: true,
        }
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    /// Queue the connect-time sequence
    pub fn initialize(&self) -> Result<(), CodecError> {
        let sequence = self.commands.connect_sequence()?;
        info!("Sending initialization sequence ({} messages)", sequence.len());
        self.submit(sequence);
        Ok(())
    }

    fn submit(&self, messages: Vec<OutgoingMessage>) {
        self.pacer
            .submit(messages.into_iter().map(QueueEntry::from).collect());
    }

    /// Decode, log and route one inbound frame
    pub fn handle_inbound(&mut self, frame: &InboundFrame) -> Vec<PanelEvent> {
        let decoded = Decoded::decode(&self.parser, &frame.data);
        if self.echo {
            monitor::print_line(frame, &decoded);
        }

        let Decoded::Sysex(reply) = decoded else {
            return Vec::new();
        };

        let events = self.router.route(&reply);
        for event in &events {
            debug!("Panel: {}", event);
            self.state.apply(event);
        }
        events
    }

    pub fn handle_command(&mut self, command: ConsoleCommand) -> Result<(), CodecError> {
        let cmds = &self.commands;

        match command {
            ConsoleCommand::Mode(mode) => {
                self.state.keyboard_mode = Some(mode);
                self.submit(vec![cmds.set_keyboard_mode(mode)?, cmds.check_keyboard_mode()?]);
            }
            ConsoleCommand::Tone { slot, code } => {
                let set = cmds.set_tone(slot, code)?;
                self.state.apply(&PanelEvent::Tone { slot, code });

                let mut batch = vec![QueueEntry::from(set)];
                if self.preview.enabled {
                    if let Some(tone) = tones::find_by_code(code) {
                        let [msb, lsb, program, note_on, note_off] = tone_preview(tone, self.preview.channel);
                        batch.push(QueueEntry::new(msb.encode()));
                        batch.push(QueueEntry::new(lsb.encode()));
                        batch.push(QueueEntry::new(program.encode()));
                        batch.push(QueueEntry::with_delay(note_on.encode(), PREVIEW_NOTE_LENGTH));
                        batch.push(QueueEntry::new(note_off.encode()));
                    }
                }
                self.pacer.submit(batch);
            }
            ConsoleCommand::Volume(adjust) => {
                let volume = match adjust {
                    Adjust::Set(v) => self.state.set_master_volume(v),
                    Adjust::Up => self.state.master_volume_up(),
                    Adjust::Down => self.state.master_volume_down(),
                };
                self.submit(vec![cmds.set_master_volume(volume)?]);
            }
            ConsoleCommand::MetronomeToggle => {
                self.submit(vec![
                    cmds.toggle_metronome()?,
                    cmds.builder().build_request("metronomeStatus")?,
                ]);
            }
            ConsoleCommand::MetronomeVolume(adjust) => {
                let volume = match adjust {
                    Adjust::Set(v) => self.state.set_metronome_volume(v),
                    Adjust::Up => self.state.metronome_volume_up(),
                    Adjust::Down => self.state.metronome_volume_down(),
                };
                self.submit(vec![cmds.set_metronome_volume(volume)?]);
            }
            ConsoleCommand::Tempo(tempo) => {
                let tempo = self.state.set_tempo(tempo);
                self.submit(vec![cmds.set_metronome_tempo(tempo)?]);
            }
            ConsoleCommand::Tune(pitch) if pitch.is_nan() => {
                warn!("Ignoring tune request without a pitch");
            }
            ConsoleCommand::Tune(pitch) => {
                let value = self.state.set_master_tune(from_pitch(pitch));
                self.submit(vec![cmds.set_master_tune(value)?, cmds.check_master_tune()?]);
            }
            ConsoleCommand::Touch(value) => {
                self.submit(vec![cmds.set_key_touch(value)?, cmds.check_key_touch()?]);
            }
            ConsoleCommand::Ambience(value) => {
                let msg = cmds.set_ambience(value)?;
                self.state.ambience = value;
                self.submit(vec![msg]);
            }
            ConsoleCommand::Brilliance(value) => {
                let msg = cmds.set_brilliance(value)?;
                self.state.brilliance = value;
                self.submit(vec![msg]);
            }
            ConsoleCommand::Split(value) => {
                let msg = cmds.set_split_point(value)?;
                self.state.split_point = value;
                self.submit(vec![msg]);
            }
            ConsoleCommand::Set { name, value } => {
                let msg = match value {
                    SetValue::Number(n) => cmds.builder().build_set(&name, n)?,
                    SetValue::Text(text) => cmds.builder().build_set_text(&name, &text)?,
                };
                self.submit(vec![msg]);
            }
            ConsoleCommand::Get { name, length } => {
                let msg = match length {
                    Some(len) => cmds.builder().build_request_span(&name, len)?,
                    None => cmds.builder().build_request(&name)?,
                };
                self.submit(vec![msg]);
            }
            ConsoleCommand::State => println!("{}", self.state),
            ConsoleCommand::Tones => crate::cli::print_tones(),
            ConsoleCommand::Help => println!("{}", crate::cli::HELP),
            ConsoleCommand::Quit => {}
        }
        Ok(())
    }

    /// Print a rejected command without interrupting the loop
    pub fn report(err: &CodecError) {
        println!("{}", err.to_string().red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::MID_C;
    use crate::pacer::{Transport, TransportError};
    use crate::roland::nibble::checksum;
    use crate::roland::{KeyboardMode, ToneCode, ToneSlot};
    use chrono::Local;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::time::Instant;

    type SendLog = Arc<Mutex<Vec<(Instant, Vec<u8>)>>>;

    struct Recorder(SendLog);

    impl Transport for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
            self.0.lock().push((Instant::now(), bytes.to_vec()));
            Ok(())
        }
    }

    fn controller() -> (Controller, PacerHandle, SendLog) {
        let log = SendLog::default();
        let pacer = PacerHandle::spawn(
            Duration::from_millis(25),
            Some(Box::new(Recorder(log.clone()))),
        );
        let controller = Controller::new(&AppConfig::default(), pacer.clone()).with_echo(false);
        (controller, pacer, log)
    }

    fn inbound(address: [u8; 3], payload: &[u8]) -> InboundFrame {
        let mut data = vec![0xF0, 0x41, 0x10, 0x28, 0x12];
        data.extend_from_slice(&address);
        data.extend_from_slice(payload);
        data.push(checksum(&address, payload));
        data.push(0xF7);
        InboundFrame {
            timestamp: Local::now(),
            data,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_sends_connect_sequence() {
        let (controller, pacer, log) = controller();
        controller.initialize().unwrap();
        pacer.when_idle().await.unwrap();

        let log = log.lock();
        assert_eq!(log.len(), 11);
        // connection = 1 goes first
        assert_eq!(log[0].1[4..9], [0x12, 0x01, 0x03, 0x06, 0x01]);
        assert!(log[1..].iter().all(|(_, bytes)| bytes[4] == 0x11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tone_change_with_preview() {
        let (mut controller, pacer, log) = controller();
        controller
            .handle_command(ConsoleCommand::Tone {
                slot: ToneSlot::Single,
                code: ToneCode([0x02, 0x00, 0x02]),
            })
            .unwrap();
        pacer.when_idle().await.unwrap();

        let log = log.lock();
        assert_eq!(log.len(), 6);
        assert_eq!(log[0].1[0], 0xF0);
        assert_eq!(log[4].1, vec![0x90, MID_C, 64]);
        assert_eq!(log[5].1, vec![0x80, MID_C, 25]);
        assert!(log[5].0 - log[4].0 >= PREVIEW_NOTE_LENGTH);
        assert_eq!(
            controller.state().tone(ToneSlot::Single),
            Some(ToneCode([0x02, 0x00, 0x02]))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_volume_steps_from_reported_value() {
        let (mut controller, pacer, log) = controller();
        controller.handle_inbound(&inbound([0x01, 0x02, 0x13], &[100]));
        assert_eq!(controller.state().master_volume, 100);

        controller.handle_command(ConsoleCommand::Volume(Adjust::Down)).unwrap();
        pacer.when_idle().await.unwrap();

        let log = log.lock();
        // payload byte after the address
        assert_eq!(log[0].1[8], 95);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tune_ratchets_before_sending() {
        let (mut controller, pacer, log) = controller();
        controller.handle_command(ConsoleCommand::Tune(445.0)).unwrap();
        pacer.when_idle().await.unwrap();

        let log = log.lock();
        assert_eq!(log.len(), 2);
        // 257 = 0x02 0x01 in two 7-bit bytes
        assert_eq!(log[0].1[8..10], [0x02, 0x01]);
        assert_eq!(controller.state().master_tune, 257);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_tune_steps_once() {
        let (mut controller, pacer, log) = controller();
        controller.handle_command(ConsoleCommand::Tune(f32::INFINITY)).unwrap();
        assert_eq!(controller.state().master_tune, 257);
        controller.handle_command(ConsoleCommand::Tune(1e30)).unwrap();
        assert_eq!(controller.state().master_tune, 258);
        controller.handle_command(ConsoleCommand::Tune(-1e30)).unwrap();
        assert_eq!(controller.state().master_tune, 257);
        pacer.when_idle().await.unwrap();
        assert_eq!(log.lock().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nan_tune_is_ignored() {
        let (mut controller, pacer, log) = controller();
        controller.handle_command(ConsoleCommand::Tune(f32::NAN)).unwrap();
        pacer.when_idle().await.unwrap();
        assert_eq!(controller.state().master_tune, 256);
        assert!(log.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keyboard_block_updates_state() {
        let (mut controller, _pacer, _log) = controller();
        let mut payload = vec![0u8; 16];
        payload[0] = 0x01;
        payload[10..13].copy_from_slice(&[0x01, 0x00, 0x04]);

        let events = controller.handle_inbound(&inbound([0x01, 0x02, 0x00], &payload));
        assert!(!events.is_empty());
        assert_eq!(controller.state().keyboard_mode, Some(KeyboardMode::Split));
        assert_eq!(
            controller.state().tone(ToneSlot::Split),
            Some(ToneCode([0x01, 0x00, 0x04]))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_command_sends_nothing() {
        let (mut controller, pacer, log) = controller();
        let err = controller
            .handle_command(ConsoleCommand::Set {
                name: "noSuchThing".to_string(),
                value: SetValue::Number(1),
            })
            .unwrap_err();
        assert!(matches!(err, CodecError::UnknownAddress(_)));

        pacer.when_idle().await.unwrap();
        assert!(log.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_sysex_inbound_is_ignored() {
        let (mut controller, _pacer, _log) = controller();
        let frame = InboundFrame {
            timestamp: Local::now(),
            data: vec![0x90, 60, 100],
        };
        assert!(controller.handle_inbound(&frame).is_empty());
    }
}
