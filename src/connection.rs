//! MIDI port handling for the piano
//!
//! Opens the input/output pair by case-insensitive substring match, feeds
//! inbound messages into a channel and watches for the device going away.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MidiConfig;
use crate::midi::format_hex;
use crate::pacer::{Transport, TransportError};

const CLIENT_NAME: &str = "Roland-Piano-Ctl";

/// Raw message received from the piano
#[derive(Debug, Clone)]
pub struct InboundFrame {
    pub timestamp: DateTime<Local>,
    pub data: Vec<u8>,
}

/// Ports in use for the current connection
///
/// A new context (with a bumped generation) replaces the old one on every
/// reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionContext {
    pub input_name: String,
    pub output_name: String,
    pub generation: u64,
    pub connected: bool,
}

/// Open input connection plus its context
///
/// Dropping it closes the input port.
pub struct PianoConnection {
    pub context: ConnectionContext,
    _input_conn: MidiInputConnection<()>,
}

impl PianoConnection {
    pub fn close(mut self) -> ConnectionContext {
        self.context.connected = false;
        info!("Closed ports (generation {})", self.context.generation);
        self.context
    }
}

/// Output transport backed by a midir connection
pub struct MidirTransport {
    name: String,
    conn: MidiOutputConnection,
}

impl Transport for MidirTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.conn
            .send(bytes)
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

/// Index of the first name containing `pattern`, ignoring case
pub fn match_port(names: &[String], pattern: &str) -> Option<usize> {
    let pattern = pattern.to_lowercase();
    names
        .iter()
        .position(|name| name.to_lowercase().contains(&pattern))
}

fn input_names(midi_in: &MidiInput) -> Vec<String> {
    midi_in
        .ports()
        .iter()
        .filter_map(|port| midi_in.port_name(port).ok())
        .collect()
}

fn output_names(midi_out: &MidiOutput) -> Vec<String> {
    midi_out
        .ports()
        .iter()
        .filter_map(|port| midi_out.port_name(port).ok())
        .collect()
}

/// Names of all available (input, output) ports
pub fn list_ports() -> Result<(Vec<String>, Vec<String>)> {
    let midi_in = MidiInput::new(&format!("{}-Scanner", CLIENT_NAME))
        .context("Failed to create MIDI input")?;
    let midi_out = MidiOutput::new(&format!("{}-Scanner", CLIENT_NAME))
        .context("Failed to create MIDI output")?;
    Ok((input_names(&midi_in), output_names(&midi_out)))
}

/// Whether both configured ports are currently present
pub fn ports_present(config: &MidiConfig) -> Result<bool> {
    let (inputs, outputs) = list_ports()?;
    Ok(match_port(&inputs, &config.input_port).is_some()
        && match_port(&outputs, &config.output_port).is_some())
}

/// Open both ports
///
/// Every inbound message is forwarded to `inbound_tx`; when the channel is
/// full the message is dropped.
pub fn open(
    config: &MidiConfig,
    generation: u64,
    inbound_tx: mpsc::Sender<InboundFrame>,
) -> Result<(PianoConnection, MidirTransport)> {
    info!(
        "Connecting - Input: '{}', Output: '{}'",
        config.input_port, config.output_port
    );

    let mut midi_in = MidiInput::new(&format!("{}-Input", CLIENT_NAME))
        .context("Failed to create MIDI input")?;
    // Sysex replies are the whole point
    midi_in.ignore(Ignore::None);

    let in_ports = midi_in.ports();
    let in_names = input_names(&midi_in);
    debug!("Found {} MIDI input ports", in_names.len());
    let in_index = match_port(&in_names, &config.input_port)
        .ok_or_else(|| anyhow::anyhow!("Input port '{}' not found", config.input_port))?;
    let in_port = in_ports
        .get(in_index)
        .ok_or_else(|| anyhow::anyhow!("Input port list changed while connecting"))?;
    let input_name = in_names[in_index].clone();

    let input_conn = midi_in
        .connect(
            in_port,
            CLIENT_NAME,
            move |_stamp, data, _| {
                let frame = InboundFrame {
                    timestamp: Local::now(),
                    data: data.to_vec(),
                };
                if inbound_tx.try_send(frame).is_err() {
                    debug!("Inbound channel full, dropped {}", format_hex(data));
                }
            },
            (),
        )
        .map_err(|e| anyhow::anyhow!("Failed to connect to input port: {}", e))?;

    let midi_out = MidiOutput::new(&format!("{}-Output", CLIENT_NAME))
        .context("Failed to create MIDI output")?;
    let out_ports = midi_out.ports();
    let out_names = output_names(&midi_out);
    debug!("Found {} MIDI output ports", out_names.len());
    let out_index = match_port(&out_names, &config.output_port)
        .ok_or_else(|| anyhow::anyhow!("Output port '{}' not found", config.output_port))?;
    let out_port = out_ports
        .get(out_index)
        .ok_or_else(|| anyhow::anyhow!("Output port list changed while connecting"))?;
    let output_name = out_names[out_index].clone();

    let output_conn = midi_out
        .connect(out_port, CLIENT_NAME)
        .map_err(|e| anyhow::anyhow!("Failed to connect to output port: {}", e))?;

    info!(
        "Connected to '{}' / '{}' (generation {})",
        input_name, output_name, generation
    );

    let connection = PianoConnection {
        context: ConnectionContext {
            input_name,
            output_name: output_name.clone(),
            generation,
            connected: true,
        },
        _input_conn: input_conn,
    };
    let transport = MidirTransport {
        name: output_name,
        conn: output_conn,
    };
    Ok((connection, transport))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortEvent {
    Connected,
    Disconnected,
}

/// Edge detector over polled port presence
///
/// While the ports are present but no connection is open, every poll
/// reports `Connected` again so a failed open is retried.
#[derive(Debug, Clone, Copy)]
pub struct PortPresence {
    present: bool,
}

impl PortPresence {
    pub fn new(present: bool) -> Self {
        Self { present }
    }

    pub fn update(&mut self, present: bool, connected: bool) -> Option<PortEvent> {
        let was_present = std::mem::replace(&mut self.present, present);
        match (was_present, present) {
            (true, false) => Some(PortEvent::Disconnected),
            (false, true) => Some(PortEvent::Connected),
            (true, true) if !connected => Some(PortEvent::Connected),
            _ => None,
        }
    }
}

/// Poll port presence and report transitions
///
/// `connected` mirrors whether the caller holds an open connection. The
/// task ends when the receiver is dropped.
pub fn spawn_port_watcher(
    config: MidiConfig,
    connected: watch::Receiver<bool>,
    event_tx: mpsc::Sender<PortEvent>,
) -> JoinHandle<()> {
    let poll = Duration::from_millis(config.port_poll_ms);

    tokio::spawn(async move {
        let mut presence = PortPresence::new(*connected.borrow());
        let mut ticker = tokio::time::interval(poll);
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let scan = config.clone();
            let present = match tokio::task::spawn_blocking(move || ports_present(&scan)).await {
                Ok(Ok(present)) => present,
                Ok(Err(e)) => {
                    warn!("Port scan failed: {}", e);
                    continue;
                }
                Err(e) => {
                    warn!("Port scan task failed: {}", e);
                    continue;
                }
            };

            let linked = *connected.borrow();
            if let Some(event) = presence.update(present, linked) {
                info!("Piano ports {:?}", event);
                if event_tx.send(event).await.is_err() {
                    break;
                }
            }
        }
        debug!("Port watcher stopped");
    })
}
