//! MIDI monitor
//!
//! Renders every inbound frame as one log line and lists available ports.

use chrono::{DateTime, Local};
use colored::*;

use crate::connection::{self, match_port, InboundFrame};
use crate::midi::{chan_from_cmd, from_cmd, MidiMessage};
use crate::roland::{CodecError, ParsedReply, SysexParser};

const ROLAND_PATTERN: &str = "Roland";

/// Outcome of decoding one inbound frame
#[derive(Debug, Clone)]
pub enum Decoded {
    Sysex(ParsedReply),
    BadSysex(CodecError),
    Other,
}

impl Decoded {
    pub fn decode(parser: &SysexParser, data: &[u8]) -> Self {
        match data.first() {
            Some(0xF0) => match parser.parse(data) {
                Ok(reply) => Decoded::Sysex(reply),
                Err(e) => Decoded::BadSysex(e),
            },
            _ => Decoded::Other,
        }
    }
}

fn timestamp(at: &DateTime<Local>) -> String {
    at.format("%H:%M:%S%.3f").to_string()
}

/// Plain log line for a frame
///
/// Sysex: `time sysex\t <mode> <addr> - <value> (<hexval>) <err>`.
/// Anything else: `time <type>\t #<chan>:<cmd> <data...>`.
pub fn format_line(frame: &InboundFrame, decoded: &Decoded) -> String {
    let time = timestamp(&frame.timestamp);
    match decoded {
        Decoded::Sysex(reply) => {
            let err = reply.err.as_ref().map(|e| e.to_string()).unwrap_or_default();
            format!(
                "{} sysex\t {} {} - {} ({}) {}",
                time,
                reply.mode,
                reply.addr.unwrap_or("-"),
                reply.value,
                reply.hexval,
                err
            )
            .trim_end()
            .to_string()
        }
        Decoded::BadSysex(e) => format!("{} sysex\t {}", time, e),
        Decoded::Other => {
            let Some((&status, rest)) = frame.data.split_first() else {
                return format!("{} empty", time);
            };
            let kind = MidiMessage::parse(&frame.data)
                .map(|m| m.kind())
                .unwrap_or("midimessage");
            let data = rest
                .iter()
                .map(|b| b.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            format!(
                "{} {}\t #{}:{} {}",
                time,
                kind,
                chan_from_cmd(status),
                from_cmd(status),
                data
            )
            .trim_end()
            .to_string()
        }
    }
}

/// Colored variant of [`format_line`] for the terminal
pub fn print_line(frame: &InboundFrame, decoded: &Decoded) {
    let line = format_line(frame, decoded);
    let colored = match decoded {
        Decoded::Sysex(reply) if reply.err.is_some() => line.bright_yellow(),
        Decoded::Sysex(_) => line.bright_magenta(),
        Decoded::BadSysex(_) => line.bright_red(),
        Decoded::Other => line.normal(),
    };
    println!("{}", colored);
}

fn is_virtual(name: &str) -> bool {
    name.contains("Virtual") || name.contains("loopMIDI") || name.contains("IAC") || name.contains("Through")
}

fn print_port_group(title: &str, names: &[String]) {
    println!("\n{}", title.bold());
    if names.is_empty() {
        println!("  {}", "No ports found".dimmed());
        return;
    }
    for (i, name) in names.iter().enumerate() {
        let marker = if is_virtual(name) {
            "[VIRTUAL]".yellow()
        } else {
            "[PHYSICAL]".green()
        };
        println!("  {}: {} {}", i, marker, name);
    }
}

/// List all ports in a formatted way
pub fn list_ports_formatted() -> anyhow::Result<()> {
    let (inputs, outputs) = connection::list_ports()?;

    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());
    print_port_group("Input Ports:", &inputs);
    print_port_group("Output Ports:", &outputs);

    if let (Some(i), Some(o)) = (
        match_port(&inputs, ROLAND_PATTERN),
        match_port(&outputs, ROLAND_PATTERN),
    ) {
        println!("\n{}", "Detected Roland piano:".bold().bright_green());
        println!("  Input:  {}", inputs[i].bright_white());
        println!("  Output: {}", outputs[o].bright_white());
    }

    println!();
    Ok(())
}
