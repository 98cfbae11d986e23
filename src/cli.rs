//! Command-line interface and REPL

use anyhow::Result;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::roland::{tones, KeyboardMode, ToneCode, ToneSlot};

pub const HELP: &str = "\
Commands:
  mode <single|split|dual|twin>        set keyboard mode
  tone [single|split|dual] <name|code> select a tone (code = 6 hex digits)
  volume <0-100|up|down>               master volume
  metronome                            toggle the metronome
  metronome volume <0-6|up|down>       metronome volume
  tempo <10-400>                       metronome tempo
  tune <hz>                            master tuning (440 and 442 jump, others step)
  touch <n>                            key touch
  ambience <n>                         ambience depth
  brilliance <n>                       brilliance
  split <n>                            split point (note number)
  set <name> <value>                   write any parameter (number or text)
  get <name> [length]                  read any parameter
  state                                show the panel
  tones                                list the tone catalog
  help                                 this text
  quit                                 exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjust {
    Set(u32),
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    Number(u32),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Mode(KeyboardMode),
    Tone { slot: ToneSlot, code: ToneCode },
    Volume(Adjust),
    MetronomeToggle,
    MetronomeVolume(Adjust),
    Tempo(u32),
    /// Target pitch in Hz
    Tune(f32),
    Touch(u32),
    Ambience(u32),
    Brilliance(u32),
    Split(u32),
    Set { name: String, value: SetValue },
    Get { name: String, length: Option<u32> },
    State,
    Tones,
    Help,
    Quit,
}

/// Decimal or `0x` hex
fn parse_number(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| format!("'{}' is not a number", s))
}

fn parse_adjust(arg: Option<&str>) -> Result<Adjust, String> {
    match arg {
        Some("up") | Some("+") => Ok(Adjust::Up),
        Some("down") | Some("-") => Ok(Adjust::Down),
        Some(n) => parse_number(n).map(Adjust::Set),
        None => Err("expected a value, 'up' or 'down'".to_string()),
    }
}

fn single_number(args: &[&str], what: &str) -> Result<u32, String> {
    match args {
        [n] => parse_number(n),
        _ => Err(format!("usage: {} <n>", what)),
    }
}

/// Parse one console line; `Ok(None)` for a blank line
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match cmd.to_lowercase().as_str() {
        "mode" => match args.as_slice() {
            [mode] => ConsoleCommand::Mode(mode.parse()?),
            _ => return Err("usage: mode <single|split|dual|twin>".to_string()),
        },
        "tone" => {
            let (slot, rest) = match args.split_first() {
                Some((first, rest)) if !rest.is_empty() => match first.parse::<ToneSlot>() {
                    Ok(slot) => (slot, rest),
                    Err(_) => (ToneSlot::Single, args.as_slice()),
                },
                _ => (ToneSlot::Single, args.as_slice()),
            };
            if rest.is_empty() {
                return Err("usage: tone [single|split|dual] <name|code>".to_string());
            }
            let query = rest.join(" ");
            let code = match tones::resolve(&query) {
                Some(tone) => tone.code,
                None => query
                    .parse::<ToneCode>()
                    .map_err(|_| format!("unknown tone '{}'", query))?,
            };
            ConsoleCommand::Tone { slot, code }
        }
        "volume" | "vol" => ConsoleCommand::Volume(parse_adjust(args.first().copied())?),
        "metronome" | "met" => match args.as_slice() {
            [] | ["toggle"] => ConsoleCommand::MetronomeToggle,
            ["volume", rest @ ..] | ["vol", rest @ ..] => {
                ConsoleCommand::MetronomeVolume(parse_adjust(rest.first().copied())?)
            }
            _ => return Err("usage: metronome [volume <n|up|down>]".to_string()),
        },
        "tempo" => ConsoleCommand::Tempo(single_number(&args, "tempo")?),
        "tune" => match args.as_slice() {
            [hz] => match hz.parse::<f32>() {
                Ok(pitch) if !pitch.is_nan() => ConsoleCommand::Tune(pitch),
                _ => return Err(format!("'{}' is not a pitch", hz)),
            },
            _ => return Err("usage: tune <hz>".to_string()),
        },
        "touch" => ConsoleCommand::Touch(single_number(&args, "touch")?),
        "ambience" => ConsoleCommand::Ambience(single_number(&args, "ambience")?),
        "brilliance" => ConsoleCommand::Brilliance(single_number(&args, "brilliance")?),
        "split" => ConsoleCommand::Split(single_number(&args, "split")?),
        "set" => match args.as_slice() {
            [name, value @ ..] if !value.is_empty() => {
                let joined = value.join(" ");
                let value = match parse_number(&joined) {
                    Ok(n) => SetValue::Number(n),
                    Err(_) => SetValue::Text(joined.trim_matches('"').to_string()),
                };
                ConsoleCommand::Set {
                    name: name.to_string(),
                    value,
                }
            }
            _ => return Err("usage: set <name> <value>".to_string()),
        },
        "get" => match args.as_slice() {
            [name] => ConsoleCommand::Get {
                name: name.to_string(),
                length: None,
            },
            [name, len] => ConsoleCommand::Get {
                name: name.to_string(),
                length: Some(parse_number(len)?),
            },
            _ => return Err("usage: get <name> [length]".to_string()),
        },
        "state" | "status" => ConsoleCommand::State,
        "tones" => ConsoleCommand::Tones,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command '{}' (try 'help')", other)),
    };

    Ok(Some(command))
}

/// Print the tone catalog
pub fn print_tones() {
    for group in tones::TONE_GROUPS {
        println!("{}", group.name.bold());
        for tone in group.tones {
            println!("  {}  {}", tone.code.to_string().dimmed(), tone.name);
        }
    }
}

/// Run the line editor on a blocking thread, forwarding parsed commands
///
/// Ends after `quit`, Ctrl+C, Ctrl+D or when the receiver is gone; a
/// `Quit` is always sent last.
pub fn spawn_repl(tx: mpsc::Sender<ConsoleCommand>) -> JoinHandle<Result<()>> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut rl = DefaultEditor::new()?;

        loop {
            match rl.readline("piano> ") {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = rl.add_history_entry(line.as_str());
                    }
                    match parse_command(&line) {
                        Ok(Some(ConsoleCommand::Help)) => println!("{}", HELP),
                        Ok(Some(ConsoleCommand::Tones)) => print_tones(),
                        Ok(Some(ConsoleCommand::Quit)) => break,
                        Ok(Some(cmd)) => {
                            if tx.blocking_send(cmd).is_err() {
                                return Ok(());
                            }
                        }
                        Ok(None) => {}
                        Err(e) => println!("{}", e.red()),
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => {
                    debug!("Readline error: {}", e);
                    break;
                }
            }
        }

        let _ = tx.blocking_send(ConsoleCommand::Quit);
        Ok(())
    })
}
