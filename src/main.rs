//! Roland Piano Control
//!
//! Terminal controller for Roland digital pianos over MIDI sysex.

use anyhow::Result;
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roland_piano_ctl::app::Controller;
use roland_piano_ctl::cli::{self, ConsoleCommand};
use roland_piano_ctl::config::AppConfig;
use roland_piano_ctl::connection::{self, PianoConnection, PortEvent};
use roland_piano_ctl::monitor;
use roland_piano_ctl::pacer::PacerHandle;

/// Roland Piano Control - drive a Roland digital piano from the terminal
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Only print inbound traffic, no console
    #[arg(long)]
    monitor: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Starting Roland Piano Control...");
    info!("Configuration file: {}", args.config);

    if args.list_ports {
        monitor::list_ports_formatted()?;
        return Ok(());
    }

    let config = AppConfig::load_or_default(&args.config).await?;
    info!("Configuration loaded");

    run_app(config, args.monitor, shutdown_signal()).await?;

    info!("Roland Piano Control shutdown complete");
    Ok(())
}

/// Open the ports and queue the initialization sequence
fn connect(
    config: &AppConfig,
    generation: u64,
    inbound_tx: &mpsc::Sender<connection::InboundFrame>,
    pacer: &PacerHandle,
    controller: &Controller,
) -> Option<PianoConnection> {
    match connection::open(&config.midi, generation, inbound_tx.clone()) {
        Ok((conn, transport)) => {
            pacer.attach(Box::new(transport));
            if let Err(e) = controller.initialize() {
                warn!("Failed to build initialization sequence: {}", e);
            }
            Some(conn)
        }
        Err(e) => {
            warn!("{:#}", e);
            None
        }
    }
}

async fn run_app(
    config: AppConfig,
    monitor_only: bool,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let (inbound_tx, mut inbound_rx) = mpsc::channel(1000);
    let (port_tx, mut port_rx) = mpsc::channel(16);
    let (console_tx, mut console_rx) = mpsc::channel::<ConsoleCommand>(32);

    let pacer = PacerHandle::spawn(config.pacing.min_spacing(), None);
    let mut controller = Controller::new(&config, pacer.clone());

    let mut generation = 0;
    let mut piano = connect(&config, generation, &inbound_tx, &pacer, &controller);
    if piano.is_none() {
        println!("No Roland digital piano detected, waiting for it to appear...");
    }

    let (link_tx, link_rx) = watch::channel(piano.is_some());
    let _watcher = connection::spawn_port_watcher(config.midi.clone(), link_rx, port_tx);

    let _repl = if monitor_only {
        drop(console_tx);
        None
    } else {
        println!("{}", cli::HELP);
        Some(cli::spawn_repl(console_tx))
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(frame) = inbound_rx.recv() => {
                controller.handle_inbound(&frame);
            }

            Some(command) = console_rx.recv() => {
                if command == ConsoleCommand::Quit {
                    break;
                }
                if piano.is_none() && !matches!(command, ConsoleCommand::State) {
                    warn!("Piano not connected, command dropped");
                    continue;
                }
                if let Err(e) = controller.handle_command(command) {
                    Controller::report(&e);
                }
            }

            Some(event) = port_rx.recv() => match event {
                PortEvent::Disconnected => {
                    pacer.detach();
                    if let Some(conn) = piano.take() {
                        let ctx = conn.close();
                        println!("in: {} | out: {} disconnected", ctx.input_name, ctx.output_name);
                    }
                    link_tx.send_replace(false);
                }
                PortEvent::Connected if piano.is_some() => {}
                PortEvent::Connected => {
                    generation += 1;
                    piano = connect(&config, generation, &inbound_tx, &pacer, &controller);
                    if let Some(conn) = &piano {
                        println!("in: {} | out: {}", conn.context.input_name, conn.context.output_name);
                    }
                    link_tx.send_replace(piano.is_some());
                }
            },

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    info!("Shutting down...");
    pacer.shutdown();
    if let Some(conn) = piano.take() {
        conn.close();
    }

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
