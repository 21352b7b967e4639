//! Host ground station against a simulated radio.
//!
//! Runs the full receive/transmit core on a workstation:
//! `cargo run --bin host-station [config.json]`
//!
//! Frames are injected from the console (`rx <hex>`, `crc <hex>`), remote
//! commands are typed as `<kind> <payload>`, and every delivered frame is
//! printed as JSON. Type `help` for the command list.
//!
//! ## Endpoints
//!
//! - Status: http://localhost:8080/status

use gs_radio_core::config::default_config_path;
use gs_radio_core::console::{ConsoleCommand, HELP_TEXT};
use gs_radio_core::status::DEFAULT_STATUS_PORT;
use gs_radio_core::{
    hex, DecodedFrame, LinkMetrics, PollOutcome, ReceiveController, SimulatedRadio, StationConfig,
    StationStats, StatusServer, SystemClock,
};
use log::{debug, error, info, warn};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How often the receive loop checks the interrupt flag.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

type Controller =
    ReceiveController<SimulatedRadio, mpsc::UnboundedSender<DecodedFrame>, SystemClock>;

fn platform_init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Print a line to stdout for the operator.
fn print_console(msg: &str) {
    println!("{}", msg);
    let _ = std::io::stdout().flush();
}

fn print_prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn load_config() -> StationConfig {
    let result = match std::env::args().nth(1) {
        Some(path) => StationConfig::load_from(&PathBuf::from(path)),
        None => StationConfig::load_or_default(),
    };
    match result {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load station config: {}, using defaults", e);
            StationConfig::default()
        }
    }
}

/// Metrics for the `n`th injected frame.
///
/// Consecutive frames never share metrics, so injected frames are not
/// mistaken for a noisy-line retrigger.
fn injected_metrics(n: u32) -> LinkMetrics {
    let step = (n % 40) as f32;
    LinkMetrics::new(-118.0 + step * 0.5, -6.0 + step * 0.25, 120.0 + n as f32)
}

fn handle_command(controller: &mut Controller, cmd: ConsoleCommand, injected: &mut u32) {
    match cmd {
        ConsoleCommand::Receive { data, status } => {
            *injected = injected.wrapping_add(1);
            let metrics = injected_metrics(*injected);
            debug!("Injecting {} bytes ({:?})", data.len(), status);
            controller.radio_mut().inject(data, status, metrics);
        }
        ConsoleCommand::Interrupt => controller.radio().fire_interrupt(),
        ConsoleCommand::Remote { kind, payload } => {
            match controller.handle_remote(&kind, payload.as_bytes()) {
                Ok(reply) => print_console(&format!("OK {:?}", reply)),
                Err(e) => print_console(&format!("ERR {} ({})", e, e.code())),
            }
        }
        ConsoleCommand::Status => print_console(&controller.stats().to_json()),
        ConsoleCommand::Help => print_console(HELP_TEXT),
        ConsoleCommand::Unknown(msg) => {
            if !msg.is_empty() {
                print_console(&msg);
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    platform_init();

    info!("=== Ground station (host) ===");
    if let Ok(path) = default_config_path() {
        debug!("Default config path: {:?}", path);
    }

    let config = load_config();
    let stats = Arc::new(StationStats::new());

    let _status_server = match StatusServer::start(None, DEFAULT_STATUS_PORT, stats.clone()) {
        Ok(server) => {
            info!("Status at http://localhost:{}/status", DEFAULT_STATUS_PORT);
            Some(server)
        }
        Err(e) => {
            warn!("Failed to start status server: {}", e);
            None
        }
    };

    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<DecodedFrame>();
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<ConsoleCommand>();

    let radio = SimulatedRadio::new(config.board.family());
    let mut controller =
        ReceiveController::new(radio, frame_tx, SystemClock, &config).with_stats(stats.clone());

    if let Err(e) = controller.begin() {
        error!("Radio initialization failed: {}", e);
    }
    info!(
        "Listening for {} on {:.4} MHz ({})",
        controller.session().satellite,
        controller.session().tuned_frequency(),
        controller.session().mode
    );

    let cancel = CancellationToken::new();

    // Receive loop: owns the controller. Runs on a blocking thread because
    // acks and NACKs sleep between their two copies.
    let radio_cancel = cancel.clone();
    let radio_task = tokio::task::spawn_blocking(move || {
        let mut injected = 0u32;
        while !radio_cancel.is_cancelled() {
            while let Ok(cmd) = cmd_rx.try_recv() {
                handle_command(&mut controller, cmd, &mut injected);
                print_prompt();
            }
            match controller.poll() {
                PollOutcome::NoFrame => std::thread::sleep(POLL_INTERVAL),
                PollOutcome::Delivered => {}
                PollOutcome::Error(e) => debug!("RX: {}", e),
            }
        }
    });

    // Delivered frames
    let output_cancel = cancel.clone();
    let output_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = output_cancel.cancelled() => break,
                frame = frame_rx.recv() => {
                    let Some(frame) = frame else { break };
                    info!("RX [{}]", hex(&frame.payload));
                    match serde_json::to_string(&frame) {
                        Ok(json) => print_console(&json),
                        Err(e) => warn!("Failed to serialize frame: {}", e),
                    }
                }
            }
        }
    });

    print_console("Type 'help' for commands");
    print_prompt();

    let stdin_cancel = cancel.clone();
    let stdin_task = tokio::task::spawn_blocking(move || {
        let stdin = std::io::stdin();
        let mut lines = stdin.lock().lines();

        while !stdin_cancel.is_cancelled() {
            match lines.next() {
                Some(Ok(line)) => {
                    if cmd_tx.send(ConsoleCommand::parse(&line)).is_err() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!("stdin: {}", e);
                    break;
                }
                None => break,
            }
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            print_console("\nShutting down...");
        }
        result = radio_task => {
            if let Err(e) = result {
                error!("Radio task error: {}", e);
            }
        }
        result = stdin_task => {
            if let Err(e) = result {
                error!("Stdin task error: {}", e);
            }
        }
    }
    cancel.cancel();
    let _ = output_task.await;

    info!("Shutdown complete");
}
