//! # PM1 Chassis CLI
//!
//! A line-oriented demonstrator for the PM1 chassis SDK: connects to a chassis, unlocks it,
//! then reads single-letter drive commands from stdin until `q`/EOF.
//!
//! # Usage
//!
//! ```bash
//! # Autodiscover a port
//! pm1_cli
//!
//! # Use a specific device, verbose logging
//! pm1_cli --port /dev/ttyUSB0 -v
//! ```

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use pm1_common::config::SessionConfig;
use pm1_common::types::ChassisLockState;

/// PM1 chassis CLI - connect, unlock, and drive from the keyboard
#[derive(Parser, Debug)]
#[command(name = "pm1_cli")]
#[command(author = "autolaborcenter")]
#[command(version)]
#[command(about = "Command-line demonstrator for the PM1 chassis SDK")]
#[command(long_about = None)]
struct Args {
    /// Serial device to connect to. Autodiscovers one if omitted.
    #[arg(short, long)]
    port: Option<String>,

    /// Path to a TOML `SessionConfig` (chassis geometry + optimizer limits). Uses the
    /// reference chassis defaults if omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Linear speed used by the w/s drive commands (m/s).
    #[arg(long, default_value_t = 0.2)]
    speed: f64,

    /// Angular speed used by the a/d drive commands (rad/s).
    #[arg(long, default_value_t = 0.4)]
    turn_speed: f64,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    if let Err(e) = run(&args) {
        error!("pm1_cli failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), pm1_common::error::PmError> {
    info!("pm1_cli v{} starting...", env!("CARGO_PKG_VERSION"));

    let session_config = match &args.config {
        Some(path) => SessionConfig::load(path)
            .map_err(|e| pm1_common::error::PmError::Other(e.to_string()))?,
        None => SessionConfig::default(),
    };

    let port = pm1_control::api::initialize_with_config(args.port.as_deref(), session_config)?;
    info!(%port, "connected");

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        if let Err(e) = ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::SeqCst);
        }) {
            warn!(error = %e, "failed to install Ctrl-C handler; cancel_all/shutdown on interrupt will not work");
        }
    }

    pm1_control::api::unlock()?;
    while pm1_control::api::check_state()? != ChassisLockState::Unlocked {
        pm1_control::api::delay(0.1);
    }

    print_instructions();
    let stdin = io::stdin();
    let mut out = io::stdout();
    for line in stdin.lock().lines() {
        if interrupted.load(Ordering::SeqCst) {
            break;
        }
        let Ok(line) = line else { break };
        let command = line.trim();
        if command.eq_ignore_ascii_case("q") || command.eq_ignore_ascii_case("quit") {
            break;
        }

        let (v, w) = match command {
            "w" => (args.speed, 0.0),
            "s" => (-args.speed, 0.0),
            "a" => (0.0, args.turn_speed),
            "d" => (0.0, -args.turn_speed),
            "wa" | "aw" => (args.speed, args.turn_speed),
            "wd" | "dw" => (args.speed, -args.turn_speed),
            "sa" | "as" => (-args.speed, -args.turn_speed),
            "sd" | "ds" => (-args.speed, args.turn_speed),
            "" => (0.0, 0.0),
            other => {
                let _ = writeln!(out, "unrecognised command: {other:?} (w/a/s/d, q to quit)");
                continue;
            }
        };
        pm1_control::api::drive(v, w)?;

        let pose = pm1_control::api::get_odometry();
        let _ = writeln!(out, "pose: x={:.3} y={:.3} theta={:.3}", pose.x, pose.y, pose.theta);
    }

    pm1_control::api::cancel_all()?;
    pm1_control::api::drive(0.0, 0.0)?;
    pm1_control::api::shutdown()?;
    info!("pm1_cli shutdown complete");
    Ok(())
}

fn print_instructions() {
    println!("connected. unlocked and ready.");
    println!("commands: w forward, s back, a turn left, d turn right, combinations like wa/wd, q to quit");
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
