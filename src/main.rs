//! CLI entry point for morph_drive
//!
//! Operator tool for a serial rig:
//! - `probe`: connect, handshake, reset and print one observation
//! - `step`: drive the servo tripod with a fixed action for a number of steps
//! - `send`: write one raw line and print the acknowledged reply
//!
//! # Usage
//!
//! ```bash
//! morph_drive --port /dev/ttyUSB0 probe
//! morph_drive --config config/rig.toml step --action 0,1,2 --steps 20
//! morph_drive send C2
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use morph_drive::config::RigConfig;
use morph_drive::link::Link;
use morph_drive::logging::{self, OutputFormat, TracingConfig};
use morph_drive::rigs::ServoTripod;
use morph_drive::session::{protocol, DeviceSession};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "morph_drive")]
#[command(about = "Drive a serial actuator/sensor rig as a control loop", long_about = None)]
struct Cli {
    /// Rig configuration file (TOML). Missing files fall back to defaults.
    #[arg(long, default_value = "config/rig.toml")]
    config: PathBuf,

    /// Serial port, overrides the configuration
    #[arg(long)]
    port: Option<String>,

    /// Baud rate, overrides the configuration
    #[arg(long)]
    baud: Option<u32>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
    log_format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect, wait for the ready signal, reset and print the observation
    Probe,

    /// Apply the same tripod action repeatedly, printing each observation
    Step {
        /// One choice per servo in {0,1,2}, e.g. `0,1,2`
        #[arg(long, value_delimiter = ',', required = true)]
        action: Vec<u8>,

        /// Number of steps
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },

    /// Write one raw line and print the reply
    Send {
        /// Line to send; a trailing newline is added
        line: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = RigConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(baud) = cli.baud {
        config.baud_rate = baud;
    }
    config.validate().context("Invalid rig configuration")?;

    logging::init(TracingConfig::from_rig_config(&config)?.with_format(cli.log_format))?;
    info!(port = %config.port, baud_rate = config.baud_rate, "morph_drive starting");

    match cli.command {
        Commands::Probe => probe(config),
        Commands::Step { action, steps } => step(config, &action, steps),
        Commands::Send { line } => send(config, &line),
    }
}

fn tripod_session(config: RigConfig) -> Result<DeviceSession<ServoTripod>> {
    DeviceSession::builder(ServoTripod::new())
        .name("ServoTripod")
        .observation_space(ServoTripod::observation_space())
        .action_space(ServoTripod::action_space())
        .config(config)
        .build()
        .context("Failed to build tripod session")
}

fn probe(config: RigConfig) -> Result<()> {
    let mut session = tripod_session(config)?;
    let (observation, _info) = session.enter()?;
    println!(
        "yaw={:.2} pitch={:.2} roll={:.2} state={}",
        observation.yaw,
        observation.pitch,
        observation.roll,
        session.state()
    );
    session.close();
    Ok(())
}

fn step(config: RigConfig, action: &[u8], steps: u32) -> Result<()> {
    let action: [u8; 3] = match action.try_into() {
        Ok(action) => action,
        Err(_) => bail!("--action needs exactly 3 values, got {}", action.len()),
    };
    if let Some(bad) = action.iter().find(|&&choice| choice > 2) {
        bail!("--action values must be 0, 1 or 2, got {}", bad);
    }

    let session = tripod_session(config)?;
    session.run_scoped(|session| {
        for n in 1..=steps {
            session.apply_action(&action);
            let observation = session.get_observation();
            println!(
                "step {:>4}: angles={:?} yaw={:.2} pitch={:.2} roll={:.2}",
                n,
                session.rig().angles(),
                observation.yaw,
                observation.pitch,
                observation.roll
            );
        }
        Ok(())
    })?;
    Ok(())
}

fn send(config: RigConfig, line: &str) -> Result<()> {
    let mut link = Link::new(config.port_settings()?);
    link.connect(config.connect.retries, config.connect.delay()?)?;
    link.handshake(&config.handshake.ready_signal, config.handshake.timeout()?);

    if !link.write_line(&format!("{}\n", line.trim_end())) {
        bail!("Failed to write to {}", link.port_name());
    }
    match protocol::acknowledged_read_line(&mut link) {
        Some(reply) => println!("{}", reply),
        None => println!("(no reply)"),
    }
    link.close();
    Ok(())
}
