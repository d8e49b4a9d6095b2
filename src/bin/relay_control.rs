//! Cycle a relay module ON and OFF on a timer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use log::info;

use jetson_relay::{CycleConfig, Polarity, Relay, RelayState, SysfsPin};

#[derive(Debug, Parser)]
#[command(
    name = "relay_control",
    about = "Cycle a relay module connected to a Jetson header pin",
    version
)]
struct Args {
    /// Seconds to keep the relay ON in each cycle.
    #[arg(long, value_name = "SECONDS", default_value_t = 2.0)]
    on_time: f64,

    /// Seconds to keep the relay OFF in each cycle.
    #[arg(long, value_name = "SECONDS", default_value_t = 2.0)]
    off_time: f64,

    /// Number of ON/OFF cycles (0 = run until interrupted).
    #[arg(long, value_name = "N", default_value_t = 0)]
    cycles: u32,

    /// State the relay is driven to while the pin is being set up.
    #[arg(long, value_enum, default_value = "off")]
    initial_state: StateArg,

    /// Board pin (BOARD numbering) the relay input is wired to.
    #[arg(long, value_name = "PIN", default_value_t = 7)]
    pin: u32,

    /// The relay is energized by a HIGH signal (default).
    #[arg(long, conflicts_with = "active_low")]
    active_high: bool,

    /// The relay is energized by a LOW signal.
    #[arg(long)]
    active_low: bool,

    /// Increase log verbosity (-v for debug).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StateArg {
    On,
    Off,
}

impl From<StateArg> for RelayState {
    fn from(state: StateArg) -> Self {
        match state {
            StateArg::On => RelayState::On,
            StateArg::Off => RelayState::Off,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    stderrlog::new()
        .verbosity(2 + args.verbose as usize)
        .init()?;

    anyhow::ensure!(args.on_time >= 0.0, "--on-time must be non-negative");
    anyhow::ensure!(args.off_time >= 0.0, "--off-time must be non-negative");

    let polarity = match (args.active_high, args.active_low) {
        (_, true) => Polarity::ActiveLow,
        _ => Polarity::ActiveHigh,
    };

    let config = CycleConfig {
        on_time: Duration::from_secs_f64(args.on_time),
        off_time: Duration::from_secs_f64(args.off_time),
        cycles: args.cycles,
        initial_state: args.initial_state.into(),
    };

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))
            .context("failed to install the Ctrl-C handler")?;
    }

    info!("relay connected to pin {}", args.pin);
    info!("relay is {}", polarity.describe());
    info!("ON time: {} s, OFF time: {} s", args.on_time, args.off_time);
    match args.cycles {
        0 => info!("cycles: until interrupted (press Ctrl-C to exit)"),
        n => info!("cycles: {}", n),
    }

    let pin = SysfsPin::configure(args.pin, Some(config.initial_level(polarity)))
        .with_context(|| format!("failed to acquire board pin {}", args.pin))?;

    let mut relay = Relay::new(pin, args.pin, polarity, stop);
    relay.cycle(&config)?;

    Ok(())
}
