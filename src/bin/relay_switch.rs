//! Simple relay switch control: set the relay ON or OFF once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};

use jetson_relay::{Polarity, Relay, RelayState, SysfsPin};

#[derive(Debug, Parser)]
#[command(
    name = "relay_switch",
    about = "Set a relay connected to a Jetson header pin to ON or OFF",
    version
)]
struct Args {
    /// Set relay to ON or OFF.
    #[arg(value_enum)]
    state: StateArg,

    /// Board pin (BOARD numbering) the relay input is wired to.
    #[arg(long, value_name = "PIN", default_value_t = 7)]
    pin: u32,

    /// The relay is energized by a HIGH signal (default).
    #[arg(long, conflicts_with = "active_low")]
    active_high: bool,

    /// The relay is energized by a LOW signal.
    #[arg(long)]
    active_low: bool,

    /// Seconds to hold the state before exiting (0 = hold until interrupted).
    #[arg(long, value_name = "SECONDS", default_value_t = 0.0)]
    hold_time: f64,

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

    anyhow::ensure!(args.hold_time >= 0.0, "--hold-time must be non-negative");

    // --active-high is the default; the flags conflict, so matching on
    // --active-low alone is enough
    let polarity = match (args.active_high, args.active_low) {
        (_, true) => Polarity::ActiveLow,
        _ => Polarity::ActiveHigh,
    };

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))
            .context("failed to install the Ctrl-C handler")?;
    }

    let pin = SysfsPin::configure(args.pin, None)
        .with_context(|| format!("failed to acquire board pin {}", args.pin))?;

    let mut relay = Relay::new(pin, args.pin, polarity, stop);
    relay.hold(args.state.into(), Duration::from_secs_f64(args.hold_time))?;

    Ok(())
}
