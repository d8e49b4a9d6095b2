//! Relay control for the 40-pin header on NVIDIA Jetson devices.
//!
//! The crate ships two binaries, `relay_switch` (one-shot) and
//! `relay_control` (timed cycling), both built on the [`relay::Relay`]
//! controller and the sysfs output driver in [`gpio`].

pub mod board;
pub mod error;
pub mod gpio;
pub mod relay;

pub use error::{Error, Result};
pub use gpio::{Level, OutputPin, SysfsPin};
pub use relay::{CycleConfig, Polarity, Relay, RelayState};
