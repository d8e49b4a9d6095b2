//! Sysfs GPIO output driver.
//!
//! Implements the three-operation pin capability the relay controller is
//! written against: configure a board pin as an output, write a level,
//! release the pin. Only output mode exists here; the relay tools never read.

use std::{fs, path::Path, thread, time::Duration};

use log::{debug, warn};

use crate::board::{self, ChannelInfo};
use crate::error::{Error, Result};

static SYSFS_ROOT: &str = "/sys/class/gpio";

/// Physical level driven onto a GPIO pin.
///
/// * `Low` - 0
/// * `High` - 1
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Low => "LOW",
            Level::High => "HIGH",
        }
    }

    fn sysfs_value(self) -> &'static str {
        match self {
            Level::Low => "0",
            Level::High => "1",
        }
    }
}

/// Capability interface for a pin configured as a digital output.
///
/// The relay controller is generic over this trait so its behavior can be
/// verified with a recording fake instead of board hardware.
pub trait OutputPin {
    /// Drives the pin to the given level.
    fn write(&mut self, level: Level) -> Result<()>;

    /// Returns the pin to the system. Must be safe to call more than once.
    fn release(&mut self) -> Result<()>;
}

fn write_sysfs(path: &str, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|e| Error::sysfs(path, e))
}

fn check_write_access() -> Result<()> {
    for file in ["export", "unexport"] {
        let path = format!("{}/{}", SYSFS_ROOT, file);
        let metadata = fs::metadata(&path).map_err(|e| Error::sysfs(&path, e))?;
        if metadata.permissions().readonly() {
            return Err(Error::NoAccess);
        }
    }
    Ok(())
}

fn export(info: &ChannelInfo) -> Result<()> {
    let gpio_dir = format!("{}/{}", SYSFS_ROOT, info.name);
    if Path::new(&gpio_dir).exists() {
        // exported by someone else; the external holder keeps the pin
        return Err(Error::ChannelBusy {
            channel: info.channel,
            name: info.name.clone(),
        });
    }

    let export_path = format!("{}/export", SYSFS_ROOT);
    if let Err(e) = fs::write(&export_path, info.global_gpio.to_string()) {
        return Err(match e.raw_os_error() {
            Some(code) if code == libc::EBUSY => Error::ChannelBusy {
                channel: info.channel,
                name: info.name.clone(),
            },
            _ => Error::sysfs(&export_path, e),
        });
    }

    // the kernel creates the per-line directory asynchronously
    let value_path = format!("{}/value", gpio_dir);
    for _ in 0..100 {
        if Path::new(&value_path).exists() {
            return Ok(());
        }
        thread::sleep(Duration::from_millis(10));
    }

    Err(Error::sysfs(
        &value_path,
        std::io::Error::new(std::io::ErrorKind::TimedOut, "value file never appeared"),
    ))
}

/// A single exported GPIO line driven through `/sys/class/gpio`.
///
/// The line is unexported by [`OutputPin::release`]; dropping an unreleased
/// pin unexports it on a best-effort basis so an early error return cannot
/// leak the line.
pub struct SysfsPin {
    info: ChannelInfo,
    released: bool,
}

impl SysfsPin {
    /// Exports a board pin, configures it as an output, and optionally
    /// drives it to an initial level.
    ///
    /// Fails with [`Error::ChannelBusy`] when another process already holds
    /// the line, and with [`Error::UnknownChannel`] when the pin number is
    /// not a GPIO on the detected board.
    pub fn configure(channel: u32, initial: Option<Level>) -> Result<Self> {
        check_write_access()?;

        let model = board::detect_model()?;
        let info = board::channel_info(model, channel)?;
        debug!(
            "board pin {} is {} (gpio {}) on {}",
            channel,
            info.name,
            info.global_gpio,
            model.name()
        );

        export(&info)?;
        let mut pin = SysfsPin {
            info,
            released: false,
        };

        let setup = pin.set_direction("out").and_then(|_| match initial {
            Some(level) => pin.write(level),
            None => Ok(()),
        });
        if let Err(e) = setup {
            let _ = pin.release();
            return Err(e);
        }

        Ok(pin)
    }

    /// Exported name of the line, e.g. `PQ.06` or `gpio454`.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    fn set_direction(&mut self, direction: &str) -> Result<()> {
        let path = format!("{}/{}/direction", SYSFS_ROOT, self.info.name);
        write_sysfs(&path, direction)
    }
}

impl OutputPin for SysfsPin {
    fn write(&mut self, level: Level) -> Result<()> {
        let path = format!("{}/{}/value", SYSFS_ROOT, self.info.name);
        write_sysfs(&path, level.sysfs_value())
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let gpio_dir = format!("{}/{}", SYSFS_ROOT, self.info.name);
        if Path::new(&gpio_dir).exists() {
            let unexport_path = format!("{}/unexport", SYSFS_ROOT);
            write_sysfs(&unexport_path, &self.info.global_gpio.to_string())?;
        }
        Ok(())
    }
}

impl Drop for SysfsPin {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.release() {
                warn!("failed to release {}: {}", self.info.name, e);
            }
        }
    }
}
