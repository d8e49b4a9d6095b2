use std::io;

use thiserror::Error;

/// Errors surfaced by the board lookup and the sysfs pin driver.
///
/// `ChannelBusy` is the fatal "pin already claimed" case: it is reported and
/// the process exits non-zero, with no retry. Interruption is not an error
/// anywhere in this crate; it is a controlled-shutdown trigger handled by the
/// relay controller.
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not determine the Jetson model from the device tree")]
    UnknownModel,

    #[error("board pin {0} is not a usable GPIO on this board")]
    UnknownChannel(u32),

    #[error("GPIO chip {0} not found under /sys/devices")]
    MissingChip(&'static str),

    #[error("GPIO {name} (board pin {channel}) is already claimed by another process")]
    ChannelBusy { channel: u32, name: String },

    #[error("no write access to the GPIO sysfs interface (is your user in the gpio group?)")]
    NoAccess,

    #[error("GPIO sysfs access failed at {path}")]
    Sysfs {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn sysfs(path: impl Into<String>, source: io::Error) -> Self {
        Error::Sysfs {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
