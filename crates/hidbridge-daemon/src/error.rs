//! Error types for the bridge daemon
//!
//! [`DeviceError`] carries the device-scoped failures the event loop recovers
//! from; everything else travels as `anyhow::Error` to `main`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures tied to one input device
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device node could not be opened
    #[error("failed to open input device {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Exclusive access was refused (another grabber, or insufficient permission)
    #[error("failed to grab '{name}' at {} for exclusive access", path.display())]
    Grab {
        path: PathBuf,
        name: String,
        #[source]
        source: io::Error,
    },

    /// Reading events failed, usually because the device was unplugged
    #[error("failed to read events from '{name}'")]
    Read {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Writing the report produced by this device's events failed
    #[error("failed to write HID report for '{name}'")]
    Report {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Invalid remap table contents
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RemapError {
    #[error("unknown key name: {0}")]
    UnknownKey(String),

    #[error("{0} is outside the remappable key range")]
    OutOfRange(String),

    #[error("chord trigger {0} cannot be a remap target")]
    TriggerTargeted(String),
}
