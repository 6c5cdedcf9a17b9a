//! Error types for the MIDI input bridge.
//!
//! Nothing in here is fatal to the host application. A missing or broken
//! MIDI device only means the keyboard feature is unavailable.

use thiserror::Error;

/// Errors surfaced by [`CrossThreadRelay`](crate::CrossThreadRelay).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// No MIDI input device is connected. The application carries on without MIDI input.
    #[error("no MIDI input device available")]
    NoDeviceAvailable,

    /// A device was found but could not be opened or started.
    #[error("failed to open MIDI input: {0}")]
    OpenFailed(String),

    /// The driver fired a callback for a device that was already closed.
    /// Tolerated as a no-op.
    #[error("MIDI callback fired on a closed device")]
    CallbackOnClosedDevice,
}

impl DeviceError {
    /// Whether the host should treat this as fatal. Always false.
    pub fn is_fatal(&self) -> bool {
        false
    }
}

/// Errors reported by a [`MidiInputBackend`](crate::MidiInputBackend).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("MIDI backend initialisation failed: {0}")]
    Init(String),

    #[error("MIDI device index {0} out of range")]
    InvalidDevice(usize),

    #[error("unknown MIDI device handle")]
    UnknownHandle,

    #[error("MIDI connect failed: {0}")]
    Connect(String),
}

impl From<BackendError> for DeviceError {
    fn from(e: BackendError) -> Self {
        DeviceError::OpenFailed(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::InitError> for BackendError {
    fn from(e: midir::InitError) -> Self {
        BackendError::Init(e.to_string())
    }
}
