//! Hardware MIDI input abstraction.
//!
//! A backend enumerates input devices, opens one with a callback and starts
//! the stream. The callback runs on a thread owned by the driver; whatever
//! state it needs is captured by the closure, so the backend never sees a
//! raw context pointer.

use crate::error::BackendError;

/// Callback invoked by the driver for every incoming message.
pub type InputCallback = Box<dyn FnMut(HardwareMessage) + Send + 'static>;

/// Message delivered to an [`InputCallback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareMessage {
    /// Short message packed as `status | data1 << 8 | data2 << 16`.
    Data { packed: u32, timestamp_ms: u32 },
    /// System exclusive or any message longer than three bytes.
    LongData(Vec<u8>),
    /// Driver notifications with no MIDI payload.
    Other,
}

/// Opaque handle issued by a backend for an opened device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendHandle(u64);

impl BackendHandle {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Platform MIDI input backend.
pub trait MidiInputBackend: Send {
    /// Number of input devices currently present.
    fn enumerate_devices(&self) -> Result<usize, BackendError>;

    /// Human readable name of the device at `index`, if the backend knows it.
    fn device_name(&self, index: usize) -> Option<String>;

    /// Open the device at `index`. Messages are not delivered until [`start`](Self::start).
    fn open(&mut self, index: usize, callback: InputCallback) -> Result<BackendHandle, BackendError>;

    /// Start delivering messages to the callback registered with `open`.
    fn start(&mut self, handle: BackendHandle) -> Result<(), BackendError>;

    /// Stop the stream and release the device. Unknown handles are ignored.
    fn close(&mut self, handle: BackendHandle);
}

impl<B: MidiInputBackend + ?Sized> MidiInputBackend for Box<B> {
    fn enumerate_devices(&self) -> Result<usize, BackendError> {
        (**self).enumerate_devices()
    }

    fn device_name(&self, index: usize) -> Option<String> {
        (**self).device_name(index)
    }

    fn open(&mut self, index: usize, callback: InputCallback) -> Result<BackendHandle, BackendError> {
        (**self).open(index, callback)
    }

    fn start(&mut self, handle: BackendHandle) -> Result<(), BackendError> {
        (**self).start(handle)
    }

    fn close(&mut self, handle: BackendHandle) {
        (**self).close(handle)
    }
}
