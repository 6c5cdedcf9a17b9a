//! In-process MIDI backend for tests and demo runs.
//!
//! [`SimulatedDevice`] plays the part of the driver: calling
//! [`send`](SimulatedDevice::send) fires the registered callback on the
//! calling thread, the same way a real driver fires it on its own thread.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::backend::{BackendHandle, HardwareMessage, InputCallback, MidiInputBackend};
use super::midi::RawMidiPacket;
use crate::error::BackendError;

#[derive(Default)]
struct SimulatedState {
    device_count: usize,
    fail_open: Option<String>,
    fail_start: Option<String>,
    /// Keep firing callbacks after close, like a driver with a callback in flight
    late_callbacks: bool,
    next_id: u64,
    pending: HashMap<BackendHandle, InputCallback>,
    streaming: HashMap<BackendHandle, InputCallback>,
    closed: Vec<InputCallback>,
    clock_ms: u32,
    open_calls: usize,
    start_calls: usize,
    close_calls: usize,
}

/// Backend side of the simulation, handed to the relay.
pub struct SimulatedBackend {
    state: Arc<Mutex<SimulatedState>>,
}

/// Driver side of the simulation. Cheap to clone and `Send`, so tests can
/// move it onto a "hardware" thread.
#[derive(Clone)]
pub struct SimulatedDevice {
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedBackend {
    /// Create a backend exposing `device_count` input devices.
    pub fn new(device_count: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimulatedState {
                device_count,
                next_id: 1,
                ..Default::default()
            })),
        }
    }

    /// Make every `open` call fail with `reason`.
    pub fn failing_open(self, reason: impl Into<String>) -> Self {
        self.state.lock().fail_open = Some(reason.into());
        self
    }

    /// Make every `start` call fail with `reason`.
    pub fn failing_start(self, reason: impl Into<String>) -> Self {
        self.state.lock().fail_start = Some(reason.into());
        self
    }

    /// Keep delivering to callbacks after their device was closed.
    pub fn with_late_callbacks(self) -> Self {
        self.state.lock().late_callbacks = true;
        self
    }

    pub fn device(&self) -> SimulatedDevice {
        SimulatedDevice {
            state: Arc::clone(&self.state),
        }
    }
}

impl MidiInputBackend for SimulatedBackend {
    fn enumerate_devices(&self) -> Result<usize, BackendError> {
        Ok(self.state.lock().device_count)
    }

    fn device_name(&self, index: usize) -> Option<String> {
        let state = self.state.lock();
        (index < state.device_count).then(|| format!("Simulated Keyboard {}", index + 1))
    }

    fn open(&mut self, index: usize, callback: InputCallback) -> Result<BackendHandle, BackendError> {
        let mut state = self.state.lock();
        state.open_calls += 1;
        if index >= state.device_count {
            return Err(BackendError::InvalidDevice(index));
        }
        if let Some(reason) = &state.fail_open {
            return Err(BackendError::Connect(reason.clone()));
        }

        let handle = BackendHandle::new(state.next_id);
        state.next_id += 1;
        state.pending.insert(handle, callback);
        Ok(handle)
    }

    fn start(&mut self, handle: BackendHandle) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.start_calls += 1;
        if let Some(reason) = &state.fail_start {
            return Err(BackendError::Connect(reason.clone()));
        }

        let callback = state
            .pending
            .remove(&handle)
            .ok_or(BackendError::UnknownHandle)?;
        state.streaming.insert(handle, callback);
        Ok(())
    }

    fn close(&mut self, handle: BackendHandle) {
        let mut state = self.state.lock();
        state.close_calls += 1;
        state.pending.remove(&handle);
        if let Some(callback) = state.streaming.remove(&handle) {
            if state.late_callbacks {
                state.closed.push(callback);
            }
        }
    }
}

impl SimulatedDevice {
    /// Deliver a short message. Returns the number of callbacks that fired.
    pub fn send(&self, packet: RawMidiPacket) -> usize {
        let mut state = self.state.lock();
        state.clock_ms = state.clock_ms.wrapping_add(1);
        let message = HardwareMessage::Data {
            packed: packet.packed(),
            timestamp_ms: state.clock_ms,
        };
        Self::fire(&mut state, message)
    }

    /// Deliver an arbitrary hardware message.
    pub fn send_message(&self, message: HardwareMessage) -> usize {
        Self::fire(&mut self.state.lock(), message)
    }

    // The lock serialises callbacks with open/close, as a driver does.
    fn fire(state: &mut SimulatedState, message: HardwareMessage) -> usize {
        let mut fired = 0;
        for callback in state.streaming.values_mut() {
            callback(message.clone());
            fired += 1;
        }
        for callback in state.closed.iter_mut() {
            callback(message.clone());
            fired += 1;
        }
        fired
    }

    pub fn set_device_count(&self, count: usize) {
        self.state.lock().device_count = count;
    }

    pub fn is_streaming(&self) -> bool {
        !self.state.lock().streaming.is_empty()
    }

    pub fn open_calls(&self) -> usize {
        self.state.lock().open_calls
    }

    pub fn start_calls(&self) -> usize {
        self.state.lock().start_calls
    }

    pub fn close_calls(&self) -> usize {
        self.state.lock().close_calls
    }
}
