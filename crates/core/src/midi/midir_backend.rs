use std::collections::HashMap;

use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort};

use super::backend::{BackendHandle, HardwareMessage, InputCallback, MidiInputBackend};
use super::midi::RawMidiPacket;
use crate::error::BackendError;

enum Slot {
    /// Opened but not started yet
    Pending {
        port: MidiInputPort,
        callback: InputCallback,
    },
    Running(MidiInputConnection<()>),
}

/// Backend implemented with the `midir` crate.
///
/// midir begins streaming as soon as a port is connected, so `open` only
/// resolves the port and `start` makes the connection.
pub struct MidirBackend {
    client_name: String,
    next_id: u64,
    slots: HashMap<BackendHandle, Slot>,
}

impl MidirBackend {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            next_id: 1,
            slots: HashMap::new(),
        }
    }

    fn input(&self) -> Result<MidiInput, BackendError> {
        let mut input = MidiInput::new(&self.client_name)?;
        input.ignore(Ignore::None);
        Ok(input)
    }

    fn allocate_handle(&mut self) -> BackendHandle {
        let handle = BackendHandle::new(self.next_id);
        self.next_id += 1;
        handle
    }
}

impl MidiInputBackend for MidirBackend {
    fn enumerate_devices(&self) -> Result<usize, BackendError> {
        Ok(self.input()?.port_count())
    }

    fn device_name(&self, index: usize) -> Option<String> {
        let input = self.input().ok()?;
        let ports = input.ports();
        input.port_name(ports.get(index)?).ok()
    }

    fn open(&mut self, index: usize, callback: InputCallback) -> Result<BackendHandle, BackendError> {
        let input = self.input()?;
        let port = input
            .ports()
            .get(index)
            .cloned()
            .ok_or(BackendError::InvalidDevice(index))?;

        let handle = self.allocate_handle();
        self.slots.insert(handle, Slot::Pending { port, callback });
        Ok(handle)
    }

    fn start(&mut self, handle: BackendHandle) -> Result<(), BackendError> {
        let slot = self
            .slots
            .remove(&handle)
            .ok_or(BackendError::UnknownHandle)?;

        let (port, mut callback) = match slot {
            Slot::Pending { port, callback } => (port, callback),
            running @ Slot::Running(_) => {
                self.slots.insert(handle, running);
                return Ok(());
            }
        };

        let input = self.input()?;
        let connection = input
            .connect(
                &port,
                "keybridge-input",
                move |timestamp, message, _| callback(to_hardware_message(timestamp, message)),
                (),
            )
            .map_err(|e| BackendError::Connect(e.to_string()))?;

        log::debug!("midir connection {} started", handle.id());
        self.slots.insert(handle, Slot::Running(connection));
        Ok(())
    }

    fn close(&mut self, handle: BackendHandle) {
        // Pending slots hold no OS resources
        if let Some(Slot::Running(connection)) = self.slots.remove(&handle) {
            let _ = connection.close();
            log::debug!("midir connection {} closed", handle.id());
        }
    }
}

/// midir timestamps are microseconds; the packed layout carries milliseconds.
fn to_hardware_message(timestamp_us: u64, message: &[u8]) -> HardwareMessage {
    match RawMidiPacket::from_bytes(message) {
        Some(packet) => HardwareMessage::Data {
            packed: packet.packed(),
            timestamp_ms: (timestamp_us / 1000) as u32,
        },
        None if message.is_empty() => HardwareMessage::Other,
        None => HardwareMessage::LongData(message.to_vec()),
    }
}
