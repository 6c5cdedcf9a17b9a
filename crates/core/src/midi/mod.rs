pub mod backend;
pub mod midi;
#[cfg(feature = "midi-io")]
pub mod midir_backend;
pub mod simulated;

pub use backend::{BackendHandle, HardwareMessage, InputCallback, MidiInputBackend};
pub use midi::{decode, NoteEvent, RawMidiPacket, NOTE_OFF, NOTE_ON};
#[cfg(feature = "midi-io")]
pub use midir_backend::MidirBackend;
pub use simulated::{SimulatedBackend, SimulatedDevice};
