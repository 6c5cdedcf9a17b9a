//! MIDI keyboard input bridge.
//!
//! Raw MIDI input arrives on a callback thread owned by the driver. The
//! [`CrossThreadRelay`] posts each raw data word to the UI message loop
//! without waiting, and the [`EventDispatcher`] decodes it on the UI thread
//! and invokes `onNoteOn` / `onNoteOff` on the host's [`CommandChannel`].
//!
//! ```text
//! driver thread ──callback──▶ CrossThreadRelay ──post──▶ UiSender
//!                                                           │ FIFO
//! UI thread ◀── CommandChannel ◀── EventDispatcher ◀── UiReceiver
//! ```

pub use bridge::{
    ChannelError, CommandChannel, CrossThreadRelay, DeviceHandle, DispatchOutcome,
    EventDispatcher, LogChannel, RecordingChannel, RelayStats, RelayStatus,
    DEFAULT_CHANNEL_NAME, NOTE_OFF_METHOD, NOTE_ON_METHOD,
};
pub use config::{BridgeSettings, ConfigError, ConfigManager};
pub use error::{BackendError, DeviceError};
pub use messages::{ContextId, UiMessage};
pub use midi::{
    decode, BackendHandle, HardwareMessage, InputCallback, MidiInputBackend, NoteEvent,
    RawMidiPacket, SimulatedBackend, SimulatedDevice,
};
#[cfg(feature = "midi-io")]
pub use midi::MidirBackend;
pub use ui_loop::{ui_loop, PostError, QueuePolicy, UiPoster, UiReceiver, UiSender};

mod bridge;
mod config;
mod error;
pub mod messages;
pub mod midi;
mod ui_loop;
