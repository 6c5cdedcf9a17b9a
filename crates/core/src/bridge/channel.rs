//! Named command channel owned by the host UI layer.

use parking_lot::Mutex;
use thiserror::Error;

/// Method invoked when a key goes down.
pub const NOTE_ON_METHOD: &str = "onNoteOn";
/// Method invoked when a key is released.
pub const NOTE_OFF_METHOD: &str = "onNoteOff";
/// Channel name the UI side listens on.
pub const DEFAULT_CHANNEL_NAME: &str = "com.synthesia.midi";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("no listener registered on channel '{0}'")]
    NoListener(String),
}

/// Sink for `(method, payload)` invocations. Fire-and-forget from the caller's side.
pub trait CommandChannel {
    fn invoke(&self, method: &str, payload: i32) -> Result<(), ChannelError>;
}

impl<C: CommandChannel + ?Sized> CommandChannel for &C {
    fn invoke(&self, method: &str, payload: i32) -> Result<(), ChannelError> {
        (**self).invoke(method, payload)
    }
}

impl<C: CommandChannel + ?Sized> CommandChannel for std::sync::Arc<C> {
    fn invoke(&self, method: &str, payload: i32) -> Result<(), ChannelError> {
        (**self).invoke(method, payload)
    }
}

/// Channel that writes every invocation to the log.
#[derive(Debug, Clone)]
pub struct LogChannel {
    name: String,
}

impl LogChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl CommandChannel for LogChannel {
    fn invoke(&self, method: &str, payload: i32) -> Result<(), ChannelError> {
        log::info!("[{}] {}({})", self.name, method, payload);
        Ok(())
    }
}

/// Channel that records invocations in order.
///
/// `without_listener` still records but answers every call with
/// [`ChannelError::NoListener`].
#[derive(Debug, Default)]
pub struct RecordingChannel {
    calls: Mutex<Vec<(String, i32)>>,
    no_listener: bool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_listener() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            no_listener: true,
        }
    }

    pub fn calls(&self) -> Vec<(String, i32)> {
        self.calls.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }
}

impl CommandChannel for RecordingChannel {
    fn invoke(&self, method: &str, payload: i32) -> Result<(), ChannelError> {
        self.calls.lock().push((method.to_string(), payload));
        if self.no_listener {
            return Err(ChannelError::NoListener(DEFAULT_CHANNEL_NAME.to_string()));
        }
        Ok(())
    }
}
