/// Identifies one open/close cycle of the relay.
///
/// Posted alongside every relayed event. Ids grow with every open, so the
/// UI side can tell events of the current device apart from stragglers of a
/// device already closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Messages posted to the UI message loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiMessage {
    /// Raw MIDI data word plus driver timestamp in milliseconds
    MidiData {
        context: ContextId,
        param1: u32,
        param2: u32,
    },
    /// The device of `context` was closed. Posted through the same queue as
    /// its events, so everything observed before the close is ahead of it.
    Closed { context: ContextId },
    /// Ask the message loop to stop
    Shutdown,
}
