//! UI-thread side of the bridge: decode relayed events and invoke the channel.

use std::cell::Cell;

use super::channel::{CommandChannel, NOTE_OFF_METHOD, NOTE_ON_METHOD};
use crate::messages::{ContextId, UiMessage};
use crate::midi::{decode, NoteEvent, RawMidiPacket};
use crate::ui_loop::UiReceiver;

/// What the dispatcher did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The note event was sent to the channel
    Invoked(NoteEvent),
    /// Not a note message
    Ignored,
    /// A device was closed; later events from it are stale
    Closed(ContextId),
    /// Event posted after its device was closed
    Stale,
    Shutdown,
}

/// Runs on the UI thread and borrows or shares the host's command channel.
pub struct EventDispatcher<C: CommandChannel> {
    channel: C,
    /// Highest context whose `Closed` marker has been seen. Context ids only
    /// grow, so every context at or below it is closed.
    closed_through: Cell<u64>,
}

impl<C: CommandChannel> EventDispatcher<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            closed_through: Cell::new(0),
        }
    }

    pub fn handle(&self, message: UiMessage) -> DispatchOutcome {
        let (context, param1) = match message {
            UiMessage::Shutdown => return DispatchOutcome::Shutdown,
            UiMessage::Closed { context } => {
                let closed = self.closed_through.get().max(context.get());
                self.closed_through.set(closed);
                return DispatchOutcome::Closed(context);
            }
            UiMessage::MidiData {
                context, param1, ..
            } => (context, param1),
        };

        if context.get() <= self.closed_through.get() {
            log::debug!("Discarding MIDI event from closed input {}", context.get());
            return DispatchOutcome::Stale;
        }

        match decode(RawMidiPacket::from_packed(param1)) {
            Some(event) => {
                self.invoke(event);
                DispatchOutcome::Invoked(event)
            }
            None => DispatchOutcome::Ignored,
        }
    }

    fn invoke(&self, event: NoteEvent) {
        let (method, note) = match event {
            NoteEvent::NoteOn { note } => (NOTE_ON_METHOD, note),
            NoteEvent::NoteOff { note } => (NOTE_OFF_METHOD, note),
        };
        // Nobody listening is not our problem
        if let Err(e) = self.channel.invoke(method, i32::from(note)) {
            log::debug!("{}({}) not delivered: {}", method, note, e);
        }
    }

    /// Drain the UI loop until `Shutdown` arrives or every sender is dropped.
    /// Returns the number of channel invocations made.
    pub async fn run(&self, receiver: &mut UiReceiver) -> usize {
        let mut invoked = 0;
        while let Some(message) = receiver.recv().await {
            match self.handle(message) {
                DispatchOutcome::Invoked(_) => invoked += 1,
                DispatchOutcome::Shutdown => break,
                DispatchOutcome::Ignored
                | DispatchOutcome::Closed(_)
                | DispatchOutcome::Stale => {}
            }
        }
        invoked
    }

    /// Handle every message currently queued without waiting.
    /// For hosts that poll once per frame.
    pub fn pump(&self, receiver: &mut UiReceiver) -> Vec<DispatchOutcome> {
        std::iter::from_fn(|| receiver.try_recv())
            .map(|message| self.handle(message))
            .collect()
    }
}
