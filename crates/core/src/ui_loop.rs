//! UI message loop built on tokio channels.
//!
//! [`UiSender`] is the thread-safe "post message" primitive used by the
//! relay; it never waits on the UI thread. [`UiReceiver`] is drained on the
//! UI thread in FIFO order.

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

use crate::messages::UiMessage;

/// Capacity of the UI message queue.
///
/// With `Bounded`, a post that finds the queue full drops the *new* message
/// and reports [`PostError::Full`]; already queued messages keep their order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueuePolicy {
    #[default]
    Unbounded,
    Bounded(usize),
}

impl QueuePolicy {
    pub fn from_capacity(capacity: Option<usize>) -> Self {
        capacity.map_or(QueuePolicy::Unbounded, QueuePolicy::Bounded)
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PostError {
    #[error("UI message queue is full")]
    Full,
    #[error("UI message loop has shut down")]
    Closed,
}

/// Thread-safe, non-blocking hand-off to the UI thread.
pub trait UiPoster: Send + Sync {
    fn post(&self, message: UiMessage) -> Result<(), PostError>;
}

#[derive(Debug, Clone)]
pub enum UiSender {
    Unbounded(mpsc::UnboundedSender<UiMessage>),
    Bounded(mpsc::Sender<UiMessage>),
}

impl UiPoster for UiSender {
    fn post(&self, message: UiMessage) -> Result<(), PostError> {
        match self {
            UiSender::Unbounded(tx) => tx.send(message).map_err(|_| PostError::Closed),
            // try_send so the caller is never parked on a full queue
            UiSender::Bounded(tx) => tx.try_send(message).map_err(|e| match e {
                TrySendError::Full(_) => PostError::Full,
                TrySendError::Closed(_) => PostError::Closed,
            }),
        }
    }
}

#[derive(Debug)]
pub enum UiReceiver {
    Unbounded(mpsc::UnboundedReceiver<UiMessage>),
    Bounded(mpsc::Receiver<UiMessage>),
}

impl UiReceiver {
    /// Wait for the next message. Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<UiMessage> {
        match self {
            UiReceiver::Unbounded(rx) => rx.recv().await,
            UiReceiver::Bounded(rx) => rx.recv().await,
        }
    }

    /// Take the next message if one is queued. For hosts that poll once per frame.
    pub fn try_recv(&mut self) -> Option<UiMessage> {
        let result = match self {
            UiReceiver::Unbounded(rx) => rx.try_recv(),
            UiReceiver::Bounded(rx) => rx.try_recv(),
        };
        match result {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Create a connected sender/receiver pair.
pub fn ui_loop(policy: QueuePolicy) -> (UiSender, UiReceiver) {
    match policy {
        QueuePolicy::Unbounded => {
            let (tx, rx) = mpsc::unbounded_channel();
            (UiSender::Unbounded(tx), UiReceiver::Unbounded(rx))
        }
        QueuePolicy::Bounded(capacity) => {
            // tokio rejects zero capacity
            let (tx, rx) = mpsc::channel(capacity.max(1));
            (UiSender::Bounded(tx), UiReceiver::Bounded(rx))
        }
    }
}
