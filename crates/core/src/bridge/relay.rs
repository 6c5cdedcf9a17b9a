//! Hand-off of raw MIDI input from the driver callback thread to the UI thread.
//!
//! The callback owns an `Arc<RelayContext>`; the only thing it does is post
//! the raw data word to the UI loop. It takes no locks of ours and never
//! waits on the UI thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{BackendError, DeviceError};
use crate::messages::{ContextId, UiMessage};
use crate::midi::{BackendHandle, HardwareMessage, MidiInputBackend};
use crate::ui_loop::{PostError, UiPoster};

/// Public view of the open device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    context: ContextId,
    index: usize,
    name: String,
}

impl DeviceHandle {
    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayStatus {
    Closed,
    Open { device: String },
    /// No input device was present at the last open attempt
    Unavailable,
    Failed(String),
}

/// Counters updated from the callback thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Events posted to the UI loop
    pub forwarded: u64,
    /// Events discarded because the bounded UI queue was full
    pub dropped: u64,
    /// Events that arrived after close or after the UI loop went away
    pub late: u64,
}

#[derive(Debug, Default)]
struct RelayCounters {
    forwarded: AtomicU64,
    dropped: AtomicU64,
    late: AtomicU64,
}

struct RelayContext {
    id: ContextId,
    open: AtomicBool,
    poster: Arc<dyn UiPoster>,
    counters: Arc<RelayCounters>,
}

impl RelayContext {
    fn on_hardware_message(&self, message: HardwareMessage) {
        let HardwareMessage::Data {
            packed,
            timestamp_ms,
        } = message
        else {
            return;
        };

        if !self.open.load(Ordering::Acquire) {
            self.counters.late.fetch_add(1, Ordering::Relaxed);
            log::debug!("{}", DeviceError::CallbackOnClosedDevice);
            return;
        }

        let posted = self.poster.post(UiMessage::MidiData {
            context: self.id,
            param1: packed,
            param2: timestamp_ms,
        });
        match posted {
            Ok(()) => {
                self.counters.forwarded.fetch_add(1, Ordering::Relaxed);
            }
            Err(PostError::Full) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!("UI queue full, dropped MIDI event {:#08x}", packed);
            }
            Err(PostError::Closed) => {
                self.counters.late.fetch_add(1, Ordering::Relaxed);
                log::debug!("UI loop gone, discarding MIDI event {:#08x}", packed);
            }
        }
    }
}

struct OpenDevice {
    handle: DeviceHandle,
    backend_handle: BackendHandle,
    context: Arc<RelayContext>,
}

/// Owns the single MIDI input device and relays its events to the UI loop.
pub struct CrossThreadRelay<B: MidiInputBackend> {
    backend: B,
    poster: Arc<dyn UiPoster>,
    counters: Arc<RelayCounters>,
    next_context: u64,
    device: Option<OpenDevice>,
    status: RelayStatus,
}

impl<B: MidiInputBackend> CrossThreadRelay<B> {
    pub fn new(backend: B, poster: impl UiPoster + 'static) -> Self {
        Self {
            backend,
            poster: Arc::new(poster),
            counters: Arc::new(RelayCounters::default()),
            next_context: 1,
            device: None,
            status: RelayStatus::Closed,
        }
    }

    /// Open and start the first available input device.
    ///
    /// When a device is already open this returns its handle and touches
    /// nothing else.
    pub fn open(&mut self) -> Result<DeviceHandle, DeviceError> {
        if let Some(device) = &self.device {
            log::debug!("MIDI input '{}' already open", device.handle.name);
            return Ok(device.handle.clone());
        }

        let count = match self.backend.enumerate_devices() {
            Ok(count) => count,
            Err(e) => return Err(self.fail(e)),
        };
        if count == 0 {
            log::info!("No MIDI input device found, continuing without MIDI input");
            self.status = RelayStatus::Unavailable;
            return Err(DeviceError::NoDeviceAvailable);
        }

        let index = 0;
        let name = self
            .backend
            .device_name(index)
            .unwrap_or_else(|| format!("MIDI input {}", index));

        let context = Arc::new(RelayContext {
            id: ContextId::new(self.next_context),
            open: AtomicBool::new(false),
            poster: Arc::clone(&self.poster),
            counters: Arc::clone(&self.counters),
        });
        self.next_context += 1;

        let callback_context = Arc::clone(&context);
        let backend_handle = match self.backend.open(
            index,
            Box::new(move |message| callback_context.on_hardware_message(message)),
        ) {
            Ok(handle) => handle,
            Err(e) => return Err(self.fail(e)),
        };

        // Mark open before starting so the first events are not lost
        context.open.store(true, Ordering::Release);

        if let Err(e) = self.backend.start(backend_handle) {
            context.open.store(false, Ordering::Release);
            self.backend.close(backend_handle);
            return Err(self.fail(e));
        }

        let handle = DeviceHandle {
            context: context.id,
            index,
            name: name.clone(),
        };
        self.device = Some(OpenDevice {
            handle: handle.clone(),
            backend_handle,
            context,
        });
        self.status = RelayStatus::Open {
            device: name.clone(),
        };
        log::info!("MIDI input '{}' opened", name);
        Ok(handle)
    }

    fn fail(&mut self, e: BackendError) -> DeviceError {
        let err = DeviceError::from(e);
        log::error!("{}", err);
        self.status = RelayStatus::Failed(err.to_string());
        err
    }

    /// Stop the stream and release the device.
    ///
    /// Safe to call repeatedly and before any successful `open`. Callbacks
    /// that fire after this returns are discarded. Events already queued
    /// stay ahead of the `Closed` marker and are still dispatched.
    pub fn close(&mut self) {
        let Some(device) = self.device.take() else {
            return;
        };

        // Flag first: a callback in flight either posted before the marker
        // or lands after it and is discarded by the dispatcher
        device.context.open.store(false, Ordering::Release);
        let context = device.context.id;
        if let Err(e) = self.poster.post(UiMessage::Closed { context }) {
            log::warn!("Could not mark MIDI input {} closed: {}", context.get(), e);
        }
        self.backend.close(device.backend_handle);
        self.status = RelayStatus::Closed;
        log::info!("MIDI input '{}' closed", device.handle.name);
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    pub fn device(&self) -> Option<&DeviceHandle> {
        self.device.as_ref().map(|device| &device.handle)
    }

    pub fn status(&self) -> &RelayStatus {
        &self.status
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            forwarded: self.counters.forwarded.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            late: self.counters.late.load(Ordering::Relaxed),
        }
    }
}

impl<B: MidiInputBackend> Drop for CrossThreadRelay<B> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{RawMidiPacket, SimulatedBackend};
    use crate::ui_loop::{ui_loop, QueuePolicy};

    fn note_on(note: u8) -> RawMidiPacket {
        RawMidiPacket::new(0x90, note, 100)
    }

    #[test]
    fn test_open_without_devices() {
        let (tx, _rx) = ui_loop(QueuePolicy::Unbounded);
        let backend = SimulatedBackend::new(0);
        let device = backend.device();
        let mut relay = CrossThreadRelay::new(backend, tx);

        assert_eq!(relay.open(), Err(DeviceError::NoDeviceAvailable));
        assert_eq!(relay.status(), &RelayStatus::Unavailable);
        assert!(!relay.is_open());
        assert_eq!(device.open_calls(), 0);
    }

    #[test]
    fn test_open_relays_to_ui_loop() {
        let (tx, mut rx) = ui_loop(QueuePolicy::Unbounded);
        let backend = SimulatedBackend::new(2);
        let device = backend.device();
        let mut relay = CrossThreadRelay::new(backend, tx);

        let handle = relay.open().unwrap();
        assert_eq!(handle.index(), 0);
        assert_eq!(handle.name(), "Simulated Keyboard 1");

        device.send(note_on(60));
        match rx.try_recv() {
            Some(UiMessage::MidiData {
                context, param1, ..
            }) => {
                assert_eq!(context, handle.context());
                assert_eq!(param1, note_on(60).packed());
            }
            other => panic!("Expected MidiData, got {:?}", other),
        }
        assert_eq!(relay.stats().forwarded, 1);
    }

    #[test]
    fn test_open_twice_returns_existing_handle() {
        let (tx, _rx) = ui_loop(QueuePolicy::Unbounded);
        let backend = SimulatedBackend::new(1);
        let device = backend.device();
        let mut relay = CrossThreadRelay::new(backend, tx);

        let first = relay.open().unwrap();
        let second = relay.open().unwrap();
        assert_eq!(first, second);
        assert_eq!(device.open_calls(), 1);
        assert_eq!(device.start_calls(), 1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (tx, mut rx) = ui_loop(QueuePolicy::Unbounded);
        let backend = SimulatedBackend::new(1);
        let device = backend.device();
        let mut relay = CrossThreadRelay::new(backend, tx);

        let handle = relay.open().unwrap();
        relay.close();
        relay.close();
        assert_eq!(device.close_calls(), 1);
        assert_eq!(relay.status(), &RelayStatus::Closed);
        assert!(!device.is_streaming());

        // One marker per closed device
        assert_eq!(
            rx.try_recv(),
            Some(UiMessage::Closed {
                context: handle.context()
            })
        );
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_close_without_open() {
        let (tx, mut rx) = ui_loop(QueuePolicy::Unbounded);
        let backend = SimulatedBackend::new(0);
        let device = backend.device();
        let mut relay = CrossThreadRelay::new(backend, tx);

        relay.close();
        let _ = relay.open();
        relay.close();
        assert_eq!(device.close_calls(), 0);
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_open_failure_is_reported() {
        let (tx, _rx) = ui_loop(QueuePolicy::Unbounded);
        let backend = SimulatedBackend::new(1).failing_open("device busy");
        let mut relay = CrossThreadRelay::new(backend, tx);

        let err = relay.open().unwrap_err();
        assert!(matches!(err, DeviceError::OpenFailed(ref reason) if reason.contains("device busy")));
        assert!(!err.is_fatal());
        assert!(matches!(relay.status(), RelayStatus::Failed(_)));
        assert!(!relay.is_open());
    }

    #[test]
    fn test_start_failure_releases_device() {
        let (tx, _rx) = ui_loop(QueuePolicy::Unbounded);
        let backend = SimulatedBackend::new(1).failing_start("stream error");
        let device = backend.device();
        let mut relay = CrossThreadRelay::new(backend, tx);

        assert!(matches!(relay.open(), Err(DeviceError::OpenFailed(_))));
        assert_eq!(device.close_calls(), 1);

        // Nothing left to release
        relay.close();
        assert_eq!(device.close_calls(), 1);
    }

    #[test]
    fn test_reopen_uses_new_context() {
        let (tx, _rx) = ui_loop(QueuePolicy::Unbounded);
        let mut relay = CrossThreadRelay::new(SimulatedBackend::new(1), tx);

        let first = relay.open().unwrap();
        relay.close();
        let second = relay.open().unwrap();
        assert!(second.context() > first.context());
    }

    #[test]
    fn test_late_callback_after_close_is_dropped() {
        let (tx, mut rx) = ui_loop(QueuePolicy::Unbounded);
        let backend = SimulatedBackend::new(1).with_late_callbacks();
        let device = backend.device();
        let mut relay = CrossThreadRelay::new(backend, tx);

        let handle = relay.open().unwrap();
        relay.close();

        assert_eq!(device.send(note_on(64)), 1);
        assert_eq!(
            rx.try_recv(),
            Some(UiMessage::Closed {
                context: handle.context()
            })
        );
        assert_eq!(rx.try_recv(), None);
        assert_eq!(relay.stats().late, 1);
        assert_eq!(relay.stats().forwarded, 0);
    }

    #[test]
    fn test_bounded_queue_drops_are_counted() {
        let (tx, mut rx) = ui_loop(QueuePolicy::Bounded(2));
        let backend = SimulatedBackend::new(1);
        let device = backend.device();
        let mut relay = CrossThreadRelay::new(backend, tx);
        relay.open().unwrap();

        for note in 60..65 {
            device.send(note_on(note));
        }

        let stats = relay.stats();
        assert_eq!(stats.forwarded, 2);
        assert_eq!(stats.dropped, 3);

        // The oldest events survive, in order
        let notes: Vec<u8> = std::iter::from_fn(|| rx.try_recv())
            .filter_map(|msg| match msg {
                UiMessage::MidiData { param1, .. } => Some(RawMidiPacket::from_packed(param1).data1),
                _ => None,
            })
            .collect();
        assert_eq!(notes, vec![60, 61]);
    }

    #[test]
    fn test_non_data_messages_are_not_relayed() {
        let (tx, mut rx) = ui_loop(QueuePolicy::Unbounded);
        let backend = SimulatedBackend::new(1);
        let device = backend.device();
        let mut relay = CrossThreadRelay::new(backend, tx);
        relay.open().unwrap();

        device.send_message(HardwareMessage::LongData(vec![0xF0, 0x7E, 0xF7]));
        device.send_message(HardwareMessage::Other);
        assert_eq!(rx.try_recv(), None);
        assert_eq!(relay.stats(), RelayStats::default());
    }

    #[test]
    fn test_drop_closes_device() {
        let (tx, _rx) = ui_loop(QueuePolicy::Unbounded);
        let backend = SimulatedBackend::new(1);
        let device = backend.device();
        {
            let mut relay = CrossThreadRelay::new(backend, tx);
            relay.open().unwrap();
        }
        assert_eq!(device.close_calls(), 1);
        assert!(!device.is_streaming());
    }
}
