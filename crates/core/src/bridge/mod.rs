pub mod channel;
pub mod dispatcher;
pub mod relay;

pub use channel::{
    ChannelError, CommandChannel, LogChannel, RecordingChannel, DEFAULT_CHANNEL_NAME,
    NOTE_OFF_METHOD, NOTE_ON_METHOD,
};
pub use dispatcher::{DispatchOutcome, EventDispatcher};
pub use relay::{CrossThreadRelay, DeviceHandle, RelayStats, RelayStatus};
