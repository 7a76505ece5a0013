//! Channel monitoring per button.
//!
//! # Architecture
//!
//! - [`ChannelMonitor`]: per-button state machine (polling, transitions, alerts, rendering)
//! - [`ButtonActor`]: task owning one monitor and its timers
//! - [`MonitorRegistry`]: instance id to actor mapping

mod actor;
mod alert;
mod button;
mod channels;
mod registry;
mod results;
mod transition;

#[cfg(test)]
pub(crate) mod testing;

pub use actor::{
    ActorOutcome, ButtonActor, DEFAULT_MAILBOX_CAPACITY, MonitorHandle, MonitorMessage, SendError,
};
pub use alert::AlertCycle;
pub use button::{
    ChannelMonitor, MonitorConfig, MonitorServices, NO_CHANNEL_TITLE, NOT_FOUND_TITLE,
    TimerEvent, channel_url,
};
pub use channels::{MAX_CHANNELS, parse_channel_spec};
pub use registry::MonitorRegistry;
pub use results::{ChannelResult, FetchOutcome, MonitorStatus, aggregate};
pub use transition::detect_transitions;
