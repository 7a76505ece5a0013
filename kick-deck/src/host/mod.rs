//! Host plugin runtime integration.
//!
//! The host owns the buttons; this module defines what the core needs from
//! it ([`ButtonSurface`], [`BrowserOpener`], [`AuthFlow`], [`SettingsBackend`]),
//! the JSON-lines protocol used to talk to it, and the [`PluginService`]
//! routing its events.

mod protocol;
mod service;
mod settings;
mod surface;

pub use protocol::{
    ActionPayload, ButtonSettings, CommandSink, GlobalSettingsPayload, HostCommand, HostEvent,
    PluginAction, SettingsPayload, write_commands,
};
pub use service::PluginService;
pub use settings::{HostError, InMemorySettings, SettingsBackend};
pub use surface::{AuthFlow, BrowserOpener, ButtonSurface};
