pub mod compositor;
pub mod config;
pub mod credentials;
pub mod error;
pub mod host;
pub mod logging;
pub mod monitor;

pub use error::{Error, Result};
