//! Process configuration from the environment.
//!
//! Every variable is optional and prefixed with `KICK_DECK_`. A `.env` file in
//! the working directory is honored.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use kick_api::ResolverConfig;
use url::Url;

use crate::compositor::CacheConfig;
use crate::credentials::StorageKind;
use crate::error::{Error, Result};
use crate::monitor::MonitorConfig;

pub const ENV_PREFIX: &str = "KICK_DECK_";

const DEFAULT_WEB_BASE: &str = "https://kick.com";
const CREDENTIALS_FILE: &str = "credentials.json";
const APP_DIR: &str = "kick-deck";

#[derive(Debug, Clone, PartialEq)]
pub struct DeckConfig {
    pub api_base_url: Url,
    pub web_base_url: Url,
    pub channel_url_base: String,
    pub credentials_path: PathBuf,
    pub storage: StorageKind,
    pub poll_interval: Duration,
    pub alert_duration: Duration,
    pub alert_tick: Duration,
    pub key_up_spacing: Duration,
    pub image_cache_capacity: usize,
    pub image_cache_ttl: Duration,
    pub profile_cache_ttl: Duration,
    /// Zero leaves the transport default in place.
    pub http_timeout: Duration,
    pub log_dir: Option<PathBuf>,
    pub log_filter: Option<String>,
}

impl DeckConfig {
    /// Load from the process environment after reading `.env`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup (keys include the prefix).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };
        let monitor = MonitorConfig::default();
        let cache = CacheConfig::default();

        Ok(Self {
            api_base_url: env.url("API_BASE_URL", ResolverConfig::DEFAULT_API_BASE)?,
            web_base_url: env.url("WEB_BASE_URL", ResolverConfig::DEFAULT_WEB_BASE)?,
            channel_url_base: env
                .string("CHANNEL_URL_BASE")
                .unwrap_or_else(|| DEFAULT_WEB_BASE.to_string()),
            credentials_path: env
                .string("CREDENTIALS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_credentials_path),
            storage: env.parse("STORAGE", StorageKind::Both)?,
            poll_interval: env.secs("POLL_INTERVAL_SECS", monitor.poll_interval)?,
            alert_duration: env.secs("ALERT_DURATION_SECS", monitor.alert_duration)?,
            alert_tick: env.millis("ALERT_TICK_MILLIS", monitor.alert_tick)?,
            key_up_spacing: env.millis("KEY_UP_SPACING_MILLIS", monitor.key_up_spacing)?,
            image_cache_capacity: env.parse("IMAGE_CACHE_CAPACITY", cache.capacity)?,
            image_cache_ttl: env.secs("IMAGE_CACHE_TTL_SECS", cache.ttl)?,
            profile_cache_ttl: env.secs("PROFILE_CACHE_TTL_SECS", kick_api::profile::DEFAULT_PROFILE_TTL)?,
            http_timeout: env.secs("HTTP_TIMEOUT_SECS", Duration::ZERO)?,
            log_dir: env.string("LOG_DIR").map(PathBuf::from),
            log_filter: env.string("LOG_FILTER"),
        }
        .validated()?)
    }

    fn validated(self) -> Result<Self> {
        if self.poll_interval.is_zero() {
            return Err(Error::config(format!("{ENV_PREFIX}POLL_INTERVAL_SECS must be positive")));
        }
        if self.alert_tick.is_zero() {
            return Err(Error::config(format!("{ENV_PREFIX}ALERT_TICK_MILLIS must be positive")));
        }
        if self.image_cache_capacity == 0 {
            return Err(Error::config(format!(
                "{ENV_PREFIX}IMAGE_CACHE_CAPACITY must be positive"
            )));
        }
        Ok(self)
    }

    pub fn monitor(&self) -> MonitorConfig {
        MonitorConfig {
            poll_interval: self.poll_interval,
            alert_duration: self.alert_duration,
            alert_tick: self.alert_tick,
            key_up_spacing: self.key_up_spacing,
            channel_url_base: self.channel_url_base.clone(),
        }
    }

    pub fn cache(&self) -> CacheConfig {
        CacheConfig {
            capacity: self.image_cache_capacity,
            ttl: self.image_cache_ttl,
        }
    }

    pub fn resolver(&self) -> ResolverConfig {
        ResolverConfig {
            api_base_url: self.api_base_url.clone(),
            web_base_url: self.web_base_url.clone(),
            profile_ttl: self.profile_cache_ttl,
            request_timeout: self.http_timeout,
        }
    }
}

/// `<config dir>/kick-deck/credentials.json`, or the working directory when
/// the platform has no config dir.
pub fn default_credentials_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_default()
        .join(CREDENTIALS_FILE)
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(&format!("{ENV_PREFIX}{name}"))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, name: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.string(name) {
            Some(raw) => raw
                .parse()
                .map_err(|e| Error::config(format!("{ENV_PREFIX}{name}={raw:?}: {e}"))),
            None => Ok(default),
        }
    }

    fn secs(&self, name: &str, default: Duration) -> Result<Duration> {
        Ok(Duration::from_secs(self.parse(name, default.as_secs())?))
    }

    fn millis(&self, name: &str, default: Duration) -> Result<Duration> {
        Ok(Duration::from_millis(
            self.parse(name, default.as_millis() as u64)?,
        ))
    }

    fn url(&self, name: &str, default: &str) -> Result<Url> {
        let raw = self.string(name).unwrap_or_else(|| default.to_string());
        // Relative joins need a trailing slash on the base.
        let raw = if raw.ends_with('/') { raw } else { format!("{raw}/") };
        Url::parse(&raw).map_err(|e| Error::config(format!("{ENV_PREFIX}{name}={raw:?}: {e}")))
    }
}
