//! Per-button channel monitor.
//!
//! A [`ChannelMonitor`] owns everything one button instance knows: its
//! configured channels, the latest results, the alert cycle and both timers.
//! The poll timer drives [`ChannelMonitor::refresh`]; while the alert timer is
//! running it alone decides what the button shows.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use kick_api::{ChannelStatus, StatusSource, normalize_slug};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, info, instrument, warn};

use crate::compositor::{
    CollageItem, ImageCompositor, TextOverlay, flash_square, indicator, live_indicator,
    offline_indicator,
};
use crate::host::{BrowserOpener, ButtonSurface};

use super::alert::AlertCycle;
use super::channels::parse_channel_spec;
use super::results::{ChannelResult, MonitorStatus, aggregate};
use super::transition::detect_transitions;

/// Title shown when no channel is configured.
pub const NO_CHANNEL_TITLE: &str = "NO\nCHANNEL";
/// Title shown when none of several channels exists.
pub const NOT_FOUND_TITLE: &str = "NOT FOUND";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub alert_duration: Duration,
    pub alert_tick: Duration,
    /// Delay between browser openings when several channels are live.
    pub key_up_spacing: Duration,
    pub channel_url_base: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            alert_duration: Duration::from_secs(60),
            alert_tick: Duration::from_secs(1),
            key_up_spacing: Duration::from_millis(500),
            channel_url_base: "https://kick.com".to_string(),
        }
    }
}

/// Collaborators shared by every monitor.
#[derive(Clone)]
pub struct MonitorServices {
    pub source: Arc<dyn StatusSource>,
    pub compositor: Arc<ImageCompositor>,
    pub surface: Arc<dyn ButtonSurface>,
    pub browser: Arc<dyn BrowserOpener>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Poll,
    AlertTick,
}

/// Browser URL of a channel page.
pub fn channel_url(base: &str, slug: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), normalize_slug(slug))
}

async fn fetch(source: &dyn StatusSource, slug: &str) -> ChannelResult {
    let result = source.fetch_status(slug).await;
    if let Err(e) = &result {
        warn!(channel = %slug, error = %e, "Status fetch failed");
    }
    ChannelResult::from_lookup(slug, result)
}

pub struct ChannelMonitor {
    context: String,
    config: MonitorConfig,
    services: MonitorServices,
    channels: Vec<String>,
    last_status: MonitorStatus,
    /// Single-channel status, or the synthetic aggregate in multi mode.
    last_result: Option<ChannelStatus>,
    /// Valid (found or errored) results of the last multi-channel poll.
    multi_results: Vec<ChannelResult>,
    last_collage: Option<String>,
    alert: Option<AlertCycle>,
    poll_timer: Option<Interval>,
    alert_timer: Option<Interval>,
}

impl ChannelMonitor {
    pub fn new(context: impl Into<String>, config: MonitorConfig, services: MonitorServices) -> Self {
        Self {
            context: context.into(),
            config,
            services,
            channels: Vec::new(),
            last_status: MonitorStatus::Unknown,
            last_result: None,
            multi_results: Vec::new(),
            last_collage: None,
            alert: None,
            poll_timer: None,
            alert_timer: None,
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn last_status(&self) -> MonitorStatus {
        self.last_status
    }

    pub fn last_result(&self) -> Option<&ChannelStatus> {
        self.last_result.as_ref()
    }

    pub fn multi_results(&self) -> &[ChannelResult] {
        &self.multi_results
    }

    pub fn alerting_channels(&self) -> Option<&BTreeSet<String>> {
        self.alert.as_ref().map(|a| &a.alerting)
    }

    pub fn is_polling(&self) -> bool {
        self.poll_timer.is_some()
    }

    pub fn is_alerting(&self) -> bool {
        self.alert_timer.is_some()
    }

    fn is_multi(&self) -> bool {
        self.channels.len() > 1
    }

    /// Apply a comma-joined channel setting.
    ///
    /// Identical channels with polling already active are ignored. Anything
    /// else resets results and timers and polls right away.
    pub async fn configure(&mut self, raw: &str) {
        let channels = parse_channel_spec(raw);
        if channels == self.channels && self.is_polling() {
            debug!(instance = %self.context, "Channels unchanged; keeping timers");
            return;
        }

        self.reset();
        self.channels = channels;

        if self.channels.is_empty() {
            info!(instance = %self.context, "No channels configured");
            self.last_status = MonitorStatus::Error;
            self.render_placeholder(NO_CHANNEL_TITLE);
            return;
        }

        info!(instance = %self.context, channels = ?self.channels, "Monitoring channels");
        let poll = self.config.poll_interval;
        let mut timer = interval_at(Instant::now() + poll, poll);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.poll_timer = Some(timer);

        self.refresh().await;
    }

    /// Cancel both timers. Called when the button goes away.
    pub fn stop(&mut self) {
        self.poll_timer = None;
        self.cancel_alert();
    }

    fn reset(&mut self) {
        self.stop();
        self.last_status = MonitorStatus::Unknown;
        self.last_result = None;
        self.multi_results.clear();
        self.last_collage = None;
    }

    fn cancel_alert(&mut self) {
        self.alert = None;
        self.alert_timer = None;
    }

    /// Wait for whichever timer fires next. Pending forever if none runs.
    pub async fn next_timer(&mut self) -> TimerEvent {
        tokio::select! {
            biased;
            _ = Self::tick_opt(&mut self.alert_timer) => TimerEvent::AlertTick,
            _ = Self::tick_opt(&mut self.poll_timer) => TimerEvent::Poll,
        }
    }

    async fn tick_opt(timer: &mut Option<Interval>) -> Instant {
        match timer {
            Some(timer) => timer.tick().await,
            None => std::future::pending().await,
        }
    }

    pub async fn on_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::Poll => self.refresh().await,
            TimerEvent::AlertTick => self.on_alert_tick().await,
        }
    }

    /// Poll every configured channel and update the button.
    #[instrument(skip(self), fields(instance = %self.context))]
    pub async fn refresh(&mut self) {
        match self.channels.len() {
            0 => self.render_placeholder(NO_CHANNEL_TITLE),
            1 => self.refresh_single().await,
            _ => self.refresh_multi().await,
        }
    }

    async fn refresh_single(&mut self) {
        let slug = self.channels[0].clone();
        let result = fetch(self.services.source.as_ref(), &slug).await;

        let previous = self.last_status;
        self.last_status = result.status();
        self.last_result = result.channel().cloned();
        debug!(channel = %slug, status = %self.last_status, "Channel polled");

        if previous == MonitorStatus::Offline && self.last_status == MonitorStatus::Live {
            info!(channel = %slug, "Channel went live");
            self.start_alert(BTreeSet::from([slug])).await;
        } else if !self.is_alerting() {
            self.render(false).await;
        }
    }

    async fn refresh_multi(&mut self) {
        let source = self.services.source.clone();
        let results = join_all(
            self.channels
                .iter()
                .map(|slug| fetch(source.as_ref(), slug)),
        )
        .await;

        // Not-found channels drop out of the results; the configured list
        // stays as is so single/multi mode never flips on a transient miss.
        let valid: Vec<ChannelResult> = results.into_iter().filter(|r| !r.is_not_found()).collect();

        if valid.is_empty() {
            debug!("None of the configured channels exists");
            self.last_status = MonitorStatus::NotFound;
            self.last_result = None;
            self.multi_results.clear();
            self.last_collage = None;
            if !self.is_alerting() {
                self.render_placeholder(NOT_FOUND_TITLE);
            }
            return;
        }

        let summary = aggregate(&valid);
        let went_live = detect_transitions(&self.channels, &self.multi_results, &valid);

        self.last_status = if summary.is_live {
            MonitorStatus::Live
        } else if valid.iter().all(|r| r.status() == MonitorStatus::Error) {
            MonitorStatus::Error
        } else {
            MonitorStatus::Offline
        };
        self.last_result = Some(summary);
        self.multi_results = valid;
        self.last_collage = self.build_collage(None).await;

        if !went_live.is_empty() {
            info!(channels = ?went_live, "Channels went live");
            self.start_alert(went_live).await;
        } else if !self.is_alerting() {
            self.render(false).await;
        }
    }

    async fn start_alert(&mut self, alerting: BTreeSet<String>) {
        self.alert = Some(AlertCycle::start(alerting, self.config.alert_duration));
        let tick = self.config.alert_tick;
        let mut timer = interval_at(Instant::now() + tick, tick);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.alert_timer = Some(timer);
        self.render(true).await;
    }

    /// Advance the alert cycle by one frame, ending it once its time is up.
    pub async fn on_alert_tick(&mut self) {
        let expired = match self.alert.as_mut() {
            None => {
                self.alert_timer = None;
                return;
            }
            Some(alert) if alert.is_expired(Instant::now()) => true,
            Some(alert) => {
                alert.flip();
                false
            }
        };

        if expired {
            debug!(instance = %self.context, "Alert finished");
            self.cancel_alert();
            self.render(false).await;
        } else {
            self.render(true).await;
        }
    }

    async fn render(&self, flashing: bool) {
        match self.channels.len() {
            0 => self.render_placeholder(NO_CHANNEL_TITLE),
            1 => self.render_single(flashing).await,
            _ => self.render_multi(flashing).await,
        }
    }

    fn render_placeholder(&self, title: &str) {
        self.services.surface.set_title(&self.context, title);
        self.services
            .surface
            .set_image(&self.context, offline_indicator());
    }

    async fn render_single(&self, flashing: bool) {
        let surface = &self.services.surface;
        let lit = flashing && self.alert.as_ref().is_some_and(|a| a.toggle);

        match (&self.last_result, self.last_status) {
            (Some(status), MonitorStatus::Live) => {
                surface.set_title(&self.context, "");
                let image = if lit {
                    flash_square().to_string()
                } else {
                    self.live_image(status).await
                };
                surface.set_image(&self.context, &image);
            }
            (result, status) => {
                let name = result
                    .as_ref()
                    .map(|r| r.display_name.as_str())
                    .filter(|n| !n.is_empty())
                    .unwrap_or(&self.channels[0]);
                surface.set_title(&self.context, &format!("{}\n{}", name, status.label()));
                surface.set_image(&self.context, offline_indicator());
            }
        }
    }

    async fn live_image(&self, status: &ChannelStatus) -> String {
        let Some(picture) = status.profile_image_url.as_deref() else {
            return live_indicator().to_string();
        };
        let overlay =
            TextOverlay::with_wrapped_subtitle(status.display_name.clone(), status.category.as_deref());
        match self
            .services
            .compositor
            .render(picture, true, Some(&overlay))
            .await
        {
            Ok(image) => image.to_string(),
            Err(e) => {
                warn!(instance = %self.context, error = %e, "Failed to render live image");
                live_indicator().to_string()
            }
        }
    }

    async fn render_multi(&self, flashing: bool) {
        self.services.surface.set_title(&self.context, "");

        let image = if flashing {
            self.build_collage(self.alert.as_ref()).await
        } else {
            self.last_collage.clone()
        };
        let image = image.unwrap_or_else(|| {
            let live = self.last_result.as_ref().is_some_and(|r| r.is_live);
            indicator(live).to_string()
        });
        self.services.surface.set_image(&self.context, &image);
    }

    /// Collage of the current results; tiles in `alert` use the flash fill
    /// on "on" frames.
    async fn build_collage(&self, alert: Option<&AlertCycle>) -> Option<String> {
        if self.multi_results.is_empty() {
            return None;
        }

        let items: Vec<CollageItem> = self
            .multi_results
            .iter()
            .map(|r| CollageItem {
                image: r.profile_image().map(str::to_string),
                live: r.is_live(),
                flashing: alert.is_some_and(|a| a.is_lit(&r.slug)),
            })
            .collect();
        let overlay = self
            .last_result
            .as_ref()
            .map(|s| TextOverlay::title(s.display_name.clone()))
            .filter(|o| !o.is_empty());

        match self
            .services
            .compositor
            .collage(&items, overlay.as_ref())
            .await
        {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(instance = %self.context, error = %e, "Failed to build collage");
                None
            }
        }
    }

    /// Open the live channel pages in the browser.
    ///
    /// Several pages open one after another with a short pause between them.
    pub fn key_up(&self) -> Option<JoinHandle<()>> {
        let live: Vec<&str> = if self.is_multi() {
            self.multi_results
                .iter()
                .filter(|r| r.is_live())
                .map(|r| r.slug.as_str())
                .collect()
        } else if self.last_status == MonitorStatus::Live {
            self.channels.iter().map(String::as_str).collect()
        } else {
            Vec::new()
        };

        if live.is_empty() {
            debug!(instance = %self.context, "Key up with no live channel");
            return None;
        }

        let urls: Vec<String> = live
            .iter()
            .map(|slug| channel_url(&self.config.channel_url_base, slug))
            .collect();
        let browser = self.services.browser.clone();
        let spacing = self.config.key_up_spacing;

        Some(tokio::spawn(async move {
            for (i, url) in urls.iter().enumerate() {
                if i > 0 {
                    tokio::time::sleep(spacing).await;
                }
                browser.open(url);
            }
        }))
    }
}
