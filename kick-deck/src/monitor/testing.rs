//! Test doubles for monitor tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use kick_api::client::default_client;
use kick_api::{ChannelStatus, Lookup, StatusError, StatusSource, normalize_slug};
use parking_lot::Mutex;

use crate::compositor::{CacheConfig, ImageCompositor};
use crate::host::{BrowserOpener, ButtonSurface};

use super::button::MonitorServices;

#[derive(Clone)]
enum Reply {
    Found(ChannelStatus),
    Fail(u16),
}

/// Status source answering from a mutable table. Unknown slugs are not found.
#[derive(Default)]
pub struct FakeSource {
    replies: Mutex<HashMap<String, Reply>>,
    calls: AtomicUsize,
}

impl FakeSource {
    pub fn set(&self, slug: &str, name: &str, live: bool) {
        let status = ChannelStatus {
            is_live: live,
            display_name: name.to_string(),
            profile_image_url: Some(format!("data:image/png;base64,{slug}")),
            live_status_text: live.then(|| "LIVE".to_string()),
            viewer_count: live.then_some(42),
            category: Some("Just Chatting".to_string()),
        };
        self.replies
            .lock()
            .insert(slug.to_string(), Reply::Found(status));
    }

    pub fn fail(&self, slug: &str, status: u16) {
        self.replies
            .lock()
            .insert(slug.to_string(), Reply::Fail(status));
    }

    pub fn remove(&self, slug: &str) {
        self.replies.lock().remove(slug);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSource for FakeSource {
    async fn fetch_status(&self, slug: &str) -> Result<Lookup, StatusError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().get(&normalize_slug(slug)).cloned();
        match reply {
            Some(Reply::Found(status)) => Ok(Lookup::Found(status)),
            Some(Reply::Fail(status)) => Err(StatusError::Http { status }),
            None => Ok(Lookup::NotFound),
        }
    }
}

#[derive(Default)]
pub struct RecordingSurface {
    pub titles: Mutex<Vec<String>>,
    pub images: Mutex<Vec<String>>,
}

impl RecordingSurface {
    pub fn last_title(&self) -> Option<String> {
        self.titles.lock().last().cloned()
    }

    pub fn last_image(&self) -> Option<String> {
        self.images.lock().last().cloned()
    }

    pub fn image_count(&self) -> usize {
        self.images.lock().len()
    }
}

impl ButtonSurface for RecordingSurface {
    fn set_title(&self, _context: &str, title: &str) {
        self.titles.lock().push(title.to_string());
    }

    fn set_image(&self, _context: &str, image: &str) {
        self.images.lock().push(image.to_string());
    }
}

#[derive(Default)]
pub struct RecordingBrowser {
    pub opened: Mutex<Vec<String>>,
}

impl BrowserOpener for RecordingBrowser {
    fn open(&self, url: &str) {
        self.opened.lock().push(url.to_string());
    }
}

pub struct Harness {
    pub source: Arc<FakeSource>,
    pub surface: Arc<RecordingSurface>,
    pub browser: Arc<RecordingBrowser>,
    pub services: MonitorServices,
}

pub fn harness() -> Harness {
    let source = Arc::new(FakeSource::default());
    let surface = Arc::new(RecordingSurface::default());
    let browser = Arc::new(RecordingBrowser::default());
    let services = MonitorServices {
        source: source.clone(),
        compositor: Arc::new(ImageCompositor::new(
            default_client().unwrap(),
            CacheConfig::default(),
        )),
        surface: surface.clone(),
        browser: browser.clone(),
    };
    Harness {
        source,
        surface,
        browser,
        services,
    }
}
