//! Side-effect interfaces the core needs from the host.

use async_trait::async_trait;

use crate::credentials::CredentialError;

/// Title/image output of one button instance.
///
/// Calls are fire-and-forget; delivery failures are the host's concern.
pub trait ButtonSurface: Send + Sync {
    fn set_title(&self, context: &str, title: &str);
    fn set_image(&self, context: &str, image: &str);
}

/// Opens a URL in the operator's browser.
pub trait BrowserOpener: Send + Sync {
    fn open(&self, url: &str);
}

/// External OAuth login flow.
///
/// Completes once the new credential record has been written to storage.
#[async_trait]
pub trait AuthFlow: Send + Sync {
    async fn start(&self) -> Result<(), CredentialError>;
}
