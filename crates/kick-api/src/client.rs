use std::sync::OnceLock;
use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use tracing::debug;

pub(crate) const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Install the process-wide rustls crypto provider once.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Client builder with the defaults every kick request uses.
///
/// A zero `timeout` leaves the transport default in place.
pub fn create_client_builder(timeout: Duration) -> ClientBuilder {
    install_rustls_provider();
    let mut builder = Client::builder().user_agent(DEFAULT_UA);
    if timeout > Duration::ZERO {
        builder = builder.timeout(timeout);
    }
    builder
}

/// Client with the kick defaults and no request timeout.
pub fn default_client() -> reqwest::Result<Client> {
    create_client_builder(Duration::ZERO).build()
}
