use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use kick_api::StatusResolver;
use kick_api::client::create_client_builder;
use kick_deck::compositor::ImageCompositor;
use kick_deck::config::DeckConfig;
use kick_deck::credentials::{BackendTargets, HttpTokenEndpoint, TokenManager, select_backend};
use kick_deck::host::{CommandSink, InMemorySettings, PluginService, write_commands};
use kick_deck::logging::init_logging;
use kick_deck::monitor::{MonitorRegistry, MonitorServices};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = DeckConfig::from_env()?;

    let (logging, _guard) = init_logging(config.log_dir.as_deref(), config.log_filter.as_deref())?;
    let cancel = CancellationToken::new();
    logging.start_retention_cleanup(cancel.child_token());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        storage = %config.storage,
        "kick-deck starting"
    );

    let (sink, commands) = CommandSink::channel();
    let settings = Arc::new(InMemorySettings::mirrored(json!({}), sink.clone()));

    let storage = select_backend(
        config.storage,
        BackendTargets {
            file_path: config.credentials_path.clone(),
            settings: settings.clone(),
        },
    )?;

    let client = create_client_builder(config.http_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let tokens = Arc::new(TokenManager::new(
        storage,
        Arc::new(HttpTokenEndpoint::new(client.clone())),
    ));
    let resolver = StatusResolver::with_client(client.clone(), config.resolver(), tokens.clone());
    let compositor = Arc::new(ImageCompositor::new(client, config.cache()));

    let sink = Arc::new(sink);
    let services = MonitorServices {
        source: Arc::new(resolver),
        compositor,
        surface: sink.clone(),
        browser: sink.clone(),
    };
    let registry = Arc::new(MonitorRegistry::new(
        config.monitor(),
        services,
        cancel.child_token(),
    ));
    let service = PluginService::new(registry.clone(), tokens, sink).with_settings(settings);

    let writer = tokio::spawn(write_commands(commands, tokio::io::stdout()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => service.handle_line(&line).await,
                Ok(None) => {
                    info!("Host closed the event stream");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Failed to read host event");
                    break;
                }
            },
        }
    }

    registry.shutdown().await;
    cancel.cancel();
    drop(service);
    drop(registry);
    match tokio::time::timeout(std::time::Duration::from_secs(2), writer).await {
        Ok(Ok(Err(e))) => warn!(error = %e, "Host command writer failed"),
        Ok(Err(e)) => warn!(error = %e, "Host command writer panicked"),
        Err(_) => warn!("Timed out flushing host commands"),
        Ok(Ok(Ok(()))) => {}
    }

    info!("kick-deck stopped");
    Ok(())
}
