//! FolderSync - folder sync scheduler and server protocol client
//!
//! Command line entry point. It initializes:
//! - Logging infrastructure (file rotation + console output)
//! - Tokio runtime (request completion tasks)
//! - Configuration store ([`ConfigManager`], `FolderSync Data/`)
//! - Protocol client ([`ProtocolClient`])
//!
//! # Execution Flow
//!
//! 1. Initialize logging → logs/foldersync.<date>
//! 2. Create tokio runtime
//! 3. Open the configuration store
//! 4. Query the configured server via `status.php` and wait for the answer
//! 5. List the stored folder definitions
//! 6. Log metrics and shut the runtime down

use anyhow::Result;
use foldersync::services::RequestId;
use foldersync::{APP_NAME, ConfigManager, ProtocolClient, ProtocolEvent, VERSION};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(30);

fn main() -> Result<()> {
    let _log_guard = foldersync::logging::setup_logging("logs", APP_NAME, false, true)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("foldersync-worker")
        .build()?;

    let config_manager = Arc::new(ConfigManager::new("FolderSync Data")?);
    tracing::info!("Configuration directory: {}", config_manager.config_dir());

    let client = ProtocolClient::new(config_manager.clone(), runtime.handle().clone())?;

    if client.is_configured() {
        let mut rx = client.subscribe();
        let request = client.check_installation()?;

        let outcome = runtime.block_on(async {
            tokio::time::timeout(DISCOVERY_TIMEOUT, wait_for_discovery(&mut rx, request)).await
        });
        match outcome {
            Ok(Some(ProtocolEvent::InstallationFound {
                url,
                version_string,
                edition,
                ..
            })) => tracing::info!(
                "Server at {} runs version {} (edition '{}')",
                url,
                version_string,
                edition
            ),
            Ok(Some(_)) => tracing::warn!("No server installation found"),
            Ok(None) => tracing::warn!("Protocol client stopped before discovery finished"),
            Err(_) => tracing::warn!(
                "No discovery answer within {}s",
                DISCOVERY_TIMEOUT.as_secs()
            ),
        }
    } else {
        tracing::warn!(
            "No server configured for connection '{}'",
            client.connection_name()
        );
    }

    let definitions = config_manager.load_folder_definitions()?;
    tracing::info!("{} folder definitions", definitions.len());
    for definition in &definitions {
        tracing::info!(
            "Folder {}: {} <-> {} ({})",
            definition.alias,
            definition.local_path,
            definition.remote_path,
            definition.backend
        );
    }

    client.metrics().log_summary();

    runtime.shutdown_timeout(Duration::from_secs(5));

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for the discovery outcome of `request`.
///
/// Returns `None` if the channel closes first.
async fn wait_for_discovery(
    rx: &mut broadcast::Receiver<ProtocolEvent>,
    request: RequestId,
) -> Option<ProtocolEvent> {
    loop {
        match rx.recv().await {
            Ok(event @ ProtocolEvent::InstallationFound { request: id, .. })
            | Ok(event @ ProtocolEvent::NoInstallationFound { request: id, .. })
                if id == request =>
            {
                return Some(event);
            }
            Ok(ProtocolEvent::SslFailed { errors, .. }) => {
                tracing::warn!("TLS verification failed: {}", errors.join(", "));
            }
            Ok(ProtocolEvent::GuiLog { title, message }) => {
                tracing::warn!("{}: {}", title, message);
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Missed {} protocol events", skipped);
            }
            Err(RecvError::Closed) => return None,
        }
    }
}
