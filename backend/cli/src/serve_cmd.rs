//! `aquadash serve`: load config, wire the provider, store and WeWork
//! client, then run the gateway until Ctrl-C.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use aquadash_channels::WeworkClient;
use aquadash_config::{config_file_path, load_and_prepare, redact};
use aquadash_gateway::{serve, AppState};
use aquadash_llm::build_provider;
use aquadash_logging::init_logger;
use aquadash_store::MemoryStore;

pub async fn run(config_path: Option<PathBuf>, port: Option<u16>) -> Result<()> {
    let path = config_file_path(config_path.as_deref());
    let mut config = load_and_prepare(&path).await?;
    if let Some(port) = port {
        config.server.port = port;
    }

    init_logger(&config.logging);
    info!(
        path = %path.display(),
        config = %redact(&serde_json::to_value(&config)?),
        "Starting aquadash"
    );

    let provider =
        build_provider(&config.llm).context("Failed to build language-model provider")?;
    info!(provider = provider.name(), model = %config.llm.model, "Language-model provider ready");

    let store = MemoryStore::new();
    if let Some(seed) = &config.data.seed_file {
        let count = store.load_seed(Path::new(seed)).await?;
        info!(seed = %seed, projects = count, "Loaded project seed");
    }

    let wework = if config.wework.has_credentials() {
        Some(WeworkClient::new(&config.wework)?)
    } else {
        if config.wework.enabled {
            warn!("WeWork login is enabled but credentials are missing; /gm stays open");
        }
        None
    };

    let mut state = AppState::new(config, provider, store);
    if let Some(client) = wework {
        info!("WeWork login and notifications enabled");
        state = state.with_wework(client);
    }

    serve(state).await
}
