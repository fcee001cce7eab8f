//! Entrypoint: load config, open the index store, assemble the tool
//! registry (internal + quarantine-gated external tools), run the
//! watcher's initial scan, then serve the client channel until signalled
//! to stop. Grounded on the teacher's own `main.rs` for the
//! config-load -> logging-init -> run shape, generalized with the
//! watcher/store/registry wiring `hive`'s own entrypoint does.

mod bio;
mod blastdb;
mod conductor;
mod config;
mod error;
mod ingest;
mod llm;
mod models;
mod parsers;
mod router;
mod rules;
mod server;
mod store;
mod tools;
mod watcher;

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use config::Config;
use llm::LlmPool;
use store::Store;
use tools::ToolRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(Config::load(None)?);
    tracing::info!(data_root = %config.data_root.display(), "starting hivekeep");

    let store = Store::open(&config.database_path())?;
    let llm_pool = Arc::new(LlmPool::new(config.llm.models.clone()));

    let mut registry = build_registry(store.clone(), config.clone());
    tools::factory::extend_with_external_tools(&mut registry, &config, &store).await;
    let registry = Arc::new(registry);

    let (stop_tx, stop_rx) = watch::channel(false);

    let scan_count = watcher::scan_and_ingest(&config, &store, &stop_rx).await?;
    tracing::info!(scan_count, "initial scan complete");

    let watcher_handle = {
        let config = config.clone();
        let store = store.clone();
        let stop_rx = stop_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = watcher::watch_directory(config, store, stop_rx).await {
                tracing::error!(error = %e, "watcher task ended with an error");
            }
        })
    };

    let state = server::AppState { store, config: config.clone(), registry, llm_pool };

    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("shutdown requested");
        let _ = stop_tx.send(true);
    });

    server::serve(state, stop_rx).await?;
    let _ = watcher_handle.await;
    Ok(())
}

fn build_registry(store: Store, config: Arc<Config>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(tools::search::SearchTool::new(store.clone()));
    registry.register(tools::profile::ProfileTool::new(store.clone(), config.clone()));
    registry.register(tools::extract::ExtractTool::new(store.clone()));
    registry.register(tools::features::FeaturesTool::new(store.clone()));
    registry.register(tools::primers::PrimersTool::new(store.clone()));
    registry.register(tools::blast::BlastTool::new(store, config));
    registry.register(Arc::new(tools::gc::GcTool));
    registry.register(Arc::new(tools::digest::DigestTool));
    registry.register(Arc::new(tools::translate::TranslateTool));
    registry.register(Arc::new(tools::transcribe::TranscribeTool));
    registry.register(Arc::new(tools::revcomp::RevcompTool));
    registry
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
