use crate::registry::{
    BollardEngine, CatalogProvider, CredentialProvider, EcrCatalogProvider, EcrCredentialProvider,
    ImageEngine, SyncConfig,
};
use crate::server::settings::Settings;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared state for HTTP handlers.
///
/// Holds no per-request data: every handler builds its own scope and pipeline, so requests
/// never share credentials or state-machine state.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub sync_config: Arc<SyncConfig>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub catalogs: Arc<dyn CatalogProvider>,
    pub engine: Arc<dyn ImageEngine>,
    /// Cancelled on SIGINT/SIGTERM; request scopes are children of it
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        settings: Settings,
        credentials: Arc<dyn CredentialProvider>,
        catalogs: Arc<dyn CatalogProvider>,
        engine: Arc<dyn ImageEngine>,
    ) -> Self {
        let sync_config = settings.registry.sync_config();
        Self {
            settings: Arc::new(settings),
            sync_config: Arc::new(sync_config),
            credentials,
            catalogs,
            engine,
            shutdown: CancellationToken::new(),
        }
    }

    /// Wire the AWS-backed providers and the local Docker engine
    pub fn new_for_server(settings: &Settings) -> Result<Self> {
        let engine = BollardEngine::connect().context("Failed to connect to Docker engine")?;
        tracing::info!("Docker engine client initialized");

        Ok(Self::new(
            settings.clone(),
            Arc::new(EcrCredentialProvider),
            Arc::new(EcrCatalogProvider),
            Arc::new(engine),
        ))
    }
}
