//! One client session: REST client, reconcilers, router and push channel
//! wired together.

use std::sync::Arc;

use crate::api::{ArtforgeApi, JobApi};
use crate::channel::ChannelTarget;
use crate::config::SyncConfig;
use crate::connection::{ConnectionManager, ConnectionStatus};
use crate::error::SyncError;
use crate::reconcile::{GenerationReconciler, RemoveBgReconciler, TrainingReconciler};
use crate::router::MessageRouter;
use crate::style::StyleActivity;

pub struct SyncSession {
    pub api: Arc<ArtforgeApi>,
    pub styles: Arc<StyleActivity>,
    pub generation: Arc<GenerationReconciler>,
    pub training: Arc<TrainingReconciler>,
    pub remove_bg: Arc<RemoveBgReconciler>,
    connection: ConnectionManager,
}

impl std::fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession").finish_non_exhaustive()
    }
}

impl SyncSession {
    /// Build a session against the configured origin. No connection is
    /// made until [`start`](Self::start).
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        let api = Arc::new(ArtforgeApi::new(&config.origin, config.request_timeout)?);
        let target = ChannelTarget::from_origin(&config.origin, &config.channel_path)?;

        let styles = Arc::new(StyleActivity::new());
        let job_api: Arc<dyn JobApi> = api.clone();

        let generation = Arc::new(GenerationReconciler::new(job_api.clone(), styles.clone()));
        let training = Arc::new(TrainingReconciler::new(job_api.clone()));
        let remove_bg = Arc::new(RemoveBgReconciler::new(job_api));

        let router = Arc::new(MessageRouter::new(
            generation.clone(),
            training.clone(),
            remove_bg.clone(),
        ));
        let connection = ConnectionManager::new(target, config.connection.clone(), router);

        Ok(Self {
            api,
            styles,
            generation,
            training,
            remove_bg,
            connection,
        })
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    /// Open the push channel.
    pub fn start(&mut self) {
        tracing::info!(url = %self.connection.target().url(), "Starting sync session");
        self.connection.connect();
    }

    /// Close the push channel and stop reconnecting.
    pub async fn shutdown(&mut self) {
        self.connection.shutdown().await;
    }
}
