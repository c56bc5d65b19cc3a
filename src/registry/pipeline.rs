//! Pull → tag → push promotion of an image to a new tag in the same repository.

use futures::StreamExt;
use tracing::{debug, info, warn};

use super::config::SyncConfig;
use super::credentials::CredentialProvider;
use super::engine::{ImageEngine, ProgressEvent, ProgressStream, RegistryAuth};
use super::error::{Stage, SyncError};
use super::reference::FullyQualifiedReference;
use super::scope::OperationScope;

/// States of a single promotion run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Authenticating,
    Pulling,
    Tagging,
    Pushing,
    Done,
    Failed,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncState::Idle => write!(f, "Idle"),
            SyncState::Authenticating => write!(f, "Authenticating"),
            SyncState::Pulling => write!(f, "Pulling"),
            SyncState::Tagging => write!(f, "Tagging"),
            SyncState::Pushing => write!(f, "Pushing"),
            SyncState::Done => write!(f, "Done"),
            SyncState::Failed => write!(f, "Failed"),
        }
    }
}

pub fn is_terminal(state: SyncState) -> bool {
    matches!(state, SyncState::Done | SyncState::Failed)
}

pub fn is_valid_transition(from: SyncState, to: SyncState) -> bool {
    use SyncState::*;

    match (from, to) {
        (from, _) if is_terminal(from) => false,

        (Idle, Authenticating) => true,
        (Authenticating, Pulling) => true,
        (Pulling, Tagging) => true,
        (Tagging, Pushing) => true,
        (Pushing, Done) => true,

        (_, Failed) => true,

        _ => false,
    }
}

/// Request to promote `{repository}:{tag}` to the configured promote tag
#[derive(Debug, Clone)]
pub struct PromoteRequest {
    pub region: String,
    pub repository: String,
    pub tag: String,
    pub account_id: String,
}

/// What a completed run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub source: String,
    pub destination: String,
    pub pull_events: usize,
    pub push_events: usize,
    pub state: SyncState,
}

/// Receives progress lines as they are drained from the engine
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, stage: Stage, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(Stage, &ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, stage: Stage, event: &ProgressEvent) {
        self(stage, event)
    }
}

/// Sink that drops events; they are still logged at debug level
pub struct DiscardProgress;

impl ProgressSink for DiscardProgress {
    fn on_progress(&self, _stage: Stage, _event: &ProgressEvent) {}
}

/// Consume a progress stream to the end; the stream is released when this returns
async fn drain(
    stage: Stage,
    scope: &OperationScope,
    mut stream: ProgressStream<'_>,
    progress: &dyn ProgressSink,
) -> Result<usize, SyncError> {
    scope
        .run(stage, async move {
            let mut events = 0usize;
            while let Some(event) = stream.next().await {
                let event = event.map_err(|e| SyncError::transfer(stage, e))?;
                events += 1;
                debug!(%stage, "{}", event);
                progress.on_progress(stage, &event);
            }
            Ok(events)
        })
        .await
}

/// Runs promotions against a credential provider and an image engine.
///
/// A pipeline may be run repeatedly; each run starts again from `Idle`, acquires its own
/// credential and drops it when the run ends. Failed runs are not rolled back.
pub struct SyncPipeline<'a> {
    credentials: &'a dyn CredentialProvider,
    engine: &'a dyn ImageEngine,
    config: &'a SyncConfig,
    state: SyncState,
}

impl<'a> SyncPipeline<'a> {
    pub fn new(
        credentials: &'a dyn CredentialProvider,
        engine: &'a dyn ImageEngine,
        config: &'a SyncConfig,
    ) -> Self {
        Self {
            credentials,
            engine,
            config,
            state: SyncState::Idle,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> SyncState {
        self.state
    }

    fn transition(&mut self, to: SyncState) {
        if !is_valid_transition(self.state, to) {
            warn!(from = %self.state, to = %to, "Unexpected sync state transition");
        }
        debug!(from = %self.state, to = %to, "Sync state transition");
        self.state = to;
    }

    pub async fn run(
        &mut self,
        request: &PromoteRequest,
        scope: &OperationScope,
        progress: &dyn ProgressSink,
    ) -> Result<SyncReport, SyncError> {
        if is_terminal(self.state) {
            self.state = SyncState::Idle;
        }

        let result = self.execute(request, scope, progress).await;
        if let Err(e) = &result {
            warn!(
                state = %self.state,
                repository = %request.repository,
                tag = %request.tag,
                error = %e,
                "Promotion failed"
            );
            self.transition(SyncState::Failed);
        }
        result
    }

    async fn execute(
        &mut self,
        request: &PromoteRequest,
        scope: &OperationScope,
        progress: &dyn ProgressSink,
    ) -> Result<SyncReport, SyncError> {
        let engine = self.engine;
        let credentials = self.credentials;
        let config = self.config;

        self.transition(SyncState::Authenticating);
        config.validate()?;
        let source = FullyQualifiedReference::new(
            config,
            &request.account_id,
            &request.region,
            &request.repository,
            &request.tag,
        )?;
        let destination = source.with_tag(&config.promote_tag);

        let credential = scope
            .run(
                Stage::Authenticating,
                credentials.acquire(&request.region, config),
            )
            .await?;

        self.transition(SyncState::Pulling);
        let pull_events = drain(
            Stage::Pulling,
            scope,
            engine.pull(&source, RegistryAuth::package(&credential, source.registry())),
            progress,
        )
        .await?;

        self.transition(SyncState::Tagging);
        scope
            .run(Stage::Tagging, async {
                engine
                    .tag(&source, &destination)
                    .await
                    .map_err(|e| SyncError::transfer(Stage::Tagging, e))
            })
            .await?;

        self.transition(SyncState::Pushing);
        let push_events = drain(
            Stage::Pushing,
            scope,
            engine.push(
                &destination,
                RegistryAuth::package(&credential, destination.registry()),
            ),
            progress,
        )
        .await?;
        drop(credential);

        self.transition(SyncState::Done);
        info!(
            source = %source,
            destination = %destination,
            pull_events,
            push_events,
            "Promotion complete"
        );

        Ok(SyncReport {
            source: source.to_string(),
            destination: destination.to_string(),
            pull_events,
            push_events,
            state: SyncState::Done,
        })
    }
}
