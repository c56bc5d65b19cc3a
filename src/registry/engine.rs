use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::image::{CreateImageOptions, PushImageOptions, TagImageOptions};
use bollard::Docker;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::info;

use super::credentials::RegistryCredential;
use super::error::EngineError;
use super::reference::FullyQualifiedReference;

/// One status line relayed from a pull or push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub id: Option<String>,
    pub status: String,
    pub progress: Option<String>,
}

impl std::fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(id) = &self.id {
            write!(f, "{}: ", id)?;
        }
        write!(f, "{}", self.status)?;
        if let Some(progress) = &self.progress {
            write!(f, " {}", progress)?;
        }
        Ok(())
    }
}

/// Progress of a transfer. Must be consumed to the end.
pub type ProgressStream<'a> = BoxStream<'a, Result<ProgressEvent, EngineError>>;

/// A credential packaged for one engine call.
///
/// A fresh one is built for every call that needs authentication; nothing is cached
/// between calls.
pub struct RegistryAuth {
    username: String,
    password: String,
    server_address: String,
}

impl RegistryAuth {
    pub fn package(credential: &RegistryCredential, server_address: &str) -> Self {
        Self {
            username: credential.identity().to_string(),
            password: credential.secret().to_string(),
            server_address: server_address.to_string(),
        }
    }

    /// Credentials the engine sends as `X-Registry-Auth` (base64url JSON)
    pub fn into_docker_credentials(self) -> DockerCredentials {
        DockerCredentials {
            username: Some(self.username),
            password: Some(self.password),
            serveraddress: Some(self.server_address),
            ..Default::default()
        }
    }
}

impl std::fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("server_address", &self.server_address)
            .finish()
    }
}

/// The image engine operations the sync pipeline needs
#[async_trait]
pub trait ImageEngine: Send + Sync {
    fn pull<'a>(
        &'a self,
        reference: &'a FullyQualifiedReference,
        auth: RegistryAuth,
    ) -> ProgressStream<'a>;

    async fn tag(
        &self,
        source: &FullyQualifiedReference,
        destination: &FullyQualifiedReference,
    ) -> Result<(), EngineError>;

    fn push<'a>(
        &'a self,
        reference: &'a FullyQualifiedReference,
        auth: RegistryAuth,
    ) -> ProgressStream<'a>;
}

/// Engine backed by the local Docker daemon
pub struct BollardEngine {
    docker: Docker,
}

impl BollardEngine {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Connect using `DOCKER_HOST` or the platform's default socket
    pub fn connect() -> Result<Self, EngineError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self::new(docker))
    }
}

fn to_event(
    id: Option<String>,
    status: Option<String>,
    progress: Option<String>,
    error: Option<String>,
) -> Result<ProgressEvent, EngineError> {
    if let Some(error) = error {
        return Err(EngineError::Reported(error));
    }
    Ok(ProgressEvent {
        id,
        status: status.unwrap_or_default(),
        progress,
    })
}

#[async_trait]
impl ImageEngine for BollardEngine {
    fn pull<'a>(
        &'a self,
        reference: &'a FullyQualifiedReference,
        auth: RegistryAuth,
    ) -> ProgressStream<'a> {
        info!(reference = %reference, "Pulling image");

        let options = CreateImageOptions {
            from_image: reference.repository_path(),
            tag: reference.tag().to_string(),
            ..Default::default()
        };

        self.docker
            .create_image(Some(options), None, Some(auth.into_docker_credentials()))
            .map(|result| match result {
                Ok(info) => to_event(info.id, info.status, info.progress, info.error),
                Err(e) => Err(EngineError::from(e)),
            })
            .boxed()
    }

    async fn tag(
        &self,
        source: &FullyQualifiedReference,
        destination: &FullyQualifiedReference,
    ) -> Result<(), EngineError> {
        info!(source = %source, destination = %destination, "Tagging image");

        let options = TagImageOptions {
            repo: destination.repository_path(),
            tag: destination.tag().to_string(),
        };
        self.docker
            .tag_image(&source.to_string(), Some(options))
            .await?;
        Ok(())
    }

    fn push<'a>(
        &'a self,
        reference: &'a FullyQualifiedReference,
        auth: RegistryAuth,
    ) -> ProgressStream<'a> {
        info!(reference = %reference, "Pushing image");

        let options = PushImageOptions {
            tag: reference.tag().to_string(),
        };

        self.docker
            .push_image(
                &reference.repository_path(),
                Some(options),
                Some(auth.into_docker_credentials()),
            )
            .map(|result| match result {
                Ok(info) => to_event(None, info.status, info.progress, info.error),
                Err(e) => Err(EngineError::from(e)),
            })
            .boxed()
    }
}
