use thiserror::Error;

use super::token::TokenError;

/// Step of an enumeration or pipeline run at which an error surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Authenticating,
    Pulling,
    Tagging,
    Pushing,
    ListingRepositories,
    ListingImages,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Authenticating => write!(f, "authenticating"),
            Stage::Pulling => write!(f, "pulling"),
            Stage::Tagging => write!(f, "tagging"),
            Stage::Pushing => write!(f, "pushing"),
            Stage::ListingRepositories => write!(f, "listing repositories"),
            Stage::ListingImages => write!(f, "listing images"),
        }
    }
}

/// Problems with the authorization data returned by the registry's identity layer
#[derive(Debug, Error)]
pub enum AuthTokenError {
    #[error("failed to retrieve registry authorization token: {0}")]
    Request(String),

    #[error("registry returned no authorization data")]
    Empty,

    #[error("registry returned {0} authorization entries, expected exactly one")]
    Multiple(usize),

    #[error("registry authorization token is null")]
    NullToken,

    #[error(transparent)]
    Decode(#[from] TokenError),
}

/// Whether a failed listing call means "does not exist" or "could not ask"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    NotFound,
    Unavailable,
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct LookupError {
    pub kind: LookupKind,
    pub message: String,
}

impl LookupError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: LookupKind::NotFound,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: LookupKind::Unavailable,
            message: message.into(),
        }
    }
}

/// Failures reported by the image engine (pull, tag, push)
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("docker engine error: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// The engine accepted the request but reported a failure in the progress stream
    #[error("{0}")]
    Reported(String),
}

/// Error taxonomy for credential acquisition, enumeration and the sync pipeline.
///
/// Every variant can name the stage it failed in, so callers at the request boundary can
/// tell which step went wrong without parsing messages.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    AuthToken(#[from] AuthTokenError),

    #[error("registry lookup failed while {stage}: {source}")]
    RegistryLookup {
        stage: Stage,
        #[source]
        source: LookupError,
    },

    #[error("transfer failed while {stage}: {source}")]
    Transfer {
        stage: Stage,
        #[source]
        source: EngineError,
    },

    #[error("operation cancelled while {stage}")]
    Cancelled { stage: Stage },

    #[error("deadline exceeded while {stage}")]
    DeadlineExceeded { stage: Stage },
}

impl SyncError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn lookup(stage: Stage, source: LookupError) -> Self {
        Self::RegistryLookup { stage, source }
    }

    pub fn transfer(stage: Stage, source: impl Into<EngineError>) -> Self {
        Self::Transfer {
            stage,
            source: source.into(),
        }
    }

    /// Stage the error surfaced in, if it is tied to one
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SyncError::Configuration(_) => None,
            SyncError::AuthToken(_) => Some(Stage::Authenticating),
            SyncError::RegistryLookup { stage, .. }
            | SyncError::Transfer { stage, .. }
            | SyncError::Cancelled { stage }
            | SyncError::DeadlineExceeded { stage } => Some(*stage),
        }
    }
}
