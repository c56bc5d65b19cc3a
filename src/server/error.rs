use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::registry::{LookupKind, SyncError};

/// Server error type that logs on conversion and returns a clean `{"error": ...}` body.
///
/// The client only ever sees `message`. The `source` chain and `context` fields are logged
/// for 5xx responses.
#[derive(Debug)]
pub struct ServerError {
    /// HTTP status code to return
    pub status: StatusCode,
    /// User-facing error message (returned in response)
    pub message: String,
    /// Internal error with full chain (logged but not exposed to client)
    pub source: Option<anyhow::Error>,
    /// Structured context for logging (key-value pairs)
    pub context: Vec<(&'static str, String)>,
}

impl ServerError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            source: None,
            context: Vec::new(),
        }
    }

    pub fn from_anyhow(
        source: anyhow::Error,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            message: message.into(),
            source: Some(source),
            context: Vec::new(),
        }
    }

    /// Add a context field for logging (chainable)
    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            // Structured fields only, messages may carry registry output
            if let Some(source) = &self.source {
                tracing::error!(
                    status = self.status.as_u16(),
                    message = %self.message,
                    context = ?self.context,
                    error = ?source,
                    "Server error"
                );
            } else {
                tracing::error!(
                    status = self.status.as_u16(),
                    message = %self.message,
                    context = ?self.context,
                    "Server error"
                );
            }
        } else {
            tracing::debug!(
                status = self.status.as_u16(),
                message = %self.message,
                context = ?self.context,
                "Client error"
            );
        }

        let body = Json(json!({
            "error": self.message,
        }));

        (self.status, body).into_response()
    }
}

impl From<SyncError> for ServerError {
    fn from(err: SyncError) -> Self {
        let status = match &err {
            SyncError::Configuration(_) | SyncError::AuthToken(_) => StatusCode::BAD_REQUEST,
            SyncError::RegistryLookup { source, .. } => match source.kind {
                LookupKind::NotFound => StatusCode::NOT_FOUND,
                LookupKind::Unavailable => StatusCode::INTERNAL_SERVER_ERROR,
            },
            SyncError::Transfer { .. } => StatusCode::BAD_GATEWAY,
            SyncError::Cancelled { .. } | SyncError::DeadlineExceeded { .. } => {
                StatusCode::GATEWAY_TIMEOUT
            }
        };

        let stage = err.stage().map(|s| s.to_string());
        let message = err.to_string();
        let server_error = Self::from_anyhow(err.into(), status, message);
        match stage {
            Some(stage) => server_error.with_context("stage", stage),
            None => server_error,
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        Self::from_anyhow(err, StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}
