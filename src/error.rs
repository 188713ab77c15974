// error.rs

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use hyper::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Invalid or missing caller input. The display text is what the client sees.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid conversationId")]
    MissingConversationId,
    #[error("Invalid sender")]
    MissingSender,
    #[error("Message cannot be empty")]
    EmptyMessage,
    #[error("User message is required")]
    MissingUserMessage,
    /// The body could not be read as the expected JSON object.
    #[error("Invalid request body")]
    MalformedBody(String),
    #[error("Invalid query parameters")]
    MalformedQuery(String),
}

impl ValidationError {
    pub fn details(&self) -> Option<String> {
        match self {
            ValidationError::MalformedBody(details) | ValidationError::MalformedQuery(details) => {
                Some(details.clone())
            }
            _ => None,
        }
    }
}

/// What went wrong underneath a store operation, as far as it can be told
/// from the failure signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreFailureKind {
    Credentials,
    ResourceNotFound,
    Unreachable { endpoint: Option<String> },
    Other,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{details}")]
pub struct StoreCause {
    pub kind: StoreFailureKind,
    pub details: String,
}

impl StoreCause {
    pub fn new(kind: StoreFailureKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            details: details.into(),
        }
    }

    pub fn other(details: impl Into<String>) -> Self {
        Self::new(StoreFailureKind::Other, details)
    }

    /// Human-facing text for the failure kind, `None` when the kind is not
    /// specific enough to say anything better than the caller's default.
    pub fn human_message(&self) -> Option<String> {
        match &self.kind {
            StoreFailureKind::Credentials => {
                Some("Database credentials not found or invalid".to_string())
            }
            StoreFailureKind::ResourceNotFound => Some("Messages table not found".to_string()),
            StoreFailureKind::Unreachable {
                endpoint: Some(endpoint),
            } => Some(format!("Cannot connect to database endpoint: {}", endpoint)),
            StoreFailureKind::Unreachable { endpoint: None } => {
                Some("Cannot connect to database endpoint".to_string())
            }
            StoreFailureKind::Other => None,
        }
    }
}

/// Errors raised by a [`crate::repositories::message_store::MessageStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Failed to write message: {0}")]
    Write(StoreCause),
    #[error("Failed to read messages: {0}")]
    Read(StoreCause),
    #[error("Invalid cursor")]
    InvalidCursor,
}

/// Errors raised by the completion API adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("Completion API key is not configured")]
    NotConfigured,
    #[error("Completion API error: {message}")]
    Upstream { status: Option<u16>, message: String },
    #[error("Completion API returned no choices")]
    EmptyResponse,
}

/// Every failure a request can end in.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Completion API is not configured")]
    UpstreamConfig(CompletionError),

    #[error("{0}")]
    Upstream(CompletionError),

    /// A store failure on the AI reply path, reported with that path's wording.
    #[error("{0}")]
    ReplyStore(StoreError),
}

impl From<CompletionError> for ChatError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::NotConfigured => ChatError::UpstreamConfig(err),
            other => ChatError::Upstream(other),
        }
    }
}

/// Body of every error response.
#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ChatError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ChatError::Validation(_) | ChatError::Store(StoreError::InvalidCursor) => {
                StatusCode::BAD_REQUEST
            }
            ChatError::Store(_) | ChatError::ReplyStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ChatError::UpstreamConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ChatError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn body(&self) -> ErrorBody {
        match self {
            ChatError::Validation(err) => ErrorBody {
                error: err.to_string(),
                details: err.details(),
            },
            ChatError::Store(err) => store_error_body(err, None),
            ChatError::ReplyStore(err) => store_error_body(
                err,
                Some("Failed to get AI response or save it to database"),
            ),
            ChatError::UpstreamConfig(err) => ErrorBody {
                error: "Completion API is not configured".to_string(),
                details: Some(err.to_string()),
            },
            ChatError::Upstream(err) => ErrorBody {
                error: "Failed to get AI response".to_string(),
                details: Some(err.to_string()),
            },
        }
    }
}

fn store_error_body(err: &StoreError, fallback: Option<&str>) -> ErrorBody {
    let (cause, default_message) = match err {
        StoreError::Write(cause) => (cause, "Failed to send message"),
        StoreError::Read(cause) => (cause, "Failed to fetch messages"),
        StoreError::InvalidCursor => {
            return ErrorBody {
                error: err.to_string(),
                details: None,
            }
        }
    };

    let error = cause
        .human_message()
        .unwrap_or_else(|| fallback.unwrap_or(default_message).to_string());

    ErrorBody {
        error,
        details: Some(cause.details.clone()),
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        (status, Json(self.body())).into_response()
    }
}
