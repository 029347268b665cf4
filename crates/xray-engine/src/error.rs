use thiserror::Error;
use xray_contracts::knowledge::PersistenceError;

/// Message used when every attempt of the initial analysis hit an overload.
pub const SERVICE_OVERLOADED_MESSAGE: &str =
    "The AI model is currently overloaded. Please try again later.";

const OVERLOAD_MARKERS: &[&str] = &["overloaded", "unavailable"];

/// Classification attached to every engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Ingestion,
    TransientService,
    ServiceOverloaded,
    PermanentService,
    Persistence,
    InvalidSession,
}

/// Failure reported by a [`crate::ModelClient`] for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("{provider} request failed ({status}): {body}")]
    Http {
        provider: String,
        status: u16,
        body: String,
    },
    #[error("{provider} transport failed: {message}")]
    Transport {
        provider: String,
        message: String,
        retryable: bool,
    },
    #[error("{provider} returned an unusable response: {message}")]
    InvalidResponse { provider: String, message: String },
    #[error("{0}")]
    MissingCredentials(String),
}

impl ModelError {
    /// An HTTP 503 carrying the service's overload wording.
    pub fn overloaded(provider: impl Into<String>) -> Self {
        Self::Http {
            provider: provider.into(),
            status: 503,
            body: "The model is overloaded. Please try again later. (UNAVAILABLE)".to_string(),
        }
    }

    /// True when the remote service signalled temporary overload or
    /// unavailability.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status, body, .. } => *status == 503 || has_overload_marker(body),
            Self::Transport { retryable, .. } => *retryable,
            Self::InvalidResponse { .. } | Self::MissingCredentials(_) => false,
        }
    }
}

fn has_overload_marker(text: &str) -> bool {
    let lowered = text.to_ascii_lowercase();
    OVERLOAD_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Failure reading an image during ingestion. Aborts the whole batch.
#[derive(Debug, Error)]
#[error("failed to read image '{name}': {source}")]
pub struct IngestError {
    pub name: String,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Ingestion(#[from] IngestError),
    #[error("{}", SERVICE_OVERLOADED_MESSAGE)]
    ServiceOverloaded { attempts: u32 },
    #[error(transparent)]
    Service(#[from] ModelError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("no active analysis session")]
    InvalidSession,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Ingestion(_) => ErrorKind::Ingestion,
            Self::ServiceOverloaded { .. } => ErrorKind::ServiceOverloaded,
            Self::Service(err) if err.is_transient() => ErrorKind::TransientService,
            Self::Service(_) => ErrorKind::PermanentService,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::InvalidSession => ErrorKind::InvalidSession,
        }
    }
}
