use crate::cache::CacheError;
use crate::replication::protocol::ErrorResponse;
use crate::replication::{CompensationError, PeerError, ReplicationError};
use crate::storage::{IdentifierError, StorageError};

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Storage failed on a relay hop before this node changed anything.
    #[error("nothing applied: {0}")]
    NotApplied(StorageError),

    #[error("replication failed: {0}")]
    PeerUnavailable(PeerError),

    #[error("{0}")]
    GroupUnavailable(String),

    #[error("compensation failed: {0}")]
    Compensation(#[from] CompensationError),
}

/// What a caller can do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    ClientInput,
    NotFound,
    /// A relay hop failed before applying; the sender still has to unwind its prefix.
    NotApplied,
    /// The only class worth retrying.
    ServiceUnavailable,
}

impl ErrorClass {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorClass::ClientInput => StatusCode::BAD_REQUEST,
            ErrorClass::NotFound => StatusCode::NOT_FOUND,
            ErrorClass::NotApplied => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorClass::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn is_retryable(&self) -> bool {
        *self == ErrorClass::ServiceUnavailable
    }
}

impl ServiceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ServiceError::Validation(_) => ErrorClass::ClientInput,
            ServiceError::NotFound(_) => ErrorClass::NotFound,
            ServiceError::NotApplied(_) => ErrorClass::NotApplied,
            ServiceError::Storage(_)
            | ServiceError::PeerUnavailable(_)
            | ServiceError::GroupUnavailable(_)
            | ServiceError::Compensation(_) => ErrorClass::ServiceUnavailable,
        }
    }

    /// Translates a peer's answer to a forwarded request, keeping its meaning intact.
    pub fn from_peer(error: PeerError) -> Self {
        match error {
            PeerError::BadRequest { message, .. } => ServiceError::Validation(message),
            PeerError::NotFound { message, .. } => ServiceError::NotFound(message),
            other => ServiceError::PeerUnavailable(other),
        }
    }
}

/// Maps a failure hit before the local apply. Past the first hop a storage error
/// becomes `NotApplied`, so the sender undoes its own write and compensates the rest.
pub(super) fn before_apply<E: Into<ServiceError>>(counter: u32) -> impl Fn(E) -> ServiceError {
    move |e| match e.into() {
        ServiceError::Storage(e) if counter > 0 => ServiceError::NotApplied(e),
        other => other,
    }
}

impl From<CacheError> for ServiceError {
    fn from(e: CacheError) -> Self {
        ServiceError::Validation(e.to_string())
    }
}

impl From<IdentifierError> for ServiceError {
    fn from(e: IdentifierError) -> Self {
        ServiceError::Validation(e.to_string())
    }
}

impl From<ReplicationError> for ServiceError {
    fn from(e: ReplicationError) -> Self {
        match e {
            ReplicationError::Rejected(peer) => ServiceError::from_peer(peer),
            unavailable @ ReplicationError::GroupUnavailable { .. } => {
                ServiceError::GroupUnavailable(unavailable.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        ServiceError::PeerUnavailable(PeerError::Decode {
            node: "peer".to_string(),
            reason: e.to_string(),
        })
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.class().status();
        let body = ErrorResponse {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
