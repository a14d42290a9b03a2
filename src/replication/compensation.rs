use super::client::ReplicationClient;
use super::protocol::{Envelope, PeerRequest};
use super::transport::PeerError;
use crate::storage::{Collection, Document};
use crate::topology::RingScope;

use std::sync::Arc;
use thiserror::Error;

/// A write that was applied locally, together with the state it replaced.
///
/// The snapshot is captured before the mutation runs so the inverse can always be built.
#[derive(Debug, Clone, PartialEq)]
pub enum AppliedWrite {
    CollectionCreated(Collection),
    CollectionUpdated { previous: Collection },
    CollectionDeleted { previous: Collection },
    CollectionsCleared { previous: Vec<Collection> },
    DocumentCreated { collection: String, document: Document },
    DocumentUpdated { collection: String, previous: Document },
    DocumentDeleted { collection: String, previous: Document },
}

impl AppliedWrite {
    pub fn inverse(&self) -> PeerRequest {
        match self {
            AppliedWrite::CollectionCreated(collection) => PeerRequest::DeleteCollection {
                name: collection.name.clone(),
            },
            AppliedWrite::CollectionUpdated { previous } => PeerRequest::UpdateCollection {
                name: previous.name.clone(),
                collection: previous.clone(),
            },
            AppliedWrite::CollectionDeleted { previous } => {
                PeerRequest::CreateCollection(previous.clone())
            }
            AppliedWrite::CollectionsCleared { previous } => {
                PeerRequest::RestoreCollections(previous.clone())
            }
            AppliedWrite::DocumentCreated {
                collection,
                document,
            } => PeerRequest::DeleteDocument {
                collection: collection.clone(),
                key: document.key.clone(),
            },
            AppliedWrite::DocumentUpdated {
                collection,
                previous,
            } => PeerRequest::UpdateDocument {
                collection: collection.clone(),
                key: previous.key.clone(),
                document: previous.clone(),
            },
            AppliedWrite::DocumentDeleted {
                collection,
                previous,
            } => PeerRequest::CreateDocument {
                collection: collection.clone(),
                document: previous.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompensationError {
    #[error("no nodes to roll back")]
    NothingToUndo,

    #[error("rollback could not be dispatched: {0}")]
    Dispatch(#[source] PeerError),

    /// A hop of an already running rollback failed.
    #[error("rollback chain broken: {0}")]
    ChainBroken(#[source] PeerError),

    /// The inverse could not be applied on a node of the rollback chain.
    #[error("rollback not applied on {node}: {reason}")]
    LocalUndo { node: String, reason: String },
}

/// Unwinds a partially propagated write by relaying its inverse backwards.
pub struct CompensationCoordinator {
    replication: Arc<ReplicationClient>,
}

impl CompensationCoordinator {
    pub fn new(replication: Arc<ReplicationClient>) -> Self {
        Self { replication }
    }

    /// Sends the inverse of `applied` to ring-previous with `counter` hops left to undo.
    ///
    /// Fire-and-forget: the caller's request fails regardless of the outcome, and a
    /// failed dispatch is never retried.
    pub async fn compensate(
        &self,
        scope: RingScope,
        applied: &AppliedWrite,
        counter: u32,
    ) -> Result<(), CompensationError> {
        if counter == 0 {
            return Err(CompensationError::NothingToUndo);
        }

        let inverse = applied.inverse();
        tracing::info!(
            "Compensating {} hops with {} on {:?}",
            counter,
            inverse.name(),
            scope
        );

        match self
            .replication
            .relay(scope, &inverse, Envelope::rollback(counter))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::error!(
                    "Compensation with {} failed, manual intervention required: {}",
                    inverse.name(),
                    e
                );
                Err(CompensationError::Dispatch(e))
            }
        }
    }
}
