use super::protocol::{Envelope, PeerMessage, PeerRequest, RequestContext};
use super::transport::{PeerError, PeerTransport};
use crate::topology::{Hop, Node, RingScope, ShardRouter};

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReplicationError {
    #[error("no node of {scope} answered ({attempts} tried)")]
    GroupUnavailable { scope: String, attempts: usize },

    /// A peer answered with a definitive rejection (bad request or not found).
    #[error(transparent)]
    Rejected(PeerError),
}

/// Single-hop relay, redirect and fan-out reads on top of a `PeerTransport`.
pub struct ReplicationClient {
    router: ShardRouter,
    transport: Arc<dyn PeerTransport>,
}

impl ReplicationClient {
    pub fn new(router: ShardRouter, transport: Arc<dyn PeerTransport>) -> Self {
        Self { router, transport }
    }

    pub fn router(&self) -> &ShardRouter {
        &self.router
    }

    /// Sends `request` one step along `scope`'s ring.
    ///
    /// Returns the name of the node it was delivered to, or `None` when the chain is
    /// complete. A down neighbour is never skipped; its failure is returned as-is.
    pub async fn relay(
        &self,
        scope: RingScope,
        request: &PeerRequest,
        envelope: Envelope,
    ) -> Result<Option<String>, PeerError> {
        match self.router.next_hop(scope, &envelope) {
            Hop::Stop => {
                tracing::debug!(
                    "{} chain ends at {} (counter={}, rollback={})",
                    request.name(),
                    self.router.local_node().name,
                    envelope.counter,
                    envelope.rollback
                );
                Ok(None)
            }
            Hop::Send { target, envelope } => {
                let message = PeerMessage::new(request.clone(), RequestContext::relay(envelope));
                self.transport.send(target, message).await?;
                tracing::debug!(
                    "{} relayed {} -> {} (counter={}, rollback={})",
                    request.name(),
                    self.router.local_node().name,
                    target.name,
                    envelope.counter,
                    envelope.rollback
                );
                Ok(Some(target.name.clone()))
            }
        }
    }

    /// Hands a document write to the first node of its owning group.
    pub async fn redirect(&self, group: u32, request: &PeerRequest) -> Result<Value, PeerError> {
        let target = self.router.entry_node(group).ok_or_else(|| PeerError::Connection {
            node: format!("group {}", group),
            reason: "group has no nodes".to_string(),
        })?;

        tracing::info!(
            "Redirecting {} from {} to {} (group {})",
            request.name(),
            self.router.local_node().name,
            target.name,
            group
        );

        let message = PeerMessage::new(request.clone(), RequestContext::default());
        self.transport.send(target, message).await
    }

    /// Fallback read across the other members of `scope`, one at a time in ring order.
    pub async fn read_from_peers(
        &self,
        scope: RingScope,
        request: &PeerRequest,
    ) -> Result<Value, ReplicationError> {
        let peers = self.router.peers(scope);
        self.first_answer(&peers, request, RequestContext::replica_read(), format!("{:?}", scope))
            .await
    }

    /// Read served by the owning group when the local node does not hold the shard.
    pub async fn read_owner_group(
        &self,
        group: u32,
        request: &PeerRequest,
    ) -> Result<Value, ReplicationError> {
        let members = self.router.group_members(group);
        self.first_answer(
            &members,
            request,
            RequestContext::replica_read(),
            format!("group {}", group),
        )
        .await
    }

    /// Collects one answer from every group except the local one.
    ///
    /// All or nothing: a group without any responsive node fails the whole call.
    pub async fn gather_other_groups(
        &self,
        request: &PeerRequest,
    ) -> Result<Vec<Value>, ReplicationError> {
        let mut answers = Vec::new();
        for group in self.router.other_groups() {
            let members = self.router.group_members(group);
            let answer = self
                .first_answer(
                    &members,
                    request,
                    RequestContext::group_read(),
                    format!("group {}", group),
                )
                .await?;
            answers.push(answer);
        }
        Ok(answers)
    }

    async fn first_answer(
        &self,
        candidates: &[&Node],
        request: &PeerRequest,
        context: RequestContext,
        scope: String,
    ) -> Result<Value, ReplicationError> {
        for node in candidates {
            let message = PeerMessage::new(request.clone(), context);
            match self.transport.send(node, message).await {
                Ok(value) => {
                    tracing::debug!("{} answered by {}", request.name(), node.name);
                    return Ok(value);
                }
                Err(e) if e.is_answer() => return Err(ReplicationError::Rejected(e)),
                Err(e) => {
                    tracing::warn!("{} failed on {}, trying next: {}", request.name(), node.name, e);
                }
            }
        }

        tracing::error!("{} could not be served by {}", request.name(), scope);
        Err(ReplicationError::GroupUnavailable {
            scope,
            attempts: candidates.len(),
        })
    }
}
