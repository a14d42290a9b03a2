use super::entity::EntityService;
use super::error::ErrorClass;
use crate::replication::protocol::PeerMessage;
use crate::replication::{PeerError, PeerTransport};
use crate::topology::Node;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::{Arc, Weak};

/// In-process `PeerTransport` connecting several `EntityService`s without sockets.
///
/// Services are held weakly since each of them owns this transport in turn. Nodes can
/// be switched off to simulate crashes; every delivery attempt is logged.
#[derive(Default)]
pub struct LoopbackTransport {
    nodes: DashMap<String, Weak<EntityService>>,
    down: DashSet<String>,
    sent: Mutex<Vec<(String, PeerMessage)>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, service: &Arc<EntityService>) {
        self.nodes
            .insert(service.local_name().to_string(), Arc::downgrade(service));
    }

    pub fn set_down(&self, name: &str) {
        tracing::info!("Loopback node {} marked down", name);
        self.down.insert(name.to_string());
    }

    pub fn set_up(&self, name: &str) {
        self.down.remove(name);
    }

    /// Every delivery attempt so far as `(target, message)`, including failed ones.
    pub fn sent(&self) -> Vec<(String, PeerMessage)> {
        self.sent.lock().clone()
    }

    pub fn clear_log(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl PeerTransport for LoopbackTransport {
    async fn send(&self, target: &Node, message: PeerMessage) -> Result<Value, PeerError> {
        self.sent.lock().push((target.name.clone(), message.clone()));

        if self.down.contains(&target.name) {
            return Err(PeerError::Connection {
                node: target.name.clone(),
                reason: "node is down".to_string(),
            });
        }

        let service = self
            .nodes
            .get(&target.name)
            .and_then(|entry| entry.value().upgrade())
            .ok_or_else(|| PeerError::Connection {
                node: target.name.clone(),
                reason: "node is not registered".to_string(),
            })?;

        service.handle(message).await.map_err(|e| {
            let node = target.name.clone();
            let message = e.to_string();
            match e.class() {
                ErrorClass::ClientInput => PeerError::BadRequest { node, message },
                ErrorClass::NotFound => PeerError::NotFound { node, message },
                ErrorClass::NotApplied => PeerError::NotApplied { node, message },
                ErrorClass::ServiceUnavailable => PeerError::Unavailable { node, message },
            }
        })
    }
}
