use super::types::{Node, Topology};
use crate::replication::protocol::Envelope;

use siphasher::sip::SipHasher24;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Which ring a write travels along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingScope {
    /// Every node of every group. Used for collections.
    Cluster,
    /// The nodes of one shard. Used for documents.
    Group(u32),
}

/// Next step of a chain relay.
#[derive(Debug, Clone, PartialEq)]
pub enum Hop<'a> {
    /// Chain is complete (forward) or fully unwound (rollback).
    Stop,
    Send { target: &'a Node, envelope: Envelope },
}

#[derive(Debug, Clone)]
pub struct ShardRouter {
    topology: Arc<Topology>,
}

impl ShardRouter {
    pub fn new(topology: Arc<Topology>) -> Self {
        Self { topology }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn local_node(&self) -> &Node {
        self.topology.local_node()
    }

    /// Owning group of an id. SipHash-2-4 with fixed keys keeps the mapping identical
    /// on every node and across restarts.
    pub fn shard_for(&self, id: &str) -> u32 {
        let mut hasher = SipHasher24::new();
        id.hash(&mut hasher);
        let hash = hasher.finish();
        (hash % self.topology.group_count() as u64) as u32
    }

    pub fn document_id(collection: &str, key: &str) -> String {
        format!("{}/{}", collection, key)
    }

    pub fn owner_group(&self, collection: &str, key: &str) -> u32 {
        self.shard_for(&Self::document_id(collection, key))
    }

    pub fn is_owning_group(&self, id: &str) -> bool {
        self.shard_for(id) == self.local_node().group
    }

    pub fn local_group(&self) -> RingScope {
        RingScope::Group(self.local_node().group)
    }

    pub fn ring(&self, scope: RingScope) -> &[usize] {
        match scope {
            RingScope::Cluster => self.topology.cluster_ring(),
            RingScope::Group(group) => self.topology.group_ring(group),
        }
    }

    /// Number of hops a chain along `scope` can take, counting its first node.
    pub fn ring_size(&self, scope: RingScope) -> usize {
        self.ring(scope).len()
    }

    pub fn local_position(&self, scope: RingScope) -> Option<usize> {
        let local = self.topology.local_index();
        self.ring(scope).iter().position(|&idx| idx == local)
    }

    pub fn next(&self, scope: RingScope) -> Option<&Node> {
        let ring = self.ring(scope);
        let position = self.local_position(scope)?;
        Some(self.topology.node(ring[(position + 1) % ring.len()]))
    }

    pub fn previous(&self, scope: RingScope) -> Option<&Node> {
        let ring = self.ring(scope);
        let position = self.local_position(scope)?;
        Some(self.topology.node(ring[(position + ring.len() - 1) % ring.len()]))
    }

    /// Applies the relay termination rules to an inbound envelope.
    ///
    /// Forward chains stop once the counter reaches `ring_size - 1`; rollback chains stop
    /// at zero. Otherwise the envelope moves one step in its direction.
    pub fn next_hop(&self, scope: RingScope, envelope: &Envelope) -> Hop<'_> {
        let ring_size = self.ring(scope).len() as u32;

        let (target, counter) = if envelope.rollback {
            if envelope.counter == 0 {
                return Hop::Stop;
            }
            (self.previous(scope), envelope.counter - 1)
        } else {
            let counter = envelope.counter.saturating_add(1);
            if counter >= ring_size {
                return Hop::Stop;
            }
            (self.next(scope), counter)
        };

        match target {
            Some(target) => Hop::Send {
                target,
                envelope: Envelope {
                    counter,
                    rollback: envelope.rollback,
                },
            },
            None => {
                tracing::warn!(
                    "Local node {} is not a member of ring {:?}, relay stops here",
                    self.local_node().name,
                    scope
                );
                Hop::Stop
            }
        }
    }

    /// Ring members other than the local node, in ring order starting after it.
    pub fn peers(&self, scope: RingScope) -> Vec<&Node> {
        let ring = self.ring(scope);
        let start = self.local_position(scope).map(|p| p + 1).unwrap_or(0);
        let local = self.topology.local_index();

        (0..ring.len())
            .map(|offset| ring[(start + offset) % ring.len()])
            .filter(|&idx| idx != local)
            .map(|idx| self.topology.node(idx))
            .collect()
    }

    pub fn group_members(&self, group: u32) -> Vec<&Node> {
        self.topology
            .group_ring(group)
            .iter()
            .map(|&idx| self.topology.node(idx))
            .collect()
    }

    /// First node of a group's ring; redirected writes enter the chain here.
    pub fn entry_node(&self, group: u32) -> Option<&Node> {
        self.topology
            .group_ring(group)
            .first()
            .map(|&idx| self.topology.node(idx))
    }

    pub fn other_groups(&self) -> Vec<u32> {
        let local = self.local_node().group;
        (0..self.topology.group_count() as u32)
            .filter(|&group| group != local)
            .collect()
    }
}
