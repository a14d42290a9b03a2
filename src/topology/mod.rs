//! Static Cluster Topology
//!
//! The cluster layout is loaded once at startup and never changes afterwards.
//!
//! ## Core Concepts
//! - **Groups**: Nodes are partitioned into shards ("groups") numbered `0..group_count`.
//! - **Rings**: Each group's configured node order is its replication ring. Collections use
//!   a flattened ring spanning every node of every group.
//! - **Routing**: `ShardRouter` hashes a document id to its owning group and computes the
//!   ring neighbours used by the chain-relay protocol.
//!
//! Nodes are referenced by their index in the topology arena, never by address.

pub mod loader;
pub mod router;
pub mod types;

pub use router::{Hop, RingScope, ShardRouter};
pub use types::{Node, Topology, TopologyConfig, TopologyError};
