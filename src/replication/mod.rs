//! Chain Replication
//!
//! Moves writes between nodes one hop at a time and undoes them when a hop fails.
//!
//! ## Core Concepts
//! - **Relay**: after applying a write locally, a node forwards it to exactly one ring
//!   neighbour, carrying a hop counter in the `Envelope`.
//! - **Reads**: local misses fall back to peers sequentially; list requests gather one
//!   answer per group.
//! - **Compensation**: a failed hop sends the inverse write backwards through the nodes
//!   that already applied it.
//!
//! There are no retries and no consensus. A down node fails the write.

pub mod client;
pub mod compensation;
pub mod protocol;
pub mod transport;

pub use client::{ReplicationClient, ReplicationError};
pub use compensation::{AppliedWrite, CompensationCoordinator, CompensationError};
pub use protocol::{Envelope, PeerMessage, PeerRequest, RequestContext};
pub use transport::{HttpTransport, PeerError, PeerTransport};
