//! Entity Service
//!
//! The per-node orchestrator sitting between the HTTP surface and the lower layers.
//!
//! ## Core Concepts
//! - **Writes**: validated, applied to the local store and cache, then relayed along the
//!   ring of their scope. A failed hop unwinds the nodes before it.
//! - **Reads**: answered from the cache, then the store, then peers. Lists are gathered
//!   across groups and paged once at the entry node.
//! - **Dispatch**: HTTP handlers and the loopback transport both funnel into
//!   `EntityService::handle`, so in-process clusters behave like real ones.

pub mod collections;
pub mod documents;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod loopback;

pub use entity::{COLLECTION_CACHE_CAPACITY, DocumentCache, EntityService};
pub use error::{ErrorClass, ServiceError};
pub use handlers::{request_context, router};
pub use loopback::LoopbackTransport;
