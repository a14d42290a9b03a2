//! Local Storage Layer
//!
//! Everything a node keeps for itself, independent of replication.
//!
//! ## Core Concepts
//! - **Model**: `Collection` and `Document`, serialized as camelCase JSON.
//! - **Persistence**: a synchronous trait with an in-memory `MemoryStore` implementation.
//! - **Validation**: identifier rules and a structural JSON-schema check.
//! - **Paging**: deterministic page slicing shared by every list operation.

pub mod paging;
pub mod persistence;
pub mod types;
pub mod validation;

pub use paging::{Page, page_slice};
pub use persistence::{MemoryStore, Persistence, StorageError};
pub use types::{Collection, Document};
pub use validation::{BasicSchemaValidator, IdentifierError, SchemaValidator, validate_identifier};
