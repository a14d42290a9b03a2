//! Sharded Replicated Key-Value Store
//!
//! This library crate defines the modules of one storage node. It serves as the
//! foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The system is composed of five layered subsystems:
//!
//! - **`cache`**: Bounded LRU and LFU engines; every collection owns one.
//! - **`storage`**: The local data model, the `Persistence` trait with its in-memory
//!   implementation, identifier and schema validation, and page slicing.
//! - **`topology`**: The static cluster layout loaded at startup, and the `ShardRouter`
//!   that maps documents to groups and computes ring neighbours.
//! - **`replication`**: The peer protocol, the HTTP transport, chain relays, fallback
//!   reads and compensation of partially applied writes.
//! - **`service`**: The `EntityService` orchestrating all of the above, and the axum
//!   routes exposing it to clients and peers alike.

pub mod cache;
pub mod replication;
pub mod service;
pub mod storage;
pub mod topology;
