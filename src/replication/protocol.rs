//! Peer Protocol
//!
//! Messages exchanged between nodes. The envelope and read flags travel as HTTP headers;
//! the request itself maps onto the public REST surface, so a peer call is an ordinary
//! client call with extra headers.

use crate::storage::{Collection, Document, Page};

use serde::{Deserialize, Serialize};

// --- Headers ---

/// Number of hops the write has already travelled.
pub const HEADER_COUNTER: &str = "counter";
/// Set on compensation messages travelling backwards.
pub const HEADER_ROLLBACK: &str = "rollback";
/// Set on fallback reads; the receiver answers from local state only.
pub const HEADER_REPLICA: &str = "replica";
/// Set when the request entered the cluster at the receiver.
pub const HEADER_MAIN: &str = "main";

// --- Endpoints ---

pub const ENDPOINT_COLLECTIONS: &str = "/collections";

pub fn collection_path(name: &str) -> String {
    format!("{}/{}", ENDPOINT_COLLECTIONS, name)
}

pub fn documents_path(collection: &str) -> String {
    format!("{}/{}/documents", ENDPOINT_COLLECTIONS, collection)
}

pub fn document_path(collection: &str, key: &str) -> String {
    format!("{}/{}", documents_path(collection), key)
}

/// Hop state of a chain write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub counter: u32,
    pub rollback: bool,
}

impl Envelope {
    pub fn rollback(counter: u32) -> Self {
        Self {
            counter,
            rollback: true,
        }
    }
}

/// Header-carried state of one inbound or outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub envelope: Envelope,
    pub replica: bool,
    pub main: bool,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            envelope: Envelope::default(),
            replica: false,
            main: true,
        }
    }
}

impl RequestContext {
    /// A hop of a write chain.
    pub fn relay(envelope: Envelope) -> Self {
        Self {
            envelope,
            ..Self::default()
        }
    }

    /// A fallback read answered purely from the receiver's local state.
    pub fn replica_read() -> Self {
        Self {
            envelope: Envelope::default(),
            replica: true,
            main: false,
        }
    }

    /// A read collecting one group's share of a cluster-wide list.
    pub fn group_read() -> Self {
        Self {
            envelope: Envelope::default(),
            replica: false,
            main: false,
        }
    }

    /// Whether list answers should be paged here. Only the entry node pages.
    pub fn pages_results(&self) -> bool {
        self.main && !self.replica
    }
}

/// Every operation one node can ask of another.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerRequest {
    CreateCollection(Collection),
    UpdateCollection { name: String, collection: Collection },
    DeleteCollection { name: String },
    DeleteAllCollections,
    /// Undo of `DeleteAllCollections`; only accepted on rollback.
    RestoreCollections(Vec<Collection>),
    ListCollections { page: Page },
    GetCollection { name: String },
    CreateDocument { collection: String, document: Document },
    GetDocument { collection: String, key: String },
    UpdateDocument { collection: String, key: String, document: Document },
    DeleteDocument { collection: String, key: String },
    ListDocuments { collection: String, page: Page },
}

impl PeerRequest {
    pub fn name(&self) -> &'static str {
        match self {
            PeerRequest::CreateCollection(_) => "create_collection",
            PeerRequest::UpdateCollection { .. } => "update_collection",
            PeerRequest::DeleteCollection { .. } => "delete_collection",
            PeerRequest::DeleteAllCollections => "delete_all_collections",
            PeerRequest::RestoreCollections(_) => "restore_collections",
            PeerRequest::ListCollections { .. } => "list_collections",
            PeerRequest::GetCollection { .. } => "get_collection",
            PeerRequest::CreateDocument { .. } => "create_document",
            PeerRequest::GetDocument { .. } => "get_document",
            PeerRequest::UpdateDocument { .. } => "update_document",
            PeerRequest::DeleteDocument { .. } => "delete_document",
            PeerRequest::ListDocuments { .. } => "list_documents",
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            PeerRequest::ListCollections { .. }
                | PeerRequest::GetCollection { .. }
                | PeerRequest::GetDocument { .. }
                | PeerRequest::ListDocuments { .. }
        )
    }
}

/// A request plus the headers it travels with.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerMessage {
    pub request: PeerRequest,
    pub context: RequestContext,
}

impl PeerMessage {
    pub fn new(request: PeerRequest, context: RequestContext) -> Self {
        Self { request, context }
    }
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub message: String,
}
