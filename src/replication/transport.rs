use super::protocol::*;
use crate::storage::Page;
use crate::topology::Node;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single peer call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PeerError {
    #[error("{node} rejected the request: {message}")]
    BadRequest { node: String, message: String },

    #[error("{node} reported not found: {message}")]
    NotFound { node: String, message: String },

    /// The peer failed before applying a relayed write.
    #[error("{node} applied nothing: {message}")]
    NotApplied { node: String, message: String },

    /// The peer answered but reported its own failure.
    #[error("{node} is unavailable: {message}")]
    Unavailable { node: String, message: String },

    /// Unreachable, refused or timed out.
    #[error("could not reach {node}: {reason}")]
    Connection { node: String, reason: String },

    #[error("unreadable response from {node}: {reason}")]
    Decode { node: String, reason: String },
}

impl PeerError {
    pub fn node(&self) -> &str {
        match self {
            PeerError::BadRequest { node, .. }
            | PeerError::NotFound { node, .. }
            | PeerError::NotApplied { node, .. }
            | PeerError::Unavailable { node, .. }
            | PeerError::Connection { node, .. }
            | PeerError::Decode { node, .. } => node,
        }
    }

    /// A definitive answer about the data, as opposed to a failing peer.
    pub fn is_answer(&self) -> bool {
        matches!(self, PeerError::BadRequest { .. } | PeerError::NotFound { .. })
    }
}

/// Delivers one message to one node.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn send(&self, target: &Node, message: PeerMessage) -> Result<Value, PeerError>;
}

/// `PeerTransport` over the public REST surface.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

fn route(request: &PeerRequest) -> (Method, String) {
    match request {
        PeerRequest::CreateCollection(_) => (Method::POST, ENDPOINT_COLLECTIONS.to_string()),
        PeerRequest::UpdateCollection { name, .. } => (Method::PUT, collection_path(name)),
        PeerRequest::DeleteCollection { name } => (Method::DELETE, collection_path(name)),
        PeerRequest::DeleteAllCollections => (Method::DELETE, ENDPOINT_COLLECTIONS.to_string()),
        PeerRequest::RestoreCollections(_) => (Method::PUT, ENDPOINT_COLLECTIONS.to_string()),
        PeerRequest::ListCollections { .. } => (Method::GET, ENDPOINT_COLLECTIONS.to_string()),
        PeerRequest::GetCollection { name } => (Method::GET, collection_path(name)),
        PeerRequest::CreateDocument { collection, .. } => {
            (Method::POST, documents_path(collection))
        }
        PeerRequest::GetDocument { collection, key } => {
            (Method::GET, document_path(collection, key))
        }
        PeerRequest::UpdateDocument {
            collection, key, ..
        } => (Method::PUT, document_path(collection, key)),
        PeerRequest::DeleteDocument { collection, key } => {
            (Method::DELETE, document_path(collection, key))
        }
        PeerRequest::ListDocuments { collection, .. } => {
            (Method::GET, documents_path(collection))
        }
    }
}

fn body(request: &PeerRequest) -> Result<Option<Value>, serde_json::Error> {
    let body = match request {
        PeerRequest::CreateCollection(collection)
        | PeerRequest::UpdateCollection { collection, .. } => serde_json::to_value(collection)?,
        PeerRequest::RestoreCollections(collections) => serde_json::to_value(collections)?,
        PeerRequest::CreateDocument { document, .. }
        | PeerRequest::UpdateDocument { document, .. } => serde_json::to_value(document)?,
        _ => return Ok(None),
    };
    Ok(Some(body))
}

fn query(request: &PeerRequest) -> Option<Page> {
    match request {
        PeerRequest::ListCollections { page } | PeerRequest::ListDocuments { page, .. } => {
            Some(*page)
        }
        _ => None,
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn send(&self, target: &Node, message: PeerMessage) -> Result<Value, PeerError> {
        let (method, path) = route(&message.request);
        let url = format!("{}{}", target.url, path);
        let context = message.context;

        tracing::debug!(
            "{} {} (counter={}, rollback={}, replica={}, main={})",
            method,
            url,
            context.envelope.counter,
            context.envelope.rollback,
            context.replica,
            context.main
        );

        let mut builder = self
            .client
            .request(method, &url)
            .header(HEADER_COUNTER, context.envelope.counter.to_string())
            .header(HEADER_ROLLBACK, context.envelope.rollback.to_string())
            .header(HEADER_REPLICA, context.replica.to_string())
            .header(HEADER_MAIN, context.main.to_string());

        let payload = body(&message.request).map_err(|e| PeerError::Decode {
            node: target.name.clone(),
            reason: e.to_string(),
        })?;
        if let Some(payload) = payload {
            builder = builder.json(&payload);
        }
        if let Some(page) = query(&message.request) {
            builder = builder.query(&page);
        }

        let response = builder.send().await.map_err(|e| PeerError::Connection {
            node: target.name.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if status.is_success() {
            return response.json::<Value>().await.map_err(|e| PeerError::Decode {
                node: target.name.clone(),
                reason: e.to_string(),
            });
        }

        let raw = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&raw)
            .map(|body| body.message)
            .unwrap_or(raw);
        let node = target.name.clone();

        Err(match status {
            StatusCode::NOT_FOUND => PeerError::NotFound { node, message },
            StatusCode::INTERNAL_SERVER_ERROR => PeerError::NotApplied { node, message },
            s if s.is_server_error() => PeerError::Unavailable { node, message },
            s if s.is_client_error() => PeerError::BadRequest { node, message },
            s => PeerError::Decode {
                node,
                reason: format!("unexpected status {}", s),
            },
        })
    }
}
