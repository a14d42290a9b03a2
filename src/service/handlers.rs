use super::entity::EntityService;
use super::error::ServiceError;
use crate::replication::protocol::{
    ENDPOINT_COLLECTIONS, Envelope, HEADER_COUNTER, HEADER_MAIN, HEADER_REPLICA, HEADER_ROLLBACK,
    PeerMessage, PeerRequest, RequestContext,
};
use crate::storage::{Collection, Document, Page};

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;

type Reply = Result<(StatusCode, Json<Value>), ServiceError>;

/// REST surface shared by clients and peers. Peers add the chain headers.
pub fn router(service: Arc<EntityService>) -> Router {
    Router::new()
        .route(
            ENDPOINT_COLLECTIONS,
            post(handle_create_collection)
                .get(handle_list_collections)
                .put(handle_restore_collections)
                .delete(handle_delete_all_collections),
        )
        .route(
            "/collections/:collection",
            get(handle_get_collection)
                .put(handle_update_collection)
                .delete(handle_delete_collection),
        )
        .route(
            "/collections/:collection/documents",
            post(handle_create_document).get(handle_list_documents),
        )
        .route(
            "/collections/:collection/documents/:key",
            get(handle_get_document)
                .put(handle_update_document)
                .delete(handle_delete_document),
        )
        .layer(Extension(service))
}

fn header<T: FromStr>(headers: &HeaderMap, name: &str, default: T) -> Result<T, ServiceError> {
    let Some(raw) = headers.get(name) else {
        return Ok(default);
    };
    raw.to_str()
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .ok_or_else(|| ServiceError::Validation(format!("header {} is not valid", name)))
}

/// Reads the chain headers, falling back to a fresh client request.
pub fn request_context(headers: &HeaderMap) -> Result<RequestContext, ServiceError> {
    Ok(RequestContext {
        envelope: Envelope {
            counter: header(headers, HEADER_COUNTER, 0)?,
            rollback: header(headers, HEADER_ROLLBACK, false)?,
        },
        replica: header(headers, HEADER_REPLICA, false)?,
        main: header(headers, HEADER_MAIN, true)?,
    })
}

fn body<T: DeserializeOwned>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(ServiceError::Validation(rejection.body_text())),
    }
}

fn page_query(query: Result<Query<Page>, QueryRejection>) -> Result<Page, ServiceError> {
    match query {
        Ok(Query(page)) => Ok(page),
        Err(rejection) => Err(ServiceError::Validation(rejection.body_text())),
    }
}

async fn dispatch(
    service: &EntityService,
    headers: &HeaderMap,
    request: PeerRequest,
    status: StatusCode,
) -> Reply {
    let context = request_context(headers)?;
    tracing::debug!(
        "{} received by {} (counter={}, rollback={})",
        request.name(),
        service.local_name(),
        context.envelope.counter,
        context.envelope.rollback
    );

    match service.handle(PeerMessage::new(request, context)).await {
        Ok(answer) => Ok((status, Json(answer))),
        Err(e) => {
            tracing::warn!("Request failed on {}: {}", service.local_name(), e);
            Err(e)
        }
    }
}

// ============================================================
// COLLECTIONS
// ============================================================

pub async fn handle_create_collection(
    Extension(service): Extension<Arc<EntityService>>,
    headers: HeaderMap,
    payload: Result<Json<Collection>, JsonRejection>,
) -> Reply {
    let collection = body(payload)?;
    dispatch(
        &service,
        &headers,
        PeerRequest::CreateCollection(collection),
        StatusCode::CREATED,
    )
    .await
}

pub async fn handle_list_collections(
    Extension(service): Extension<Arc<EntityService>>,
    headers: HeaderMap,
    query: Result<Query<Page>, QueryRejection>,
) -> Reply {
    let page = page_query(query)?;
    dispatch(
        &service,
        &headers,
        PeerRequest::ListCollections { page },
        StatusCode::OK,
    )
    .await
}

pub async fn handle_restore_collections(
    Extension(service): Extension<Arc<EntityService>>,
    headers: HeaderMap,
    payload: Result<Json<Vec<Collection>>, JsonRejection>,
) -> Reply {
    let collections = body(payload)?;
    dispatch(
        &service,
        &headers,
        PeerRequest::RestoreCollections(collections),
        StatusCode::OK,
    )
    .await
}

pub async fn handle_delete_all_collections(
    Extension(service): Extension<Arc<EntityService>>,
    headers: HeaderMap,
) -> Reply {
    dispatch(
        &service,
        &headers,
        PeerRequest::DeleteAllCollections,
        StatusCode::OK,
    )
    .await
}

pub async fn handle_get_collection(
    Extension(service): Extension<Arc<EntityService>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Reply {
    dispatch(
        &service,
        &headers,
        PeerRequest::GetCollection { name },
        StatusCode::OK,
    )
    .await
}

pub async fn handle_update_collection(
    Extension(service): Extension<Arc<EntityService>>,
    headers: HeaderMap,
    Path(name): Path<String>,
    payload: Result<Json<Collection>, JsonRejection>,
) -> Reply {
    let collection = body(payload)?;
    dispatch(
        &service,
        &headers,
        PeerRequest::UpdateCollection { name, collection },
        StatusCode::OK,
    )
    .await
}

pub async fn handle_delete_collection(
    Extension(service): Extension<Arc<EntityService>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Reply {
    dispatch(
        &service,
        &headers,
        PeerRequest::DeleteCollection { name },
        StatusCode::OK,
    )
    .await
}

// ============================================================
// DOCUMENTS
// ============================================================

pub async fn handle_create_document(
    Extension(service): Extension<Arc<EntityService>>,
    headers: HeaderMap,
    Path(collection): Path<String>,
    payload: Result<Json<Document>, JsonRejection>,
) -> Reply {
    let document = body(payload)?;
    dispatch(
        &service,
        &headers,
        PeerRequest::CreateDocument {
            collection,
            document,
        },
        StatusCode::CREATED,
    )
    .await
}

pub async fn handle_list_documents(
    Extension(service): Extension<Arc<EntityService>>,
    headers: HeaderMap,
    Path(collection): Path<String>,
    query: Result<Query<Page>, QueryRejection>,
) -> Reply {
    let page = page_query(query)?;
    dispatch(
        &service,
        &headers,
        PeerRequest::ListDocuments { collection, page },
        StatusCode::OK,
    )
    .await
}

pub async fn handle_get_document(
    Extension(service): Extension<Arc<EntityService>>,
    headers: HeaderMap,
    Path((collection, key)): Path<(String, String)>,
) -> Reply {
    dispatch(
        &service,
        &headers,
        PeerRequest::GetDocument { collection, key },
        StatusCode::OK,
    )
    .await
}

pub async fn handle_update_document(
    Extension(service): Extension<Arc<EntityService>>,
    headers: HeaderMap,
    Path((collection, key)): Path<(String, String)>,
    payload: Result<Json<Document>, JsonRejection>,
) -> Reply {
    let document = body(payload)?;
    dispatch(
        &service,
        &headers,
        PeerRequest::UpdateDocument {
            collection,
            key,
            document,
        },
        StatusCode::OK,
    )
    .await
}

pub async fn handle_delete_document(
    Extension(service): Extension<Arc<EntityService>>,
    headers: HeaderMap,
    Path((collection, key)): Path<(String, String)>,
) -> Reply {
    dispatch(
        &service,
        &headers,
        PeerRequest::DeleteDocument { collection, key },
        StatusCode::OK,
    )
    .await
}
