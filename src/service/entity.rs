use super::error::ServiceError;
use crate::cache::{CacheEngine, CacheError, DEFAULT_EVICTION_FACTOR, EvictionAlgorithm, create_cache};
use crate::replication::protocol::{Envelope, PeerMessage, PeerRequest};
use crate::replication::{
    AppliedWrite, CompensationCoordinator, CompensationError, PeerError, PeerTransport,
    ReplicationClient,
};
use crate::storage::{
    BasicSchemaValidator, Collection, Persistence, SchemaValidator, StorageError,
};
use crate::topology::{RingScope, ShardRouter, Topology};

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Capacity of the per-node cache of collection definitions.
pub const COLLECTION_CACHE_CAPACITY: usize = 1000;

pub type DocumentCache = Arc<dyn CacheEngine<String, Value>>;

/// Per-node orchestrator of local state, caches, replication and compensation.
///
/// Writes follow `LOCAL_APPLY -> REPLICATE -> {SUCCESS | COMPENSATE_THEN_FAIL}`:
/// validation runs first and never triggers replication, the local store and cache are
/// updated together, and only then is the write relayed to the next ring member.
pub struct EntityService {
    pub(super) router: ShardRouter,
    pub(super) replication: Arc<ReplicationClient>,
    compensation: CompensationCoordinator,
    pub(super) store: Arc<dyn Persistence>,
    pub(super) validator: Arc<dyn SchemaValidator>,
    collection_cache: Arc<dyn CacheEngine<String, Collection>>,
    document_caches: DashMap<String, DocumentCache>,
}

impl EntityService {
    pub fn new(
        topology: Arc<Topology>,
        transport: Arc<dyn PeerTransport>,
        store: Arc<dyn Persistence>,
    ) -> Result<Self, CacheError> {
        let router = ShardRouter::new(topology);
        let replication = Arc::new(ReplicationClient::new(router.clone(), transport));
        let compensation = CompensationCoordinator::new(replication.clone());
        let collection_cache = create_cache(
            EvictionAlgorithm::Lfu,
            COLLECTION_CACHE_CAPACITY,
            DEFAULT_EVICTION_FACTOR,
        )?;

        Ok(Self {
            router,
            replication,
            compensation,
            store,
            validator: Arc::new(BasicSchemaValidator),
            collection_cache,
            document_caches: DashMap::new(),
        })
    }

    pub fn with_validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn router(&self) -> &ShardRouter {
        &self.router
    }

    pub fn local_name(&self) -> &str {
        &self.router.local_node().name
    }

    /// Cache engine currently bound to `collection`, if any.
    pub fn document_cache(&self, collection: &str) -> Option<DocumentCache> {
        self.document_caches
            .get(collection)
            .map(|entry| entry.value().clone())
    }

    /// Builds caches for every collection already in the store and warms them.
    pub fn hydrate(&self) -> Result<usize, ServiceError> {
        let collections = self.store.list_collections()?;
        for collection in &collections {
            self.collection_cache
                .put(collection.name.clone(), collection.clone());
            let cache = self.install_cache(collection)?;
            for document in self.store.list_documents(&collection.name)? {
                cache.put(document.key, document.value);
            }
        }

        tracing::info!(
            "Hydrated {} collections on {}",
            collections.len(),
            self.local_name()
        );
        Ok(collections.len())
    }

    /// Entry point for one inbound peer or client message.
    pub async fn handle(&self, message: PeerMessage) -> Result<Value, ServiceError> {
        let context = message.context;
        if context.envelope.rollback {
            self.rollback(message.request, context.envelope).await?;
            return Ok(Value::Null);
        }

        let counter = context.envelope.counter;
        match message.request {
            PeerRequest::CreateCollection(collection) => {
                encode(&self.create_collection(counter, collection).await?)
            }
            PeerRequest::UpdateCollection { name, collection } => {
                encode(&self.update_collection(counter, &name, collection).await?)
            }
            PeerRequest::DeleteCollection { name } => {
                encode(&self.delete_collection(counter, &name).await?)
            }
            PeerRequest::DeleteAllCollections => {
                encode(&self.delete_all_collections(counter).await?)
            }
            PeerRequest::RestoreCollections(_) => Err(ServiceError::Validation(
                "collections can only be restored by a rollback".to_string(),
            )),
            PeerRequest::ListCollections { page } => {
                encode(&self.list_collections(context, page).await?)
            }
            PeerRequest::GetCollection { name } => {
                encode(&self.get_collection(context, &name).await?)
            }
            PeerRequest::CreateDocument {
                collection,
                document,
            } => encode(&self.create_document(counter, &collection, document).await?),
            PeerRequest::GetDocument { collection, key } => {
                encode(&self.get_document(context, &collection, &key).await?)
            }
            PeerRequest::UpdateDocument {
                collection,
                key,
                document,
            } => encode(
                &self
                    .update_document(counter, &collection, &key, document)
                    .await?,
            ),
            PeerRequest::DeleteDocument { collection, key } => {
                encode(&self.delete_document(counter, &collection, &key).await?)
            }
            PeerRequest::ListDocuments { collection, page } => {
                encode(&self.list_documents(context, &collection, page).await?)
            }
        }
    }

    /// Applies an inverse write received on a rollback chain and passes it backwards.
    ///
    /// No validation runs here: the inverse restores state this node held before. A
    /// local failure does not stop the chain; it is reported once the relay is done.
    pub async fn rollback(&self, request: PeerRequest, envelope: Envelope) -> Result<(), ServiceError> {
        let scope = match &request {
            PeerRequest::CreateDocument {
                collection,
                document,
            } => RingScope::Group(self.router.owner_group(collection, &document.key)),
            PeerRequest::UpdateDocument {
                collection, key, ..
            }
            | PeerRequest::DeleteDocument { collection, key } => {
                RingScope::Group(self.router.owner_group(collection, key))
            }
            request if request.is_write() => RingScope::Cluster,
            request => {
                return Err(ServiceError::Validation(format!(
                    "{} cannot be rolled back",
                    request.name()
                )));
            }
        };

        self.check_counter(scope, envelope.counter)?;

        let span = tracing::info_span!(
            "rollback",
            op_id = %Uuid::new_v4(),
            node = %self.local_name(),
            request = request.name(),
            counter = envelope.counter,
        );

        async move {
            // Earlier nodes are still unwound when this one cannot be
            let local = match self.apply_local(&request) {
                Ok(()) => {
                    tracing::info!("Rolled back {}", request.name());
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(
                        "Rollback could not be applied locally, manual intervention required: {}",
                        e
                    );
                    Err(CompensationError::LocalUndo {
                        node: self.local_name().to_string(),
                        reason: e.to_string(),
                    })
                }
            };

            if let Err(e) = self.replication.relay(scope, &request, envelope).await {
                tracing::error!("Rollback chain broken, manual intervention required: {}", e);
                return Err(CompensationError::ChainBroken(e).into());
            }
            local.map_err(ServiceError::from)
        }
        .instrument(span)
        .await
    }

    // ============================================================
    // WRITE PIPELINE
    // ============================================================

    /// Applies a validated write locally, then relays it along `scope`.
    ///
    /// `applied` is the snapshot needed to undo the write on this node and on the
    /// `counter` nodes before it.
    pub(super) async fn forward_write(
        &self,
        scope: RingScope,
        request: PeerRequest,
        applied: AppliedWrite,
        counter: u32,
    ) -> Result<(), ServiceError> {
        self.check_counter(scope, counter)?;

        let span = tracing::info_span!(
            "write",
            op_id = %Uuid::new_v4(),
            node = %self.local_name(),
            request = request.name(),
            counter,
        );

        async move {
            if let Err(e) = self.apply_local(&request) {
                tracing::error!("Local apply of {} failed: {}", request.name(), e);
                self.compensate_previous(scope, &applied, counter).await?;
                return Err(ServiceError::from(e));
            }

            let envelope = Envelope {
                counter,
                rollback: false,
            };
            let error = match self.replication.relay(scope, &request, envelope).await {
                Ok(_) => return Ok(()),
                Err(e) => e,
            };

            if let PeerError::Unavailable { .. } = error {
                // Downstream failed after relaying and already unwound this node too
                tracing::warn!(
                    "{} failed downstream at {}: {}",
                    request.name(),
                    error.node(),
                    error
                );
                return Err(ServiceError::PeerUnavailable(error));
            }

            tracing::warn!(
                "{} was not applied by {}, undoing: {}",
                request.name(),
                error.node(),
                error
            );
            self.undo_local(&applied);
            self.compensate_previous(scope, &applied, counter).await?;
            Err(ServiceError::PeerUnavailable(error))
        }
        .instrument(span)
        .await
    }

    /// Rejects an envelope whose counter points past the end of the ring.
    fn check_counter(&self, scope: RingScope, counter: u32) -> Result<(), ServiceError> {
        let ring_size = self.router.ring_size(scope);
        if counter as usize >= ring_size {
            return Err(ServiceError::Validation(format!(
                "hop counter {} is outside a ring of {} nodes",
                counter, ring_size
            )));
        }
        Ok(())
    }

    async fn compensate_previous(
        &self,
        scope: RingScope,
        applied: &AppliedWrite,
        counter: u32,
    ) -> Result<(), ServiceError> {
        match self.compensation.compensate(scope, applied, counter).await {
            Ok(()) => Ok(()),
            Err(CompensationError::NothingToUndo) => {
                tracing::debug!("No earlier hops to compensate");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn undo_local(&self, applied: &AppliedWrite) {
        let inverse = applied.inverse();
        if let Err(e) = self.apply_local(&inverse) {
            tracing::error!(
                "Local undo with {} failed, manual intervention required: {}",
                inverse.name(),
                e
            );
        }
    }

    /// Mutates the store and mirrors the change into the caches. Reads are no-ops.
    fn apply_local(&self, request: &PeerRequest) -> Result<(), StorageError> {
        match request {
            PeerRequest::CreateCollection(collection) => {
                self.store.insert_collection(collection)?;
                self.bind_collection(collection, true);
            }
            PeerRequest::UpdateCollection { collection, .. } => {
                let previous = self.store.get_collection(&collection.name)?;
                match &previous {
                    Some(_) => self.store.update_collection(collection)?,
                    None => self.store.insert_collection(collection)?,
                }
                let rebuild = match &previous {
                    Some(previous) => {
                        previous.cache_settings_differ(collection)
                            || !self.document_caches.contains_key(&collection.name)
                    }
                    None => true,
                };
                self.bind_collection(collection, rebuild);
            }
            PeerRequest::DeleteCollection { name } => {
                self.store.delete_collection(name)?;
                self.forget_collection(name);
            }
            PeerRequest::DeleteAllCollections => {
                for collection in self.store.clear_collections()? {
                    self.forget_collection(&collection.name);
                }
            }
            PeerRequest::RestoreCollections(collections) => {
                for collection in collections {
                    if self.store.get_collection(&collection.name)?.is_none() {
                        self.store.insert_collection(collection)?;
                        self.bind_collection(collection, true);
                    }
                }
            }
            PeerRequest::CreateDocument {
                collection,
                document,
            } => {
                self.store.insert_document(collection, document)?;
                if let Some(cache) = self.document_cache(collection) {
                    cache.put(document.key.clone(), document.value.clone());
                }
            }
            PeerRequest::UpdateDocument {
                collection,
                document,
                ..
            } => {
                match self.store.get_document(collection, &document.key)? {
                    Some(_) => self.store.update_document(collection, document)?,
                    None => self.store.insert_document(collection, document)?,
                }
                if let Some(cache) = self.document_cache(collection) {
                    cache.put(document.key.clone(), document.value.clone());
                }
            }
            PeerRequest::DeleteDocument { collection, key } => {
                self.store.delete_document(collection, key)?;
                if let Some(cache) = self.document_cache(collection) {
                    cache.remove(key);
                }
            }
            PeerRequest::ListCollections { .. }
            | PeerRequest::GetCollection { .. }
            | PeerRequest::GetDocument { .. }
            | PeerRequest::ListDocuments { .. } => {}
        }
        Ok(())
    }

    // ============================================================
    // CACHE BOOKKEEPING
    // ============================================================

    fn install_cache(&self, collection: &Collection) -> Result<DocumentCache, CacheError> {
        let cache = create_cache(
            collection.algorithm,
            collection.cache_limit,
            collection.eviction_factor,
        )?;
        self.document_caches
            .insert(collection.name.clone(), cache.clone());
        Ok(cache)
    }

    fn bind_collection(&self, collection: &Collection, rebuild_cache: bool) {
        self.collection_cache
            .put(collection.name.clone(), collection.clone());
        if rebuild_cache && let Err(e) = self.install_cache(collection) {
            tracing::error!("No cache for collection {}: {}", collection.name, e);
        }
    }

    fn forget_collection(&self, name: &str) {
        self.collection_cache.remove(&name.to_string());
        self.document_caches.remove(name);
    }

    /// Collection definition held by this node, read through the definition cache.
    pub(super) fn find_local_collection(&self, name: &str) -> Result<Option<Collection>, StorageError> {
        if let Some(collection) = self.collection_cache.get(&name.to_string()) {
            return Ok(Some(collection));
        }
        let stored = self.store.get_collection(name)?;
        if let Some(collection) = &stored {
            self.collection_cache
                .put(collection.name.clone(), collection.clone());
        }
        Ok(stored)
    }

    pub(super) fn require_collection(&self, name: &str) -> Result<Collection, ServiceError> {
        self.find_local_collection(name)?
            .ok_or_else(|| ServiceError::NotFound(format!("collection {} does not exist", name)))
    }

    // ============================================================
    // READS
    // ============================================================

    /// Resolves a local lookup, falling back to the other members of `scope`.
    ///
    /// Replica reads never fan out again. A miss with no peers to ask is final.
    pub(super) async fn read_through<T: DeserializeOwned>(
        &self,
        scope: RingScope,
        request: PeerRequest,
        local: Result<Option<T>, StorageError>,
        replica: bool,
        missing: impl FnOnce() -> String,
    ) -> Result<T, ServiceError> {
        match local {
            Ok(Some(found)) => return Ok(found),
            Ok(None) if replica || self.router.peers(scope).is_empty() => {
                return Err(ServiceError::NotFound(missing()));
            }
            Err(e) if replica => return Err(e.into()),
            Ok(None) => tracing::debug!("{} missed locally, asking peers", request.name()),
            Err(e) => tracing::warn!("{} failed locally, asking peers: {}", request.name(), e),
        }

        let answer = self.replication.read_from_peers(scope, &request).await?;
        decode(answer)
    }
}

pub(super) fn encode<T: Serialize>(value: &T) -> Result<Value, ServiceError> {
    Ok(serde_json::to_value(value)?)
}

pub(super) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ServiceError> {
    Ok(serde_json::from_value(value)?)
}
