use super::entity::{EntityService, decode};
use super::error::{ServiceError, before_apply};
use crate::cache::validate_settings;
use crate::replication::protocol::{PeerRequest, RequestContext};
use crate::replication::AppliedWrite;
use crate::storage::{Collection, Page, page_slice, validate_identifier};
use crate::topology::RingScope;

use serde_json::Value;

pub(super) const COLLECTION_NAME: &str = "collection name";

fn validate_definition(collection: &Collection) -> Result<(), ServiceError> {
    validate_identifier(COLLECTION_NAME, &collection.name)?;
    validate_settings(
        collection.algorithm,
        collection.cache_limit,
        collection.eviction_factor,
    )?;
    match collection.json_schema {
        Value::Null | Value::Bool(_) | Value::Object(_) => Ok(()),
        _ => Err(ServiceError::Validation(format!(
            "jsonSchema of {} must be an object",
            collection.name
        ))),
    }
}

fn missing(name: &str) -> ServiceError {
    ServiceError::NotFound(format!("collection {} does not exist", name))
}

/// Collections live on every node and replicate along the cluster ring.
impl EntityService {
    pub async fn create_collection(
        &self,
        counter: u32,
        collection: Collection,
    ) -> Result<Collection, ServiceError> {
        validate_definition(&collection)?;
        let existing = self
            .find_local_collection(&collection.name)
            .map_err(before_apply(counter))?;
        if existing.is_some() {
            return Err(ServiceError::Validation(format!(
                "collection {} already exists",
                collection.name
            )));
        }

        self.forward_write(
            RingScope::Cluster,
            PeerRequest::CreateCollection(collection.clone()),
            AppliedWrite::CollectionCreated(collection.clone()),
            counter,
        )
        .await?;

        tracing::info!("Collection {} created on {}", collection.name, self.local_name());
        Ok(collection)
    }

    pub async fn get_collection(
        &self,
        context: RequestContext,
        name: &str,
    ) -> Result<Collection, ServiceError> {
        validate_identifier(COLLECTION_NAME, name)?;
        let local = self.find_local_collection(name);

        self.read_through(
            RingScope::Cluster,
            PeerRequest::GetCollection {
                name: name.to_string(),
            },
            local,
            context.replica,
            || format!("collection {} does not exist", name),
        )
        .await
    }

    /// Replaces a collection definition. The name is immutable; a change of algorithm,
    /// capacity or eviction factor rebinds the collection to a fresh, empty cache.
    pub async fn update_collection(
        &self,
        counter: u32,
        name: &str,
        collection: Collection,
    ) -> Result<Collection, ServiceError> {
        validate_identifier(COLLECTION_NAME, name)?;
        if collection.name != name {
            return Err(ServiceError::Validation(format!(
                "collection {} cannot be renamed to {}",
                name, collection.name
            )));
        }
        validate_definition(&collection)?;
        let previous = self
            .find_local_collection(name)
            .map_err(before_apply(counter))?
            .ok_or_else(|| missing(name))?;

        self.forward_write(
            RingScope::Cluster,
            PeerRequest::UpdateCollection {
                name: name.to_string(),
                collection: collection.clone(),
            },
            AppliedWrite::CollectionUpdated { previous },
            counter,
        )
        .await?;

        tracing::info!("Collection {} updated on {}", name, self.local_name());
        Ok(collection)
    }

    /// Deletes a collection together with its documents and cache.
    pub async fn delete_collection(
        &self,
        counter: u32,
        name: &str,
    ) -> Result<Collection, ServiceError> {
        validate_identifier(COLLECTION_NAME, name)?;
        let previous = self
            .find_local_collection(name)
            .map_err(before_apply(counter))?
            .ok_or_else(|| missing(name))?;

        self.forward_write(
            RingScope::Cluster,
            PeerRequest::DeleteCollection {
                name: name.to_string(),
            },
            AppliedWrite::CollectionDeleted {
                previous: previous.clone(),
            },
            counter,
        )
        .await?;

        tracing::info!("Collection {} deleted on {}", name, self.local_name());
        Ok(previous)
    }

    pub async fn delete_all_collections(&self, counter: u32) -> Result<Vec<Collection>, ServiceError> {
        let previous = self
            .store
            .list_collections()
            .map_err(before_apply(counter))?;

        self.forward_write(
            RingScope::Cluster,
            PeerRequest::DeleteAllCollections,
            AppliedWrite::CollectionsCleared {
                previous: previous.clone(),
            },
            counter,
        )
        .await?;

        tracing::info!("{} collections deleted on {}", previous.len(), self.local_name());
        Ok(previous)
    }

    pub async fn list_collections(
        &self,
        context: RequestContext,
        page: Page,
    ) -> Result<Vec<Collection>, ServiceError> {
        let collections = match self.store.list_collections() {
            Ok(collections) => collections,
            Err(e) if context.replica => return Err(e.into()),
            Err(e) => {
                tracing::warn!("Listing collections failed locally, asking peers: {}", e);
                let answer = self
                    .replication
                    .read_from_peers(RingScope::Cluster, &PeerRequest::ListCollections { page })
                    .await?;
                decode(answer)?
            }
        };

        if context.pages_results() {
            Ok(page_slice(collections, page, |c| c.name.as_str()))
        } else {
            Ok(collections)
        }
    }
}
