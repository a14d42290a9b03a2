use super::collections::COLLECTION_NAME;
use super::entity::{EntityService, decode};
use super::error::{ServiceError, before_apply};
use crate::replication::AppliedWrite;
use crate::replication::protocol::{PeerRequest, RequestContext};
use crate::storage::{Collection, Document, Page, page_slice, validate_identifier};
use crate::topology::RingScope;

use serde::de::DeserializeOwned;
use serde_json::Value;

const DOCUMENT_KEY: &str = "document key";

fn missing(collection: &str, key: &str) -> String {
    format!("document {} does not exist in {}", key, collection)
}

impl EntityService {
    /// Forwards a document write to the owning group when this node is not part of it.
    async fn redirect_if_foreign<T: DeserializeOwned>(
        &self,
        group: u32,
        request: &PeerRequest,
    ) -> Result<Option<T>, ServiceError> {
        if group == self.router.local_node().group {
            return Ok(None);
        }
        let answer = self
            .replication
            .redirect(group, request)
            .await
            .map_err(ServiceError::from_peer)?;
        Ok(Some(decode(answer)?))
    }

    fn check_schema(&self, collection: &Collection, value: &Value) -> Result<(), ServiceError> {
        if self.validator.is_invalid(value, &collection.json_schema) {
            return Err(ServiceError::Validation(format!(
                "value does not match the schema of {}",
                collection.name
            )));
        }
        Ok(())
    }

    pub async fn create_document(
        &self,
        counter: u32,
        collection: &str,
        document: Document,
    ) -> Result<Document, ServiceError> {
        validate_identifier(COLLECTION_NAME, collection)?;
        validate_identifier(DOCUMENT_KEY, &document.key)?;

        let group = self.router.owner_group(collection, &document.key);
        let request = PeerRequest::CreateDocument {
            collection: collection.to_string(),
            document: document.clone(),
        };
        if let Some(created) = self.redirect_if_foreign(group, &request).await? {
            return Ok(created);
        }

        let definition = self
            .require_collection(collection)
            .map_err(before_apply(counter))?;
        self.check_schema(&definition, &document.value)?;
        let existing = self
            .store
            .get_document(collection, &document.key)
            .map_err(before_apply(counter))?;
        if existing.is_some() {
            return Err(ServiceError::Validation(format!(
                "document {} already exists in {}",
                document.key, collection
            )));
        }

        self.forward_write(
            RingScope::Group(group),
            request,
            AppliedWrite::DocumentCreated {
                collection: collection.to_string(),
                document: document.clone(),
            },
            counter,
        )
        .await?;

        Ok(document)
    }

    /// Reads through the collection cache, then local storage, then the owning group.
    pub async fn get_document(
        &self,
        context: RequestContext,
        collection: &str,
        key: &str,
    ) -> Result<Document, ServiceError> {
        validate_identifier(COLLECTION_NAME, collection)?;
        validate_identifier(DOCUMENT_KEY, key)?;

        let group = self.router.owner_group(collection, key);
        let request = PeerRequest::GetDocument {
            collection: collection.to_string(),
            key: key.to_string(),
        };
        if group != self.router.local_node().group {
            let answer = self.replication.read_owner_group(group, &request).await?;
            return decode(answer);
        }

        self.require_collection(collection)?;
        let cache = self.document_cache(collection);
        if let Some(value) = cache.as_ref().and_then(|c| c.get(&key.to_string())) {
            return Ok(Document::new(key, value));
        }

        let local = self.store.get_document(collection, key);
        if let (Ok(Some(document)), Some(cache)) = (&local, &cache) {
            cache.put(document.key.clone(), document.value.clone());
        }

        self.read_through(RingScope::Group(group), request, local, context.replica, || {
            missing(collection, key)
        })
        .await
    }

    pub async fn update_document(
        &self,
        counter: u32,
        collection: &str,
        key: &str,
        document: Document,
    ) -> Result<Document, ServiceError> {
        validate_identifier(COLLECTION_NAME, collection)?;
        validate_identifier(DOCUMENT_KEY, key)?;
        if document.key != key {
            return Err(ServiceError::Validation(format!(
                "document {} cannot be renamed to {}",
                key, document.key
            )));
        }

        let group = self.router.owner_group(collection, key);
        let request = PeerRequest::UpdateDocument {
            collection: collection.to_string(),
            key: key.to_string(),
            document: document.clone(),
        };
        if let Some(updated) = self.redirect_if_foreign(group, &request).await? {
            return Ok(updated);
        }

        let definition = self
            .require_collection(collection)
            .map_err(before_apply(counter))?;
        self.check_schema(&definition, &document.value)?;
        let previous = self
            .store
            .get_document(collection, key)
            .map_err(before_apply(counter))?
            .ok_or_else(|| ServiceError::NotFound(missing(collection, key)))?;

        self.forward_write(
            RingScope::Group(group),
            request,
            AppliedWrite::DocumentUpdated {
                collection: collection.to_string(),
                previous,
            },
            counter,
        )
        .await?;

        Ok(document)
    }

    pub async fn delete_document(
        &self,
        counter: u32,
        collection: &str,
        key: &str,
    ) -> Result<Document, ServiceError> {
        validate_identifier(COLLECTION_NAME, collection)?;
        validate_identifier(DOCUMENT_KEY, key)?;

        let group = self.router.owner_group(collection, key);
        let request = PeerRequest::DeleteDocument {
            collection: collection.to_string(),
            key: key.to_string(),
        };
        if let Some(deleted) = self.redirect_if_foreign(group, &request).await? {
            return Ok(deleted);
        }

        self.require_collection(collection)
            .map_err(before_apply(counter))?;
        let previous = self
            .store
            .get_document(collection, key)
            .map_err(before_apply(counter))?
            .ok_or_else(|| ServiceError::NotFound(missing(collection, key)))?;

        self.forward_write(
            RingScope::Group(group),
            request,
            AppliedWrite::DocumentDeleted {
                collection: collection.to_string(),
                previous: previous.clone(),
            },
            counter,
        )
        .await?;

        Ok(previous)
    }

    /// Lists the documents of a collection across all groups.
    ///
    /// The entry node gathers one answer per other group and pages the union; replica
    /// and group reads answer with their unpaged local share.
    pub async fn list_documents(
        &self,
        context: RequestContext,
        collection: &str,
        page: Page,
    ) -> Result<Vec<Document>, ServiceError> {
        validate_identifier(COLLECTION_NAME, collection)?;
        self.require_collection(collection)?;

        let request = PeerRequest::ListDocuments {
            collection: collection.to_string(),
            page,
        };
        let mut documents = match self.store.list_documents(collection) {
            Ok(documents) => documents,
            Err(e) if context.replica => return Err(e.into()),
            Err(e) => {
                tracing::warn!("Listing {} failed locally, asking peers: {}", collection, e);
                let answer = self
                    .replication
                    .read_from_peers(self.router.local_group(), &request)
                    .await?;
                decode(answer)?
            }
        };

        if context.main && !context.replica {
            for answer in self.replication.gather_other_groups(&request).await? {
                documents.extend(decode::<Vec<Document>>(answer)?);
            }
        }

        if context.pages_results() {
            Ok(page_slice(documents, page, |d| d.key.as_str()))
        } else {
            Ok(documents)
        }
    }
}
