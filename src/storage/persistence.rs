use super::types::{Collection, Document};

use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
#[error("storage failure: {0}")]
pub struct StorageError(pub String);

/// Local persistence for collections and the documents this node owns.
///
/// Implementations must be usable from many request tasks at once. Calls are
/// synchronous; a failing backend reports `StorageError` rather than panicking.
pub trait Persistence: Send + Sync {
    fn insert_collection(&self, collection: &Collection) -> Result<(), StorageError>;
    fn get_collection(&self, name: &str) -> Result<Option<Collection>, StorageError>;
    fn update_collection(&self, collection: &Collection) -> Result<(), StorageError>;
    /// Removes the collection together with its documents.
    fn delete_collection(&self, name: &str) -> Result<Option<Collection>, StorageError>;
    fn list_collections(&self) -> Result<Vec<Collection>, StorageError>;
    /// Removes every collection and document, returning the removed collections.
    fn clear_collections(&self) -> Result<Vec<Collection>, StorageError>;

    fn insert_document(&self, collection: &str, document: &Document) -> Result<(), StorageError>;
    fn get_document(&self, collection: &str, key: &str) -> Result<Option<Document>, StorageError>;
    fn update_document(&self, collection: &str, document: &Document) -> Result<(), StorageError>;
    fn delete_document(&self, collection: &str, key: &str)
    -> Result<Option<Document>, StorageError>;
    fn list_documents(&self, collection: &str) -> Result<Vec<Document>, StorageError>;
}

/// In-memory `Persistence` backed by nested concurrent maps.
#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, Collection>,
    documents: DashMap<String, DashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection_count(&self) -> usize {
        self.collections.len()
    }

    pub fn document_count(&self) -> usize {
        self.documents.iter().map(|entry| entry.value().len()).sum()
    }
}

impl Persistence for MemoryStore {
    fn insert_collection(&self, collection: &Collection) -> Result<(), StorageError> {
        self.collections
            .insert(collection.name.clone(), collection.clone());
        Ok(())
    }

    fn get_collection(&self, name: &str) -> Result<Option<Collection>, StorageError> {
        Ok(self.collections.get(name).map(|entry| entry.value().clone()))
    }

    fn update_collection(&self, collection: &Collection) -> Result<(), StorageError> {
        match self.collections.get_mut(&collection.name) {
            Some(mut entry) => {
                *entry = collection.clone();
                Ok(())
            }
            None => Err(StorageError(format!(
                "collection {} does not exist",
                collection.name
            ))),
        }
    }

    fn delete_collection(&self, name: &str) -> Result<Option<Collection>, StorageError> {
        self.documents.remove(name);
        Ok(self.collections.remove(name).map(|(_, collection)| collection))
    }

    fn list_collections(&self) -> Result<Vec<Collection>, StorageError> {
        Ok(self
            .collections
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn clear_collections(&self) -> Result<Vec<Collection>, StorageError> {
        let removed = self.list_collections()?;
        for collection in &removed {
            self.delete_collection(&collection.name)?;
        }
        Ok(removed)
    }

    fn insert_document(&self, collection: &str, document: &Document) -> Result<(), StorageError> {
        let partition = self
            .documents
            .entry(collection.to_string())
            .or_default();
        partition.insert(document.key.clone(), document.value.clone());
        Ok(())
    }

    fn get_document(&self, collection: &str, key: &str) -> Result<Option<Document>, StorageError> {
        if let Some(partition) = self.documents.get(collection)
            && let Some(value) = partition.get(key)
        {
            return Ok(Some(Document::new(key, value.clone())));
        }
        Ok(None)
    }

    fn update_document(&self, collection: &str, document: &Document) -> Result<(), StorageError> {
        let missing = || {
            StorageError(format!(
                "document {}/{} does not exist",
                collection, document.key
            ))
        };
        let partition = self.documents.get(collection).ok_or_else(missing)?;
        let mut value = partition.get_mut(&document.key).ok_or_else(missing)?;
        *value = document.value.clone();
        Ok(())
    }

    fn delete_document(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<Document>, StorageError> {
        Ok(self
            .documents
            .get(collection)
            .and_then(|partition| partition.remove(key))
            .map(|(key, value)| Document::new(key, value)))
    }

    fn list_documents(&self, collection: &str) -> Result<Vec<Document>, StorageError> {
        Ok(self
            .documents
            .get(collection)
            .map(|partition| {
                partition
                    .iter()
                    .map(|entry| Document::new(entry.key().clone(), entry.value().clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}
