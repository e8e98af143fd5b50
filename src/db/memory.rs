//! In-process schema target
//!
//! Mirrors the server behaviour the provisioner relies on: validators are
//! evaluated on insert, unique indexes reject duplicate keys, and creating
//! an index that already exists with the same definition does nothing.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, Document};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{ExistingCollection, ExistingIndex, SchemaTarget};
use crate::schema::validate::{validate_document, values_equal};
use crate::schema::IndexSpec;
use crate::types::{ProvisionError, Result};

const ID_INDEX: &str = "_id_";

#[derive(Debug, Default)]
struct MemoryCollection {
    validator: Option<Document>,
    indexes: Vec<ExistingIndex>,
    documents: Vec<Document>,
}

impl MemoryCollection {
    fn new(validator: Option<Document>) -> Self {
        Self {
            validator,
            indexes: vec![ExistingIndex {
                name: ID_INDEX.to_string(),
                keys: doc! { "_id": 1 },
                unique: true,
            }],
            documents: Vec::new(),
        }
    }

    /// Values of the indexed fields; missing fields index as null
    fn index_key(keys: &Document, document: &Document) -> Vec<Bson> {
        keys.keys()
            .map(|field| document.get(field).cloned().unwrap_or(Bson::Null))
            .collect()
    }

    /// Index keys collide when every component is equal by value
    fn same_key(a: &[Bson], b: &[Bson]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
    }

    fn find_duplicate(&self, index: &ExistingIndex, candidate: &Document) -> bool {
        let key = Self::index_key(&index.keys, candidate);
        self.documents
            .iter()
            .any(|existing| Self::same_key(&Self::index_key(&index.keys, existing), &key))
    }
}

/// In-memory database implementing [`SchemaTarget`]
#[derive(Debug)]
pub struct MemoryDatabase {
    name: String,
    collections: RwLock<BTreeMap<String, MemoryCollection>>,
}

impl MemoryDatabase {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            collections: RwLock::new(BTreeMap::new()),
        }
    }

    /// Insert a document, enforcing the validator and unique indexes.
    ///
    /// Inserting into a collection that does not exist creates it without a
    /// validator.
    pub async fn insert_one(&self, collection: &str, mut document: Document) -> Result<ObjectId> {
        let mut collections = self.collections.write().await;
        let target = collections
            .entry(collection.to_string())
            .or_insert_with(|| MemoryCollection::new(None));

        let id = match document.get("_id") {
            Some(Bson::ObjectId(id)) => *id,
            Some(other) => {
                return Err(ProvisionError::Database(format!(
                    "only ObjectId _id values are supported, got {}",
                    other
                )))
            }
            None => {
                let id = ObjectId::new();
                document.insert("_id", id);
                id
            }
        };

        if let Some(ref validator) = target.validator {
            let violations = validate_document(validator, &document)?;
            if !violations.is_empty() {
                return Err(ProvisionError::DocumentValidation {
                    collection: collection.to_string(),
                    reasons: violations.iter().map(ToString::to_string).collect(),
                });
            }
        }

        for index in target.indexes.iter().filter(|i| i.unique) {
            if target.find_duplicate(index, &document) {
                return Err(ProvisionError::DuplicateKey(format!(
                    "{} index: {} dup key {:?}",
                    collection,
                    index.name,
                    MemoryCollection::index_key(&index.keys, &document)
                )));
            }
        }

        target.documents.push(document);
        Ok(id)
    }

    /// Number of documents in a collection (0 if it does not exist)
    pub async fn count_documents(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, |c| c.documents.len())
    }

    /// Names of all collections, sorted
    pub async fn collection_names(&self) -> Vec<String> {
        self.collections.read().await.keys().cloned().collect()
    }

    /// Names of the indexes on a collection, in creation order
    pub async fn index_names(&self, collection: &str) -> Vec<String> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.indexes.iter().map(|i| i.name.clone()).collect())
            .unwrap_or_default()
    }
}

fn missing(name: &str) -> ProvisionError {
    ProvisionError::Database(format!("ns does not exist: {}", name))
}

#[async_trait]
impl SchemaTarget for MemoryDatabase {
    fn database_name(&self) -> &str {
        &self.name
    }

    async fn existing_collection(&self, name: &str) -> Result<Option<ExistingCollection>> {
        Ok(self
            .collections
            .read()
            .await
            .get(name)
            .map(|c| ExistingCollection {
                validator: c.validator.clone(),
            }))
    }

    async fn create_collection(&self, name: &str, validator: Document) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(ProvisionError::NamespaceExists(format!(
                "{}.{}",
                self.name, name
            )));
        }
        collections.insert(name.to_string(), MemoryCollection::new(Some(validator)));
        debug!(collection = name, "created collection");
        Ok(())
    }

    async fn replace_validator(&self, name: &str, validator: Document) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections.get_mut(name).ok_or_else(|| missing(name))?;
        collection.validator = Some(validator);
        Ok(())
    }

    async fn list_indexes(&self, name: &str) -> Result<Vec<ExistingIndex>> {
        self.collections
            .read()
            .await
            .get(name)
            .map(|c| c.indexes.clone())
            .ok_or_else(|| missing(name))
    }

    async fn create_indexes(&self, name: &str, indexes: &[IndexSpec]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .entry(name.to_string())
            .or_insert_with(|| MemoryCollection::new(None));

        // Check every index before applying any, like a single createIndexes command
        let mut pending: Vec<ExistingIndex> = Vec::new();
        for index in indexes {
            let candidate = ExistingIndex {
                name: index.name(),
                keys: index.key_document(),
                unique: index.unique,
            };

            if let Some(existing) = collection
                .indexes
                .iter()
                .chain(pending.iter())
                .find(|i| i.name == candidate.name)
            {
                if *existing == candidate {
                    continue;
                }
                return Err(ProvisionError::IndexConflict(format!(
                    "an index named '{}' already exists with a different definition",
                    candidate.name
                )));
            }

            if candidate.unique {
                let mut seen: Vec<Vec<Bson>> = Vec::new();
                for document in &collection.documents {
                    let key = MemoryCollection::index_key(&candidate.keys, document);
                    if seen.iter().any(|other| MemoryCollection::same_key(other, &key)) {
                        return Err(ProvisionError::DuplicateKey(format!(
                            "cannot build unique index {} on {}: dup key {:?}",
                            candidate.name, name, key
                        )));
                    }
                    seen.push(key);
                }
            }

            pending.push(candidate);
        }

        debug!(collection = name, created = pending.len(), "created indexes");
        collection.indexes.extend(pending);
        Ok(())
    }
}
