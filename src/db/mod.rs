//! Database targets for schema provisioning
//!
//! The provisioner only talks to a [`SchemaTarget`]. [`MongoClient`] drives a
//! real server; [`MemoryDatabase`] keeps everything in process and enforces
//! validators and unique indexes on insert.

mod memory;
mod mongo;

use async_trait::async_trait;
use bson::Document;

use crate::schema::IndexSpec;
use crate::types::Result;

pub use memory::MemoryDatabase;
pub use mongo::MongoClient;

/// An existing collection as reported by the engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExistingCollection {
    pub validator: Option<Document>,
}

/// An existing index as reported by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingIndex {
    pub name: String,
    pub keys: Document,
    pub unique: bool,
}

/// Operations the provisioner needs from a database engine
#[async_trait]
pub trait SchemaTarget: Send + Sync {
    /// Name of the database being provisioned
    fn database_name(&self) -> &str;

    /// Look up a collection, returning `None` if it does not exist
    async fn existing_collection(&self, name: &str) -> Result<Option<ExistingCollection>>;

    /// Create a collection with a validator.
    ///
    /// Fails with `NamespaceExists` if the collection is already present.
    async fn create_collection(&self, name: &str, validator: Document) -> Result<()>;

    /// Replace the validator of an existing collection
    async fn replace_validator(&self, name: &str, validator: Document) -> Result<()>;

    /// List the indexes of a collection (including `_id_`)
    async fn list_indexes(&self, name: &str) -> Result<Vec<ExistingIndex>>;

    /// Create indexes. Declaring an identical index again is a no-op.
    async fn create_indexes(&self, name: &str, indexes: &[IndexSpec]) -> Result<()>;
}
