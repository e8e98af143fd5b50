//! Declarative collection schemas
//!
//! A collection is described as data: required fields, per-field constraints
//! and index declarations. The provisioner renders each [`CollectionSpec`]
//! into a MongoDB `$jsonSchema` validator and a list of index models.

pub mod catalog;
pub mod validate;

use bson::{doc, Bson, Document};
use mongodb::options::IndexOptions;

/// MongoDB `bsonType` aliases used by the catalog
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BsonType {
    Object,
    String,
    Int,
    /// Any numeric type: int, long, double or decimal
    Number,
    Date,
    Array,
}

impl BsonType {
    /// The alias as written in a `$jsonSchema` document
    pub fn alias(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::String => "string",
            Self::Int => "int",
            Self::Number => "number",
            Self::Date => "date",
            Self::Array => "array",
        }
    }
}

/// Constraints for a single top-level field
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub bson_type: BsonType,
    pub pattern: Option<&'static str>,
    pub allowed: Option<Vec<&'static str>>,
    pub minimum: Option<Bson>,
    pub maximum: Option<Bson>,
}

impl FieldSpec {
    pub fn new(name: &'static str, bson_type: BsonType) -> Self {
        Self {
            name,
            bson_type,
            pattern: None,
            allowed: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::new(name, BsonType::String)
    }

    pub fn int(name: &'static str) -> Self {
        Self::new(name, BsonType::Int)
    }

    pub fn number(name: &'static str) -> Self {
        Self::new(name, BsonType::Number)
    }

    pub fn date(name: &'static str) -> Self {
        Self::new(name, BsonType::Date)
    }

    pub fn object(name: &'static str) -> Self {
        Self::new(name, BsonType::Object)
    }

    pub fn array(name: &'static str) -> Self {
        Self::new(name, BsonType::Array)
    }

    /// Require string values to match a regular expression
    pub fn pattern(mut self, pattern: &'static str) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Restrict values to a fixed set of strings
    pub fn one_of(mut self, values: &[&'static str]) -> Self {
        self.allowed = Some(values.to_vec());
        self
    }

    /// Inclusive lower bound
    pub fn minimum(mut self, value: impl Into<Bson>) -> Self {
        self.minimum = Some(value.into());
        self
    }

    /// Inclusive upper bound
    pub fn maximum(mut self, value: impl Into<Bson>) -> Self {
        self.maximum = Some(value.into());
        self
    }

    /// Inclusive range
    pub fn range(self, min: impl Into<Bson>, max: impl Into<Bson>) -> Self {
        self.minimum(min).maximum(max)
    }

    /// Render as a `properties` entry
    pub fn to_property(&self) -> Document {
        let mut property = doc! { "bsonType": self.bson_type.alias() };
        if let Some(pattern) = self.pattern {
            property.insert("pattern", pattern);
        }
        if let Some(ref allowed) = self.allowed {
            property.insert("enum", allowed.clone());
        }
        if let Some(ref minimum) = self.minimum {
            property.insert("minimum", minimum.clone());
        }
        if let Some(ref maximum) = self.maximum {
            property.insert("maximum", maximum.clone());
        }
        property
    }
}

/// Index key direction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

/// A secondary index declaration
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexSpec {
    pub keys: Vec<(&'static str, SortOrder)>,
    pub unique: bool,
}

impl IndexSpec {
    pub fn ascending(field: &'static str) -> Self {
        Self {
            keys: vec![(field, SortOrder::Ascending)],
            unique: false,
        }
    }

    pub fn descending(field: &'static str) -> Self {
        Self {
            keys: vec![(field, SortOrder::Descending)],
            unique: false,
        }
    }

    pub fn compound(keys: &[(&'static str, SortOrder)]) -> Self {
        Self {
            keys: keys.to_vec(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Default MongoDB index name, e.g. `user_id_1_created_at_-1`
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, order)| format!("{}_{}", field, order.as_i32()))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Key document in declaration order
    pub fn key_document(&self) -> Document {
        let mut keys = Document::new();
        for (field, order) in &self.keys {
            keys.insert(*field, order.as_i32());
        }
        keys
    }

    /// Keys and options for `createIndexes`
    pub fn to_model(&self) -> (Document, IndexOptions) {
        let options = IndexOptions::builder()
            .name(self.name())
            .unique(self.unique.then_some(true))
            .build();
        (self.key_document(), options)
    }
}

/// A collection with its validator and indexes
#[derive(Clone, Debug)]
pub struct CollectionSpec {
    pub name: &'static str,
    pub required: Vec<&'static str>,
    pub fields: Vec<FieldSpec>,
    pub indexes: Vec<IndexSpec>,
}

/// Indexes to create, after collapsing repeated declarations
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexPlan {
    pub indexes: Vec<IndexSpec>,
    pub duplicates: Vec<IndexSpec>,
}

impl CollectionSpec {
    /// The `{ $jsonSchema: ... }` validator document
    pub fn validator(&self) -> Document {
        let mut properties = Document::new();
        for field in &self.fields {
            properties.insert(field.name, field.to_property());
        }

        doc! {
            "$jsonSchema": {
                "bsonType": BsonType::Object.alias(),
                "required": self.required.clone(),
                "properties": properties,
            }
        }
    }

    /// Split declared indexes into the set to create and repeated declarations
    pub fn index_plan(&self) -> IndexPlan {
        let mut plan = IndexPlan::default();
        for index in &self.indexes {
            if plan.indexes.contains(index) {
                plan.duplicates.push(index.clone());
            } else {
                plan.indexes.push(index.clone());
            }
        }
        plan
    }

    /// Names of the indexes this collection should carry
    pub fn index_names(&self) -> Vec<String> {
        self.index_plan().indexes.iter().map(IndexSpec::name).collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}
