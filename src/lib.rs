//! Investing Agent schema provisioning
//!
//! Prepares the `investing_agent` MongoDB database: the `users`,
//! `investment_plans` and `investments` collections, their `$jsonSchema`
//! validators and secondary indexes.
//!
//! ## Modules
//!
//! - **schema**: collections described as data, rendered into validators and index models
//! - **db**: the [`db::SchemaTarget`] seam with MongoDB and in-memory implementations
//! - **provision**: [`provision_schema`] and the read-only [`inspect_schema`]

pub mod config;
pub mod db;
pub mod provision;
pub mod schema;
pub mod types;

pub use config::Args;
pub use provision::{inspect_schema, provision_schema, ConflictPolicy, ProvisionReport};
pub use types::{ProvisionError, Result};

/// Lines printed after a successful run
pub const CONFIRMATION: [&str; 3] = [
    "✅ MongoDB initialized successfully for Investing Agent!",
    "📊 Collections created: users, investment_plans, investments",
    "🔍 Indexes created for optimal query performance",
];
