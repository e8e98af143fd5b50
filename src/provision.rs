//! Schema provisioning
//!
//! Declares every collection of a catalog with its validator and indexes,
//! one collection at a time. Each step is awaited before the next; a
//! failure stops the run and leaves earlier steps in place.

use bson::Document;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{error, info, warn};

use crate::db::{ExistingCollection, SchemaTarget};
use crate::schema::{validate::documents_equal, CollectionSpec};
use crate::types::{ProvisionError, Result};

/// What to do when a collection exists with a different validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Stop with `SchemaConflict`
    #[default]
    Fail,
    /// Overwrite the validator with `collMod`
    Replace,
    /// Leave the existing validator in place
    Keep,
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "replace" => Ok(Self::Replace),
            "keep" => Ok(Self::Keep),
            other => Err(format!(
                "unknown conflict policy '{}' (expected fail, replace or keep)",
                other
            )),
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fail => "fail",
            Self::Replace => "replace",
            Self::Keep => "keep",
        })
    }
}

/// What happened to a collection during provisioning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionOutcome {
    Created,
    Unchanged,
    ValidatorReplaced,
    ValidatorKept,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionReport {
    pub name: String,
    pub outcome: CollectionOutcome,
    /// Indexes declared on the collection (after collapsing repeats)
    pub indexes: Vec<String>,
}

/// Summary of a provisioning run
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionReport {
    pub database: String,
    pub collections: Vec<CollectionReport>,
    /// Index declarations skipped because they repeat an earlier one
    pub duplicate_indexes: usize,
}

impl ProvisionReport {
    pub fn collection(&self, name: &str) -> Option<&CollectionReport> {
        self.collections.iter().find(|c| c.name == name)
    }

    pub fn collection_names(&self) -> Vec<&str> {
        self.collections.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Declare every collection in `catalog` on `target`.
///
/// Re-running against a provisioned database leaves it as it is: collections
/// with an identical validator are not touched and identical indexes are
/// not rebuilt. Documents are never read or modified.
pub async fn provision_schema<T>(
    target: &T,
    catalog: &[CollectionSpec],
    policy: ConflictPolicy,
) -> Result<ProvisionReport>
where
    T: SchemaTarget + ?Sized,
{
    let database = target.database_name().to_string();
    info!(database = %database, collections = catalog.len(), policy = %policy, "Provisioning schema");

    let mut report = ProvisionReport {
        database,
        collections: Vec::with_capacity(catalog.len()),
        duplicate_indexes: 0,
    };

    for spec in catalog {
        let outcome = declare_collection(target, spec, policy)
            .await
            .map_err(|e| fail(spec.name, "declare collection", e))?;

        let plan = spec.index_plan();
        for duplicate in &plan.duplicates {
            warn!(
                collection = spec.name,
                index = %duplicate.name(),
                "Index declared more than once; creating it once"
            );
        }
        report.duplicate_indexes += plan.duplicates.len();

        target
            .create_indexes(spec.name, &plan.indexes)
            .await
            .map_err(|e| fail(spec.name, "create indexes", e))?;

        let indexes: Vec<String> = plan.indexes.iter().map(|i| i.name()).collect();
        info!(collection = spec.name, outcome = ?outcome, indexes = ?indexes, "Collection ready");

        report.collections.push(CollectionReport {
            name: spec.name.to_string(),
            outcome,
            indexes,
        });
    }

    Ok(report)
}

fn fail(collection: &str, step: &'static str, err: ProvisionError) -> ProvisionError {
    error!(collection, step, error = %err, "Provisioning step failed");
    err.at_step(collection, step)
}

async fn declare_collection<T>(
    target: &T,
    spec: &CollectionSpec,
    policy: ConflictPolicy,
) -> Result<CollectionOutcome>
where
    T: SchemaTarget + ?Sized,
{
    let validator = spec.validator();

    if let Some(existing) = target.existing_collection(spec.name).await? {
        return reconcile(target, spec.name, existing, validator, policy).await;
    }

    match target.create_collection(spec.name, validator.clone()).await {
        Ok(()) => Ok(CollectionOutcome::Created),
        Err(ProvisionError::NamespaceExists(_)) => {
            // Created concurrently between the lookup and the create
            let existing = target
                .existing_collection(spec.name)
                .await?
                .unwrap_or_default();
            reconcile(target, spec.name, existing, validator, policy).await
        }
        Err(e) => Err(e),
    }
}

async fn reconcile<T>(
    target: &T,
    name: &str,
    existing: ExistingCollection,
    validator: Document,
    policy: ConflictPolicy,
) -> Result<CollectionOutcome>
where
    T: SchemaTarget + ?Sized,
{
    if validator_matches(&existing, &validator) {
        return Ok(CollectionOutcome::Unchanged);
    }

    match policy {
        ConflictPolicy::Fail => Err(ProvisionError::SchemaConflict {
            collection: name.to_string(),
        }),
        ConflictPolicy::Replace => {
            info!(collection = name, "Replacing validator");
            target.replace_validator(name, validator).await?;
            Ok(CollectionOutcome::ValidatorReplaced)
        }
        ConflictPolicy::Keep => {
            warn!(collection = name, "Collection exists with a different validator; keeping it");
            Ok(CollectionOutcome::ValidatorKept)
        }
    }
}

/// Whether a stored validator is the declared one. Bounds written by mongosh
/// are stored as doubles, so numbers compare by value.
fn validator_matches(existing: &ExistingCollection, declared: &Document) -> bool {
    existing
        .validator
        .as_ref()
        .is_some_and(|stored| documents_equal(stored, declared))
}

/// How a collection differs from its declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Drift {
    MissingCollection,
    ValidatorMismatch,
    MissingIndexes { indexes: Vec<String> },
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionDrift {
    pub collection: String,
    pub drift: Drift,
}

/// Differences between a catalog and a database
#[derive(Debug, Clone, Default, Serialize)]
pub struct DriftReport {
    pub findings: Vec<CollectionDrift>,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn for_collection(&self, name: &str) -> Vec<&Drift> {
        self.findings
            .iter()
            .filter(|f| f.collection == name)
            .map(|f| &f.drift)
            .collect()
    }
}

/// Compare `target` against `catalog` without changing anything.
///
/// Indexes are matched by name, the way the server identifies them.
pub async fn inspect_schema<T>(target: &T, catalog: &[CollectionSpec]) -> Result<DriftReport>
where
    T: SchemaTarget + ?Sized,
{
    let mut report = DriftReport::default();

    for spec in catalog {
        let Some(existing) = target.existing_collection(spec.name).await? else {
            report.findings.push(CollectionDrift {
                collection: spec.name.to_string(),
                drift: Drift::MissingCollection,
            });
            continue;
        };

        if !validator_matches(&existing, &spec.validator()) {
            report.findings.push(CollectionDrift {
                collection: spec.name.to_string(),
                drift: Drift::ValidatorMismatch,
            });
        }

        let present: Vec<String> = target
            .list_indexes(spec.name)
            .await?
            .into_iter()
            .map(|i| i.name)
            .collect();
        let missing: Vec<String> = spec
            .index_names()
            .into_iter()
            .filter(|name| !present.contains(name))
            .collect();
        if !missing.is_empty() {
            report.findings.push(CollectionDrift {
                collection: spec.name.to_string(),
                drift: Drift::MissingIndexes { indexes: missing },
            });
        }
    }

    Ok(report)
}
