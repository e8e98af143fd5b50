//! investing-schema - provision the Investing Agent MongoDB schema

use bson::Bson;
use clap::Parser;
use serde_json::json;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use investing_schema::{
    config::{Args, Command, LogFormat},
    db::MongoClient,
    inspect_schema, provision_schema,
    provision::Drift,
    schema::{catalog, CollectionSpec},
    CONFIRMATION,
};

/// Exit status when `check` finds differences
const EXIT_DRIFT: i32 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Logs go to stderr; stdout carries the confirmation lines and `show` output
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("investing_schema={},info", args.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    match args.log_format {
        LogFormat::Text => registry.with(fmt::layer().with_writer(std::io::stderr)).init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }

    if let Err(e) = args.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    let schema = catalog::investing_agent();

    match args.command() {
        Command::Show => {
            println!("{}", serde_json::to_string_pretty(&describe(&args.mongodb_db, &schema))?);
        }
        Command::Apply => {
            let mongo = MongoClient::new(&args.mongodb_uri, &args.mongodb_db, args.connect_timeout_ms).await?;
            let report = provision_schema(&mongo, &schema, args.on_conflict).await?;
            info!(
                database = %report.database,
                collections = ?report.collection_names(),
                duplicate_indexes = report.duplicate_indexes,
                "Schema provisioned"
            );
            for line in CONFIRMATION {
                println!("{}", line);
            }
        }
        Command::Check => {
            let mongo = MongoClient::new(&args.mongodb_uri, &args.mongodb_db, args.connect_timeout_ms).await?;
            let report = inspect_schema(&mongo, &schema).await?;
            if report.is_clean() {
                info!(database = %args.mongodb_db, "Schema matches declaration");
                return Ok(());
            }
            for finding in &report.findings {
                match &finding.drift {
                    Drift::MissingCollection => warn!(collection = %finding.collection, "Collection is missing"),
                    Drift::ValidatorMismatch => warn!(collection = %finding.collection, "Validator differs"),
                    Drift::MissingIndexes { indexes } => {
                        warn!(collection = %finding.collection, indexes = ?indexes, "Indexes are missing")
                    }
                }
            }
            std::process::exit(EXIT_DRIFT);
        }
    }

    Ok(())
}

/// JSON view of the declared schema
fn describe(database: &str, schema: &[CollectionSpec]) -> serde_json::Value {
    let collections: Vec<_> = schema
        .iter()
        .map(|spec| {
            let indexes: Vec<_> = spec
                .index_plan()
                .indexes
                .iter()
                .map(|index| {
                    json!({
                        "name": index.name(),
                        "keys": Bson::Document(index.key_document()).into_relaxed_extjson(),
                        "unique": index.unique,
                    })
                })
                .collect();
            json!({
                "name": spec.name,
                "validator": Bson::Document(spec.validator()).into_relaxed_extjson(),
                "indexes": indexes,
            })
        })
        .collect();

    json!({ "database": database, "collections": collections })
}
