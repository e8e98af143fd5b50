//! Configuration for the schema provisioner
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, Subcommand, ValueEnum};

use crate::provision::ConflictPolicy;
use crate::schema::catalog::DATABASE_NAME;
use crate::types::{ProvisionError, Result};

/// Characters MongoDB does not allow in database names
const FORBIDDEN_DB_CHARS: [char; 7] = ['/', '\\', '.', ' ', '"', '$', '\0'];

/// Maximum database name length in bytes
const MAX_DB_NAME_LEN: usize = 63;

/// Provision the Investing Agent MongoDB schema
///
/// Creates the users, investment_plans and investments collections with
/// their validators and indexes.
#[derive(Parser, Debug, Clone)]
#[command(name = "investing-schema")]
#[command(about = "Provision the Investing Agent MongoDB schema")]
pub struct Args {
    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = DATABASE_NAME)]
    pub mongodb_db: String,

    /// Server selection and connect timeout in milliseconds
    #[arg(long, env = "MONGODB_CONNECT_TIMEOUT_MS", default_value = "3000")]
    pub connect_timeout_ms: u64,

    /// What to do when a collection exists with a different validator
    /// (fail, replace, keep)
    #[arg(long, env = "ON_CONFLICT", default_value = "fail")]
    pub on_conflict: ConflictPolicy,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Create collections, validators and indexes (default)
    Apply,
    /// Report differences between the database and the declared schema
    Check,
    /// Print the declared schema as JSON without connecting
    Show,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Args {
    /// Subcommand to run, `apply` when none is given
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Apply)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.mongodb_db.is_empty() {
            return Err(ProvisionError::Config("MONGODB_DB must not be empty".to_string()));
        }

        if let Some(c) = self.mongodb_db.chars().find(|c| FORBIDDEN_DB_CHARS.contains(c)) {
            return Err(ProvisionError::Config(format!(
                "MONGODB_DB '{}' contains forbidden character {:?}",
                self.mongodb_db, c
            )));
        }

        if self.mongodb_db.len() > MAX_DB_NAME_LEN {
            return Err(ProvisionError::Config(format!(
                "MONGODB_DB must be at most {} bytes",
                MAX_DB_NAME_LEN
            )));
        }

        if self.connect_timeout_ms == 0 {
            return Err(ProvisionError::Config(
                "MONGODB_CONNECT_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }

        if !self.mongodb_uri.starts_with("mongodb://") && !self.mongodb_uri.starts_with("mongodb+srv://") {
            return Err(ProvisionError::Config(
                "MONGODB_URI must start with mongodb:// or mongodb+srv://".to_string(),
            ));
        }

        Ok(())
    }
}
