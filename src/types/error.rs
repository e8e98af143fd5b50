//! Error types for schema provisioning
//!
//! MongoDB server errors are classified by code so that callers can tell
//! connectivity problems apart from schema conflicts.

use mongodb::error::ErrorKind;

/// Server code for an operation the authenticated user may not perform
const UNAUTHORIZED: i32 = 13;
/// Server code for a failed authentication handshake
const AUTHENTICATION_FAILED: i32 = 18;
/// Server code for `createCollection` on an existing namespace
const NAMESPACE_EXISTS: i32 = 48;
/// Server code for an index name reused with different options
const INDEX_OPTIONS_CONFLICT: i32 = 85;
/// Server code for an index name reused with different keys
const INDEX_KEY_SPECS_CONFLICT: i32 = 86;
/// Server code for a unique index violation
const DUPLICATE_KEY: i32 = 11000;

/// Main error type for provisioning operations
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Collection '{collection}' exists with a different validator")]
    SchemaConflict { collection: String },

    #[error("Collection '{0}' already exists")]
    NamespaceExists(String),

    #[error("Index conflict: {0}")]
    IndexConflict(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Document failed validation for '{collection}': {}", .reasons.join("; "))]
    DocumentValidation {
        collection: String,
        reasons: Vec<String>,
    },

    #[error("Unsupported validator: {0}")]
    UnsupportedValidator(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{step} failed for '{collection}': {source}")]
    Step {
        collection: String,
        step: &'static str,
        #[source]
        source: Box<ProvisionError>,
    },
}

impl ProvisionError {
    /// Attach the collection and provisioning step to an error
    pub fn at_step(self, collection: &str, step: &'static str) -> Self {
        Self::Step {
            collection: collection.to_string(),
            step,
            source: Box::new(self),
        }
    }

    /// The underlying error, looking through step context
    pub fn root(&self) -> &ProvisionError {
        match self {
            Self::Step { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<mongodb::error::Error> for ProvisionError {
    fn from(err: mongodb::error::Error) -> Self {
        match err.kind.as_ref() {
            ErrorKind::Command(command) => match command.code {
                UNAUTHORIZED | AUTHENTICATION_FAILED => Self::Unauthorized(command.message.clone()),
                NAMESPACE_EXISTS => Self::NamespaceExists(command.message.clone()),
                INDEX_OPTIONS_CONFLICT | INDEX_KEY_SPECS_CONFLICT => {
                    Self::IndexConflict(command.message.clone())
                }
                DUPLICATE_KEY => Self::DuplicateKey(command.message.clone()),
                _ => Self::Database(err.to_string()),
            },
            ErrorKind::Authentication { message, .. } => Self::Unauthorized(message.clone()),
            ErrorKind::ServerSelection { message, .. } => Self::Connection(message.clone()),
            ErrorKind::Io(io) => Self::Connection(io.to_string()),
            ErrorKind::ConnectionPoolCleared { message, .. } => Self::Connection(message.clone()),
            ErrorKind::DnsResolve { message, .. } => Self::Connection(message.clone()),
            _ => Self::Database(err.to_string()),
        }
    }
}

/// Result type alias for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisionError>;
