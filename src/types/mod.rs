//! Shared types

mod error;

pub use error::{ProvisionError, Result};
