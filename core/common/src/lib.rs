//! Common types shared by the jsonloc crates.
//!
//! Location keys, document identifiers and the single error type used across
//! discovery, the registry and the sync engine.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{slugify, DocumentId, LocationKey, LocationKind};
