//! syncmap-core - Core library for syncmap
//!
//! This crate contains the mapping models, the SQLite-backed mapping store and
//! object locator, and the identity reconciliation engine that keeps internal
//! objects linked to their integration counterparts.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{ChangeDescriptor, MappingKey, MappingRecord, ObjectDescriptor, ObjectRef};
pub use sync::MappingHelper;
