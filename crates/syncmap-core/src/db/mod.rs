//! Database layer for syncmap

mod connection;
mod mapping_repository;
mod migrations;
mod object_repository;

pub use connection::{Database, DatabaseConfig};
pub use mapping_repository::{MappingStore, SqliteMappingStore};
pub use object_repository::{ObjectLocator, SqliteObjectLocator};
