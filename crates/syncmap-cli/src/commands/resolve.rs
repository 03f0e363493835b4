use std::path::Path;

use syncmap_core::config::SyncMapConfig;
use syncmap_core::db::{Database, SqliteMappingStore, SqliteObjectLocator};
use syncmap_core::{ChangeDescriptor, MappingHelper, ObjectDescriptor};

use crate::commands::common::{open_database, read_input};
use crate::error::CliError;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    /// Integration object to internal object, inferring links by identifiers
    ToInternal,
    /// Internal object to integration object, stored links only
    ToIntegration,
}

pub fn run_resolve(
    direction: Direction,
    integration: &str,
    object_type: &str,
    input: Option<&Path>,
    db_path: &Path,
    config: &SyncMapConfig,
) -> Result<(), CliError> {
    let change: ChangeDescriptor = serde_json::from_str(&read_input(input)?)?;
    let db = open_database(db_path, config)?;

    let descriptor = resolve_change(direction, integration, object_type, &change, &db, config)?;
    if !descriptor.is_resolved() {
        tracing::info!("No {object_type} counterpart for {}", change.object());
    }
    println!("{}", serde_json::to_string_pretty(&descriptor)?);
    Ok(())
}

pub fn resolve_change(
    direction: Direction,
    integration: &str,
    object_type: &str,
    change: &ChangeDescriptor,
    db: &Database,
    config: &SyncMapConfig,
) -> Result<ObjectDescriptor, CliError> {
    let locator = SqliteObjectLocator::new(db.connection());
    let store = SqliteMappingStore::new(db.connection());
    let helper = MappingHelper::new(
        &config.unique_fields,
        &config.integrations,
        &locator,
        &store,
        config.internal_system_name.clone(),
    );

    let descriptor = match direction {
        Direction::ToInternal => {
            helper.resolve_internal_counterpart(integration, object_type, change)?
        }
        Direction::ToIntegration => {
            helper.resolve_integration_counterpart(integration, object_type, change)?
        }
    };
    Ok(descriptor)
}
