use std::path::Path;

use syncmap_core::config::SyncMapConfig;
use syncmap_core::db::SqliteMappingStore;

use crate::commands::common::{
    format_mapping_lines, mapping_to_list_item, open_database, MappingListItem,
};
use crate::error::CliError;

pub fn run_mappings(
    integration: &str,
    limit: usize,
    as_json: bool,
    db_path: &Path,
    config: &SyncMapConfig,
) -> Result<(), CliError> {
    let db = open_database(db_path, config)?;
    let records = SqliteMappingStore::new(db.connection()).list_for_integration(
        integration.trim(),
        limit,
        0,
    )?;

    if as_json {
        let json_items = records
            .iter()
            .map(mapping_to_list_item)
            .collect::<Vec<MappingListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No mappings stored for {}.", integration.trim());
        return Ok(());
    }

    for line in format_mapping_lines(&records) {
        println!("{line}");
    }
    Ok(())
}
