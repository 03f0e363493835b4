use std::path::Path;

use syncmap_core::config::SyncMapConfig;
use syncmap_core::db::SqliteObjectLocator;
use syncmap_core::util::require_text;

use crate::commands::common::{open_database, parse_field_assignments};
use crate::error::CliError;

pub fn run_index(
    object_type: &str,
    id: &str,
    fields: &[String],
    remove: bool,
    db_path: &Path,
    config: &SyncMapConfig,
) -> Result<(), CliError> {
    let object_type = require_text(object_type, "object_type")?;
    let id = require_text(id, "id")?;
    let fields = parse_field_assignments(fields)?;

    let db = open_database(db_path, config)?;
    let locator = SqliteObjectLocator::new(db.connection());

    if remove {
        let removed = locator.remove_object(&object_type, &id)?;
        println!("Removed {removed} field(s) for {object_type}:{id}");
    } else {
        locator.index_object(&object_type, &id, &fields)?;
        println!("{object_type}:{id}");
    }
    Ok(())
}
