use std::collections::BTreeMap;
use std::env;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::Serialize;
use syncmap_core::config::SyncMapConfig;
use syncmap_core::db::Database;
use syncmap_core::MappingRecord;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct MappingListItem {
    pub id: Option<i64>,
    pub integration: String,
    pub integration_object: String,
    pub internal_object: String,
    pub last_sync_at: String,
    pub created_at: String,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("SYNCMAP_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("syncmap")
        .join("syncmap.db")
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> PathBuf {
    cli_config_path
        .or_else(|| env::var_os("SYNCMAP_CONFIG").map(PathBuf::from))
        .unwrap_or_else(default_config_path)
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("syncmap")
        .join("config.json")
}

pub fn load_config(path: &Path) -> Result<SyncMapConfig, CliError> {
    let config = SyncMapConfig::load_from_path(path)?;
    tracing::debug!(
        "Loaded config from {} ({} integration(s))",
        path.display(),
        config.integrations.names().count()
    );
    Ok(config)
}

pub fn open_database(path: &Path, config: &SyncMapConfig) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Database::open_with_config(path, &config.database_config())?)
}

/// Read the whole input file, or stdin when no path is given
pub fn read_input(path: Option<&Path>) -> Result<String, CliError> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            io::stdin().lock().read_to_string(&mut buffer)?;
            buffer
        }
    };

    if raw.trim().is_empty() {
        return Err(CliError::EmptyInput);
    }
    Ok(raw)
}

/// Split `NAME=VALUE`; the value may itself contain `=`
pub fn parse_field_assignment(raw: &str) -> Result<(String, String), CliError> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| CliError::InvalidField(raw.to_string()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::InvalidField(raw.to_string()));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

pub fn parse_field_assignments(raw: &[String]) -> Result<BTreeMap<String, String>, CliError> {
    raw.iter().map(|field| parse_field_assignment(field)).collect()
}

pub fn mapping_to_list_item(record: &MappingRecord) -> MappingListItem {
    MappingListItem {
        id: record.id,
        integration: record.key.integration.clone(),
        integration_object: record.key.integration_object.to_string(),
        internal_object: record.key.internal_object.to_string(),
        last_sync_at: record.last_sync_at.to_rfc3339(),
        created_at: record.created_at.to_rfc3339(),
    }
}

pub fn format_mapping_lines(records: &[MappingRecord]) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let integration_object = record.key.integration_object.to_string();
            let internal_object = record.key.internal_object.to_string();
            let synced = record.last_sync_at.format("%Y-%m-%d %H:%M:%S UTC");
            format!("{integration_object:<24}  {internal_object:<24}  {synced}")
        })
        .collect()
}
