use std::path::Path;

use syncmap_core::config::SyncMapConfig;
use syncmap_core::db::{Database, SqliteMappingStore, SqliteObjectLocator};
use syncmap_core::models::ReconciliationEvent;
use syncmap_core::{MappingHelper, MappingRecord};

use crate::commands::common::{open_database, read_input};
use crate::error::CliError;

/// Outcome of one reconcile batch
#[derive(Debug, Default)]
pub struct ReconcileSummary {
    pub reconciled: Vec<MappingRecord>,
    pub failures: Vec<(usize, String)>,
}

impl ReconcileSummary {
    pub fn total(&self) -> usize {
        self.reconciled.len() + self.failures.len()
    }
}

pub fn run_reconcile(
    input: Option<&Path>,
    db_path: &Path,
    config: &SyncMapConfig,
) -> Result<(), CliError> {
    let raw = read_input(input)?;
    let db = open_database(db_path, config)?;
    let summary = reconcile_events(&raw, &db, config);

    for record in &summary.reconciled {
        println!("{} @ {}", record.key, record.last_sync_at.to_rfc3339());
    }
    for (line, error) in &summary.failures {
        eprintln!("line {line}: {error}");
    }

    if summary.failures.is_empty() {
        Ok(())
    } else {
        Err(CliError::ReconcileFailed {
            failed: summary.failures.len(),
            total: summary.total(),
        })
    }
}

/// Reconcile each non-blank JSON line; a bad line is recorded and skipped
pub fn reconcile_events(raw: &str, db: &Database, config: &SyncMapConfig) -> ReconcileSummary {
    let locator = SqliteObjectLocator::new(db.connection());
    let store = SqliteMappingStore::new(db.connection());
    let helper = MappingHelper::new(
        &config.unique_fields,
        &config.integrations,
        &locator,
        &store,
        config.internal_system_name.clone(),
    );

    let mut summary = ReconcileSummary::default();
    for (index, line) in raw.lines().enumerate() {
        let line_number = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let outcome = serde_json::from_str::<ReconciliationEvent>(line)
            .map_err(CliError::from)
            .and_then(|event| helper.reconcile_mapping(&event).map_err(CliError::from));

        match outcome {
            Ok(record) => summary.reconciled.push(record),
            Err(error) => {
                tracing::warn!("Skipping reconciliation event on line {line_number}: {error}");
                summary.failures.push((line_number, error.to_string()));
            }
        }
    }

    summary
}
