//! Mapping record repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use std::cell::RefCell;
use std::collections::HashMap;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::{MappingFilter, MappingKey, MappingRecord, ObjectRef, Side};
use crate::util::{from_unix_millis, to_unix_millis};

const SELECT_COLUMNS: &str = "SELECT id, integration, integration_object_name, integration_object_id,
        internal_object_name, internal_object_id, last_sync_at, created_at
     FROM object_mappings";

/// Trait for mapping record storage operations
///
/// All writers go through [`MappingStore::insert_if_absent`] or
/// [`MappingStore::upsert`]; both treat a composite-key collision with a record
/// written by another connection as a re-read, never as a failure.
pub trait MappingStore {
    /// First record matching every column set in `filter`
    fn find_one_by(&self, filter: &MappingFilter) -> Result<Option<MappingRecord>>;

    /// Insert `record` unless its composite key already exists.
    ///
    /// Returns the stored record: the new one, or the existing one, which
    /// stays authoritative and is not modified.
    fn insert_if_absent(&self, record: MappingRecord) -> Result<MappingRecord>;

    /// Replace the stored record's key, inserting it when it has no row yet.
    ///
    /// The stored watermark never moves backwards, even when another writer
    /// advanced it after `record` was read; the returned record reflects the
    /// row as stored. If the record's key collides with another row, that row
    /// wins and only its watermark is advanced.
    fn upsert(&self, record: MappingRecord) -> Result<MappingRecord>;

    /// Drop any in-process cached records
    fn invalidate_cache(&self);

    /// Exact lookup by composite key
    fn find_by_key(&self, key: &MappingKey) -> Result<Option<MappingRecord>> {
        self.find_one_by(&MappingFilter::from(key))
    }

    /// Mapping of `object` (stored on `side`) to a counterpart of `counterpart_type`
    fn find_counterpart(
        &self,
        integration: &str,
        side: Side,
        object: &ObjectRef,
        counterpart_type: &str,
    ) -> Result<Option<MappingRecord>> {
        let filter = MappingFilter::default()
            .integration(integration)
            .object(side, object)
            .object_type(side.opposite(), counterpart_type);
        self.find_one_by(&filter)
    }
}

/// `SQLite` implementation of `MappingStore`
///
/// Exact-key reads are served from a per-store cache until
/// [`MappingStore::invalidate_cache`] is called.
pub struct SqliteMappingStore<'a> {
    conn: &'a Connection,
    cache: RefCell<HashMap<MappingKey, MappingRecord>>,
}

impl<'a> SqliteMappingStore<'a> {
    /// Create a new repository with the given connection
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// List mappings for an integration, most recently synced first
    pub fn list_for_integration(
        &self,
        integration: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<MappingRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SELECT_COLUMNS}
             WHERE integration = ?
             ORDER BY last_sync_at DESC, id DESC
             LIMIT ? OFFSET ?"
        ))?;

        let records = stmt
            .query_map(
                params![integration, limit as i64, offset as i64],
                Self::parse_record,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    /// Count stored mappings for an integration
    pub fn count_for_integration(&self, integration: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM object_mappings WHERE integration = ?",
            params![integration],
            |row| row.get(0),
        )?;

        usize::try_from(count)
            .map_err(|_| Error::Database(format!("mapping count '{count}' out of range")))
    }

    fn query_one(&self, filter: &MappingFilter) -> Result<Option<MappingRecord>> {
        let columns = [
            ("integration", filter.integration.as_deref()),
            (
                "integration_object_name",
                filter.integration_object_type.as_deref(),
            ),
            (
                "integration_object_id",
                filter.integration_object_id.as_deref(),
            ),
            (
                "internal_object_name",
                filter.internal_object_type.as_deref(),
            ),
            ("internal_object_id", filter.internal_object_id.as_deref()),
        ];

        let mut clauses = Vec::new();
        let mut values = Vec::new();
        for (column, value) in columns {
            if let Some(value) = value {
                clauses.push(format!("{column} = ?"));
                values.push(Value::Text(value.to_string()));
            }
        }

        if clauses.is_empty() {
            return Err(Error::InvalidInput(
                "mapping filter must constrain at least one column".into(),
            ));
        }

        let sql = format!(
            "{SELECT_COLUMNS}
             WHERE {}
             ORDER BY last_sync_at DESC, id DESC
             LIMIT 1",
            clauses.join(" AND ")
        );

        let record = self
            .conn
            .query_row(&sql, params_from_iter(values), Self::parse_record)
            .optional()?;

        Ok(record)
    }

    fn insert(&self, record: &MappingRecord) -> Result<i64> {
        let key = &record.key;
        self.conn.execute(
            "INSERT INTO object_mappings (
                integration,
                integration_object_name,
                integration_object_id,
                internal_object_name,
                internal_object_id,
                last_sync_at,
                created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                key.integration,
                key.integration_object.object_type,
                key.integration_object.object_id,
                key.internal_object.object_type,
                key.internal_object.object_id,
                to_unix_millis(&record.last_sync_at),
                to_unix_millis(&record.created_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Rewrite row `id`, keeping the later of the stored and incoming watermarks.
    ///
    /// Returns the row as stored afterwards, or `None` when it no longer exists.
    fn update(&self, id: i64, record: &MappingRecord) -> Result<Option<MappingRecord>> {
        let key = &record.key;
        let rows = self.conn.execute(
            "UPDATE object_mappings SET
                integration = ?,
                integration_object_name = ?,
                integration_object_id = ?,
                internal_object_name = ?,
                internal_object_id = ?,
                last_sync_at = MAX(last_sync_at, ?)
             WHERE id = ?",
            params![
                key.integration,
                key.integration_object.object_type,
                key.integration_object.object_id,
                key.internal_object.object_type,
                key.internal_object.object_id,
                to_unix_millis(&record.last_sync_at),
                id,
            ],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        self.query_by_id(id)
    }

    fn query_by_id(&self, id: i64) -> Result<Option<MappingRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?"),
                params![id],
                Self::parse_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Read the row another writer created for `key`, bypassing the cache
    fn reread(&self, key: &MappingKey) -> Result<MappingRecord> {
        self.query_one(&MappingFilter::from(key))?
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    /// Resolve a composite-key collision in favour of the stored row
    fn merge_into_existing(&self, record: &MappingRecord) -> Result<MappingRecord> {
        let existing = self
            .reread(&record.key)?
            .advance_last_sync_at(record.last_sync_at);
        let id = existing
            .id
            .ok_or_else(|| Error::Database("stored mapping has no id".into()))?;

        self.conn.execute(
            "UPDATE object_mappings SET last_sync_at = MAX(last_sync_at, ?) WHERE id = ?",
            params![to_unix_millis(&existing.last_sync_at), id],
        )?;
        tracing::warn!(
            "Mapping {} already stored as #{id}; kept existing row",
            record.key
        );
        Ok(existing)
    }

    fn remember(&self, record: &MappingRecord) {
        self.cache
            .borrow_mut()
            .insert(record.key.clone(), record.clone());
    }

    /// Parse a mapping record from a database row
    fn parse_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<MappingRecord> {
        let millis = |idx: usize| -> rusqlite::Result<_> {
            let value: i64 = row.get(idx)?;
            from_unix_millis(value).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, value))
        };

        let key = MappingKey::new(
            row.get::<_, String>(1)?,
            ObjectRef::new(row.get::<_, String>(2)?, row.get::<_, String>(3)?),
            ObjectRef::new(row.get::<_, String>(4)?, row.get::<_, String>(5)?),
        );

        Ok(MappingRecord {
            id: Some(row.get(0)?),
            key,
            last_sync_at: millis(6)?,
            created_at: millis(7)?,
        })
    }
}

impl MappingStore for SqliteMappingStore<'_> {
    fn find_one_by(&self, filter: &MappingFilter) -> Result<Option<MappingRecord>> {
        let key = filter.as_key();
        if let Some(cached) = key.as_ref().and_then(|key| self.cache.borrow().get(key).cloned()) {
            return Ok(Some(cached));
        }

        let record = self.query_one(filter)?;
        if let (Some(record), Some(_)) = (&record, key) {
            self.remember(record);
        }
        Ok(record)
    }

    fn insert_if_absent(&self, record: MappingRecord) -> Result<MappingRecord> {
        let stored = match self.insert(&record) {
            Ok(id) => record.with_id(id),
            Err(error) if error.is_constraint_violation() => {
                tracing::warn!(
                    "Mapping {} was created concurrently; using stored row",
                    record.key
                );
                self.reread(&record.key)?
            }
            Err(error) => return Err(error),
        };

        self.remember(&stored);
        Ok(stored)
    }

    fn upsert(&self, record: MappingRecord) -> Result<MappingRecord> {
        let written = match record.id {
            Some(id) => self.update(id, &record),
            None => Ok(None),
        };

        let stored = match written {
            Ok(Some(stored)) => stored,
            // No row yet, or the row was removed underneath us
            Ok(None) => match self.insert(&record) {
                Ok(id) => record.with_id(id),
                Err(error) if error.is_constraint_violation() => {
                    self.merge_into_existing(&record)?
                }
                Err(error) => return Err(error),
            },
            Err(error) if error.is_constraint_violation() => self.merge_into_existing(&record)?,
            Err(error) => return Err(error),
        };

        self.remember(&stored);
        Ok(stored)
    }

    fn invalidate_cache(&self) {
        self.cache.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, hour, 0, 0).unwrap()
    }

    fn key(internal_id: &str) -> MappingKey {
        MappingKey::new(
            "crm-x",
            ObjectRef::new("contact", "42"),
            ObjectRef::new("contact", internal_id),
        )
    }

    #[test]
    fn test_insert_and_find_by_key() {
        let db = setup();
        let store = SqliteMappingStore::new(db.connection());

        let stored = store
            .insert_if_absent(MappingRecord::new(key("7"), at(9)))
            .unwrap();
        assert!(stored.id.is_some());

        store.invalidate_cache();
        let fetched = store.find_by_key(&key("7")).unwrap().unwrap();
        assert_eq!(fetched.id, stored.id);
        assert_eq!(fetched.key, key("7"));
        assert_eq!(fetched.last_sync_at, at(9));
    }

    #[test]
    fn test_find_counterpart_from_either_side() {
        let db = setup();
        let store = SqliteMappingStore::new(db.connection());
        store
            .insert_if_absent(MappingRecord::new(key("7"), at(9)))
            .unwrap();

        let from_integration = store
            .find_counterpart(
                "crm-x",
                Side::Integration,
                &ObjectRef::new("contact", "42"),
                "contact",
            )
            .unwrap()
            .unwrap();
        let from_internal = store
            .find_counterpart(
                "crm-x",
                Side::Internal,
                &ObjectRef::new("contact", "7"),
                "contact",
            )
            .unwrap()
            .unwrap();

        assert_eq!(from_integration, from_internal);
        assert!(store
            .find_counterpart(
                "crm-x",
                Side::Internal,
                &ObjectRef::new("contact", "7"),
                "lead",
            )
            .unwrap()
            .is_none());
        assert!(store
            .find_counterpart(
                "crm-y",
                Side::Internal,
                &ObjectRef::new("contact", "7"),
                "contact",
            )
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_insert_if_absent_keeps_existing_row() {
        let db = setup();
        let store = SqliteMappingStore::new(db.connection());

        let first = store
            .insert_if_absent(MappingRecord::new(key("7"), at(9)))
            .unwrap();
        store.invalidate_cache();
        let second = store
            .insert_if_absent(MappingRecord::new(key("7"), at(11)))
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.last_sync_at, at(9));
        assert_eq!(store.count_for_integration("crm-x").unwrap(), 1);
    }

    #[test]
    fn test_concurrent_connections_create_one_row() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("race.db");
        let db_a = Database::open(&db_path).unwrap();
        let db_b = Database::open(&db_path).unwrap();
        let store_a = SqliteMappingStore::new(db_a.connection());
        let store_b = SqliteMappingStore::new(db_b.connection());

        // Both drivers looked up the key before either wrote it
        assert!(store_a.find_by_key(&key("7")).unwrap().is_none());
        assert!(store_b.find_by_key(&key("7")).unwrap().is_none());

        let a = store_a
            .insert_if_absent(MappingRecord::new(key("7"), at(9)))
            .unwrap();
        let b = store_b
            .insert_if_absent(MappingRecord::new(key("7"), at(10)))
            .unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(b.last_sync_at, at(9));
        assert_eq!(store_a.count_for_integration("crm-x").unwrap(), 1);
    }

    #[test]
    fn test_upsert_replaces_record() {
        let db = setup();
        let store = SqliteMappingStore::new(db.connection());

        let stored = store.upsert(MappingRecord::new(key("7"), at(9))).unwrap();
        let moved = store
            .upsert(
                stored
                    .with_object(Side::Internal, ObjectRef::new("contact", "8"))
                    .advance_last_sync_at(at(10)),
            )
            .unwrap();

        store.invalidate_cache();
        assert!(store.find_by_key(&key("7")).unwrap().is_none());
        let fetched = store.find_by_key(&key("8")).unwrap().unwrap();
        assert_eq!(fetched.id, moved.id);
        assert_eq!(fetched.last_sync_at, at(10));
    }

    #[test]
    fn test_upsert_collision_advances_existing_watermark() {
        let db = setup();
        let store = SqliteMappingStore::new(db.connection());

        let existing = store.upsert(MappingRecord::new(key("8"), at(9))).unwrap();
        let other = store.upsert(MappingRecord::new(key("7"), at(9))).unwrap();

        // Reassign the second mapping onto the first one's identity
        let merged = store
            .upsert(
                other
                    .with_object(Side::Internal, ObjectRef::new("contact", "8"))
                    .advance_last_sync_at(at(12)),
            )
            .unwrap();

        assert_eq!(merged.id, existing.id);
        assert_eq!(merged.last_sync_at, at(12));

        store.invalidate_cache();
        let fetched = store.find_by_key(&key("8")).unwrap().unwrap();
        assert_eq!(fetched.last_sync_at, at(12));
    }

    #[test]
    fn test_upsert_keeps_later_watermark_from_other_connection() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("watermark.db");
        let db_a = Database::open(&db_path).unwrap();
        let db_b = Database::open(&db_path).unwrap();
        let store_a = SqliteMappingStore::new(db_a.connection());
        let store_b = SqliteMappingStore::new(db_b.connection());

        store_a.upsert(MappingRecord::new(key("7"), at(9))).unwrap();

        // Driver A reads, then driver B syncs a later change first
        let read_by_a = store_a.find_by_key(&key("7")).unwrap().unwrap();
        let read_by_b = store_b.find_by_key(&key("7")).unwrap().unwrap();
        store_b
            .upsert(read_by_b.advance_last_sync_at(at(12)))
            .unwrap();

        let written_by_a = store_a
            .upsert(read_by_a.advance_last_sync_at(at(10)))
            .unwrap();
        assert_eq!(written_by_a.last_sync_at, at(12));

        store_a.invalidate_cache();
        let stored = store_a.find_by_key(&key("7")).unwrap().unwrap();
        assert_eq!(stored.last_sync_at, at(12));
        assert_eq!(store_a.count_for_integration("crm-x").unwrap(), 1);
    }

    #[test]
    fn test_cache_serves_until_invalidated() {
        let db = setup();
        let store = SqliteMappingStore::new(db.connection());
        store
            .insert_if_absent(MappingRecord::new(key("7"), at(9)))
            .unwrap();

        db.connection()
            .execute(
                "UPDATE object_mappings SET last_sync_at = ?",
                params![to_unix_millis(&at(15))],
            )
            .unwrap();

        let cached = store.find_by_key(&key("7")).unwrap().unwrap();
        assert_eq!(cached.last_sync_at, at(9));

        store.invalidate_cache();
        let fresh = store.find_by_key(&key("7")).unwrap().unwrap();
        assert_eq!(fresh.last_sync_at, at(15));
    }

    #[test]
    fn test_empty_filter_is_rejected() {
        let db = setup();
        let store = SqliteMappingStore::new(db.connection());

        let error = store.find_one_by(&MappingFilter::default()).unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[test]
    fn test_list_for_integration_orders_by_watermark() {
        let db = setup();
        let store = SqliteMappingStore::new(db.connection());
        store.upsert(MappingRecord::new(key("7"), at(9))).unwrap();
        store.upsert(MappingRecord::new(key("8"), at(11))).unwrap();

        let records = store.list_for_integration("crm-x", 10, 0).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key, key("8"));
        assert!(store.list_for_integration("crm-y", 10, 0).unwrap().is_empty());
    }
}
