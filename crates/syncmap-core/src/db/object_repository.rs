//! Internal object identifier index and locator

use std::collections::BTreeMap;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

use crate::error::Result;

/// Finds internal objects by their unique identifier values
pub trait ObjectLocator {
    /// Ids of `object_type` objects matching *every* pair in `identifiers`.
    ///
    /// Results are ordered deterministically, oldest indexed object first. An
    /// empty identifier map matches nothing.
    fn find_by_identifiers(
        &self,
        object_type: &str,
        identifiers: &BTreeMap<String, String>,
    ) -> Result<Vec<String>>;
}

/// `SQLite` implementation of `ObjectLocator` over `internal_object_fields`
pub struct SqliteObjectLocator<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteObjectLocator<'a> {
    /// Create a new locator with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Record identifier values for an internal object, replacing previous values
    /// of the same fields. Blank values remove the field.
    ///
    /// All fields are written in one transaction, so a failure leaves the
    /// previous identifier set intact.
    pub fn index_object(
        &self,
        object_type: &str,
        object_id: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<()> {
        // Dropping the transaction on error rolls it back
        let tx = self.conn.unchecked_transaction()?;
        for (field, value) in fields {
            let value = value.trim();
            if value.is_empty() {
                tx.execute(
                    "DELETE FROM internal_object_fields
                     WHERE object_type = ? AND object_id = ? AND field = ?",
                    params![object_type, object_id, field],
                )?;
                continue;
            }

            tx.execute(
                "INSERT INTO internal_object_fields (object_type, object_id, field, value)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(object_type, object_id, field) DO UPDATE SET value = excluded.value",
                params![object_type, object_id, field, value],
            )?;
        }
        tx.commit()?;

        tracing::debug!("Indexed {} field(s) for {object_type}:{object_id}", fields.len());
        Ok(())
    }

    /// Remove every identifier value of an internal object
    pub fn remove_object(&self, object_type: &str, object_id: &str) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM internal_object_fields WHERE object_type = ? AND object_id = ?",
            params![object_type, object_id],
        )?;
        Ok(rows)
    }
}

impl ObjectLocator for SqliteObjectLocator<'_> {
    fn find_by_identifiers(
        &self,
        object_type: &str,
        identifiers: &BTreeMap<String, String>,
    ) -> Result<Vec<String>> {
        if identifiers.is_empty() {
            return Ok(Vec::new());
        }

        let mut values = vec![Value::Text(object_type.to_string())];
        let mut clauses = Vec::with_capacity(identifiers.len());
        for (field, value) in identifiers {
            clauses.push("(field = ? AND value = ?)");
            values.push(Value::Text(field.clone()));
            values.push(Value::Text(value.trim().to_string()));
        }
        values.push(Value::Integer(i64::try_from(identifiers.len()).unwrap_or(i64::MAX)));

        // One row per (object, field), so a full count means every pair matched
        let sql = format!(
            "SELECT object_id
             FROM internal_object_fields
             WHERE object_type = ? AND ({})
             GROUP BY object_id
             HAVING COUNT(*) = ?
             ORDER BY MIN(rowid)",
            clauses.join(" OR ")
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(values), |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(ids)
    }
}
