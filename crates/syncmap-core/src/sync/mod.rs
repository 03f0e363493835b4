//! Identity reconciliation between the internal store and integrations.
//!
//! [`IdentityResolver`] finds (or infers) the counterpart of a changed object,
//! [`MappingUpdater`] records the link with a fresh watermark, and
//! [`MappingHelper`] exposes both to a sync driver.

mod fields;
mod resolver;
mod updater;

pub use fields::{FieldResolver, FieldTranslator};
pub use resolver::IdentityResolver;
pub use updater::MappingUpdater;

use crate::db::{MappingStore, ObjectLocator};
use crate::error::Result;
use crate::models::{ChangeDescriptor, MappingRecord, ObjectDescriptor, ReconciliationEvent};

/// Entry point for sync drivers: resolution in both directions plus reconciliation
pub struct MappingHelper<'a> {
    resolver: IdentityResolver<'a>,
    updater: MappingUpdater<'a>,
}

impl<'a> MappingHelper<'a> {
    pub fn new(
        fields: &'a dyn FieldResolver,
        translator: &'a dyn FieldTranslator,
        locator: &'a dyn ObjectLocator,
        store: &'a dyn MappingStore,
        internal_system_name: impl Into<String>,
    ) -> Self {
        Self {
            resolver: IdentityResolver::new(fields, translator, locator, store),
            updater: MappingUpdater::new(store, internal_system_name),
        }
    }

    /// Internal counterpart of an integration object, matching by identifiers
    /// when no mapping exists yet
    pub fn resolve_internal_counterpart(
        &self,
        integration: &str,
        internal_object_type: &str,
        change: &ChangeDescriptor,
    ) -> Result<ObjectDescriptor> {
        self.resolver
            .resolve_internal_counterpart(integration, internal_object_type, change)
    }

    /// Integration counterpart of an internal object, from stored mappings only
    pub fn resolve_integration_counterpart(
        &self,
        integration: &str,
        integration_object_type: &str,
        change: &ChangeDescriptor,
    ) -> Result<ObjectDescriptor> {
        self.resolver
            .resolve_integration_counterpart(integration, integration_object_type, change)
    }

    /// Create or refresh the mapping described by `event`
    pub fn reconcile_mapping(&self, event: &ReconciliationEvent) -> Result<MappingRecord> {
        self.updater.reconcile(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IntegrationRegistry, MappingManual, ObjectMapping, UniqueFieldRegistry};
    use crate::db::{Database, SqliteMappingStore, SqliteObjectLocator};
    use crate::models::{ObjectRef, Side};
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, hour, 0, 0).unwrap()
    }

    fn registries() -> (UniqueFieldRegistry, IntegrationRegistry) {
        (
            UniqueFieldRegistry::default().with_fields("contact", ["email"]),
            IntegrationRegistry::default().with_integration(
                "crm-x",
                MappingManual::default()
                    .with_object(ObjectMapping::new("contact", "contact").with_field("email", "email")),
            ),
        )
    }

    fn index_contact(db: &Database, id: &str, email: &str) {
        let fields = BTreeMap::from([("email".to_string(), email.to_string())]);
        SqliteObjectLocator::new(db.connection())
            .index_object("contact", id, &fields)
            .unwrap();
    }

    #[test]
    fn test_resolve_then_reconcile_round_trip() {
        let db = Database::open_in_memory().unwrap();
        index_contact(&db, "7", "a@b.com");
        let (fields, translator) = registries();
        let locator = SqliteObjectLocator::new(db.connection());
        let store = SqliteMappingStore::new(db.connection());
        let helper = MappingHelper::new(&fields, &translator, &locator, &store, "internal");

        let report = ChangeDescriptor::new("crm-x", "contact", "42", at(8))
            .unwrap()
            .with_field("email", "a@b.com");
        let internal = helper
            .resolve_internal_counterpart("crm-x", "contact", &report)
            .unwrap();
        assert_eq!(internal.object_id.as_deref(), Some("7"));

        // The internal side later pushes its own change to the integration
        let order = ChangeDescriptor::new("internal", "contact", "42", at(9))
            .unwrap()
            .with_mapped_object("contact", "7");
        let record = helper
            .reconcile_mapping(&ReconciliationEvent::new("crm-x", order, at(10)))
            .unwrap();
        assert_eq!(record.last_sync_at, at(10));

        let internal_change = ChangeDescriptor::new("internal", "contact", "7", at(11)).unwrap();
        let integration = helper
            .resolve_integration_counterpart("crm-x", "contact", &internal_change)
            .unwrap();
        assert_eq!(
            integration,
            ObjectDescriptor::resolved("contact", "42", Some(at(10)))
        );
        assert_eq!(store.count_for_integration("crm-x").unwrap(), 1);
    }

    #[test]
    fn test_concurrent_drivers_create_single_mapping() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("drivers.db");
        let seed = Database::open(&db_path).unwrap();
        index_contact(&seed, "7", "a@b.com");
        let (fields, translator) = registries();

        let resolved: Vec<Option<String>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let db_path = db_path.clone();
                    let fields = &fields;
                    let translator = &translator;
                    scope.spawn(move || {
                        let db = Database::open(&db_path).unwrap();
                        let locator = SqliteObjectLocator::new(db.connection());
                        let store = SqliteMappingStore::new(db.connection());
                        let helper =
                            MappingHelper::new(fields, translator, &locator, &store, "internal");
                        let change = ChangeDescriptor::new("crm-x", "contact", "42", at(8))
                            .unwrap()
                            .with_field("email", "a@b.com");
                        helper
                            .resolve_internal_counterpart("crm-x", "contact", &change)
                            .unwrap()
                            .object_id
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect()
        });

        assert!(resolved.iter().all(|id| id.as_deref() == Some("7")));

        let store = SqliteMappingStore::new(seed.connection());
        assert_eq!(store.count_for_integration("crm-x").unwrap(), 1);
        let record = store
            .find_counterpart(
                "crm-x",
                Side::Internal,
                &ObjectRef::new("contact", "7"),
                "contact",
            )
            .unwrap()
            .unwrap();
        assert_eq!(record.last_sync_at, at(8));
    }
}
