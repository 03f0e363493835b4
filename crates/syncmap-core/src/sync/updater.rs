//! Mapping creation and watermark refresh after a successful sync

use crate::db::MappingStore;
use crate::error::{Error, Result};
use crate::models::{
    ChangeDescriptor, MappingFilter, MappingKey, MappingRecord, ObjectRef, ReconciliationEvent,
    Side,
};
use crate::util::require_text;

/// Writes reconciliation results to the mapping store
pub struct MappingUpdater<'a> {
    store: &'a dyn MappingStore,
    internal_system_name: String,
}

impl<'a> MappingUpdater<'a> {
    pub fn new(store: &'a dyn MappingStore, internal_system_name: impl Into<String>) -> Self {
        Self {
            store,
            internal_system_name: internal_system_name.into(),
        }
    }

    /// Half of the mapping record the changed object lives on.
    ///
    /// A change carrying the internal system name was written *into* the
    /// integration on the internal side's behalf, so its own identity is the
    /// integration object and its mapped identity is the internal one.
    pub fn changed_side(&self, change: &ChangeDescriptor) -> Side {
        if change.system() == self.internal_system_name {
            Side::Integration
        } else {
            Side::Internal
        }
    }

    /// Create or refresh the mapping described by `event`.
    ///
    /// An existing record keeps its row: the changed half is pointed at the
    /// event's current identity and the watermark only moves forward. A new
    /// record stores both halves in full with `modified_at` as its watermark.
    pub fn reconcile(&self, event: &ReconciliationEvent) -> Result<MappingRecord> {
        let integration = require_text(event.integration.as_str(), "integration")?;
        let current_object = ObjectRef::new(
            require_text(event.object_type.as_str(), "object_type")?,
            require_text(event.object_id.as_str(), "object_id")?,
        );

        let change = &event.change;
        if change.system() != self.internal_system_name && change.system() != integration {
            return Err(Error::InvalidInput(format!(
                "change from '{}' cannot update mappings of '{integration}'",
                change.system()
            )));
        }

        let counterpart = change.mapped_object().ok_or_else(|| {
            Error::InvalidInput(format!(
                "change to {} has no mapped object",
                change.object()
            ))
        })?;

        let current = self.changed_side(change);
        let stable = current.opposite();

        let filter = MappingFilter::default()
            .integration(integration.clone())
            .object(current, &change.object())
            .object(stable, &counterpart);

        let record = match self.store.find_one_by(&filter)? {
            Some(existing) => existing
                .with_object(current, current_object)
                .advance_last_sync_at(event.modified_at),
            None => MappingRecord::new(
                key_for(integration, current, current_object, counterpart),
                event.modified_at,
            ),
        };

        let stored = self.store.upsert(record)?;
        self.store.invalidate_cache();
        tracing::info!(
            "Reconciled {} (synced {})",
            stored.key,
            stored.last_sync_at.to_rfc3339()
        );

        Ok(stored)
    }
}

/// Key with `current` on the changed half and `counterpart` on the other
fn key_for(
    integration: String,
    current_side: Side,
    current: ObjectRef,
    counterpart: ObjectRef,
) -> MappingKey {
    match current_side {
        Side::Integration => MappingKey::new(integration, current, counterpart),
        Side::Internal => MappingKey::new(integration, counterpart, current),
    }
}
