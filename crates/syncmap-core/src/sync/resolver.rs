//! Find-or-infer resolution of counterpart objects

use std::collections::BTreeMap;

use super::{FieldResolver, FieldTranslator};
use crate::db::{MappingStore, ObjectLocator};
use crate::error::Result;
use crate::models::{ChangeDescriptor, MappingKey, MappingRecord, ObjectDescriptor, ObjectRef, Side};

/// Resolves which object in the other system a changed object corresponds to
pub struct IdentityResolver<'a> {
    fields: &'a dyn FieldResolver,
    translator: &'a dyn FieldTranslator,
    locator: &'a dyn ObjectLocator,
    store: &'a dyn MappingStore,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(
        fields: &'a dyn FieldResolver,
        translator: &'a dyn FieldTranslator,
        locator: &'a dyn ObjectLocator,
        store: &'a dyn MappingStore,
    ) -> Self {
        Self {
            fields,
            translator,
            locator,
            store,
        }
    }

    /// Find the internal object an integration object maps to.
    ///
    /// A stored mapping wins. Without one, the internal store is searched with
    /// every configured identifier the change carries; the first match is linked
    /// and the new mapping persisted with the change's timestamp. No identifiers
    /// or no match yields an unresolved descriptor and writes nothing.
    pub fn resolve_internal_counterpart(
        &self,
        integration: &str,
        internal_object_type: &str,
        change: &ChangeDescriptor,
    ) -> Result<ObjectDescriptor> {
        let integration_object = change.object();

        if let Some(record) = self.store.find_counterpart(
            integration,
            Side::Integration,
            &integration_object,
            internal_object_type,
        )? {
            tracing::debug!("{integration}/{integration_object} already mapped to {}", record.object(Side::Internal));
            return Ok(record.descriptor(Side::Internal));
        }

        let identifiers = self.collect_identifiers(integration, internal_object_type, change)?;
        if identifiers.is_empty() {
            tracing::debug!(
                "No identifier values for {integration}/{integration_object}; treating as new {internal_object_type}"
            );
            return Ok(ObjectDescriptor::unresolved(internal_object_type));
        }

        let matches = self
            .locator
            .find_by_identifiers(internal_object_type, &identifiers)?;
        if matches.len() > 1 {
            tracing::warn!(
                "{} {internal_object_type} objects match {integration}/{integration_object}; linking the first",
                matches.len()
            );
        }
        let Some(object_id) = matches.into_iter().next() else {
            tracing::debug!("No {internal_object_type} matches {integration}/{integration_object}");
            return Ok(ObjectDescriptor::unresolved(internal_object_type));
        };

        let record = MappingRecord::new(
            MappingKey::new(
                integration,
                integration_object,
                ObjectRef::new(internal_object_type, object_id),
            ),
            change.change_timestamp(),
        );
        let stored = self.store.insert_if_absent(record)?;
        tracing::info!("Linked {}", stored.key);

        Ok(stored.descriptor(Side::Internal))
    }

    /// Find the integration object an internal object maps to.
    ///
    /// Only stored mappings are consulted; integrations are never searched.
    pub fn resolve_integration_counterpart(
        &self,
        integration: &str,
        integration_object_type: &str,
        change: &ChangeDescriptor,
    ) -> Result<ObjectDescriptor> {
        let record = self.store.find_counterpart(
            integration,
            Side::Internal,
            &change.object(),
            integration_object_type,
        )?;

        Ok(record.map_or_else(
            || ObjectDescriptor::unresolved(integration_object_type),
            |record| record.descriptor(Side::Integration),
        ))
    }

    /// Identifier values carried by `change`, keyed by internal field name
    fn collect_identifiers(
        &self,
        integration: &str,
        internal_object_type: &str,
        change: &ChangeDescriptor,
    ) -> Result<BTreeMap<String, String>> {
        let mut identifiers = BTreeMap::new();

        for field in self.fields.unique_identifier_fields(internal_object_type)? {
            let Some(integration_field) = self.translator.integration_field(
                integration,
                internal_object_type,
                change.object_type(),
                &field,
            ) else {
                tracing::debug!("{integration} has no field mapped to {internal_object_type}.{field}");
                continue;
            };

            if let Some(value) = change.field(&integration_field) {
                identifiers.insert(field, value.to_string());
            }
        }

        Ok(identifiers)
    }
}
