//! Field-level collaborators consulted during identifier matching

use crate::error::Result;

/// Supplies the unique identifier fields of internal object types
pub trait FieldResolver {
    /// Identifier fields of `object_type`, in matching priority order.
    ///
    /// Unknown object types have no identifier fields.
    fn unique_identifier_fields(&self, object_type: &str) -> Result<Vec<String>>;
}

/// Maps internal field names onto an integration's schema
pub trait FieldTranslator {
    /// Integration field carrying `internal_field` for this object pairing.
    ///
    /// `None` means the field is not configured for the integration; callers
    /// skip it rather than failing.
    fn integration_field(
        &self,
        integration: &str,
        internal_object: &str,
        integration_object: &str,
        internal_field: &str,
    ) -> Option<String>;
}
