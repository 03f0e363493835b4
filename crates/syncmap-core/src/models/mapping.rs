//! Mapping record model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ObjectDescriptor, ObjectRef};

/// One of the two fixed halves of a mapping record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The external system's object
    Integration,
    /// The internal store's object
    Internal,
}

impl Side {
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Integration => Self::Internal,
            Self::Internal => Self::Integration,
        }
    }
}

/// Composite identity of a mapping record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingKey {
    pub integration: String,
    pub integration_object: ObjectRef,
    pub internal_object: ObjectRef,
}

impl MappingKey {
    pub fn new(
        integration: impl Into<String>,
        integration_object: ObjectRef,
        internal_object: ObjectRef,
    ) -> Self {
        Self {
            integration: integration.into(),
            integration_object,
            internal_object,
        }
    }

    /// The object stored on `side`
    pub const fn object(&self, side: Side) -> &ObjectRef {
        match side {
            Side::Integration => &self.integration_object,
            Side::Internal => &self.internal_object,
        }
    }

    /// Replace the object stored on `side`
    #[must_use]
    pub fn with_object(mut self, side: Side, object: ObjectRef) -> Self {
        match side {
            Side::Integration => self.integration_object = object,
            Side::Internal => self.internal_object = object,
        }
        self
    }
}

impl fmt::Display for MappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} <-> {}",
            self.integration, self.integration_object, self.internal_object
        )
    }
}

/// Durable link between an integration object and an internal object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRecord {
    /// Store row id, `None` until persisted
    pub id: Option<i64>,
    pub key: MappingKey,
    /// Watermark: the most recent change reconciled through this mapping
    pub last_sync_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl MappingRecord {
    /// Create an unsaved record for `key`
    #[must_use]
    pub fn new(key: MappingKey, last_sync_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            key,
            last_sync_at,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub const fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn with_object(mut self, side: Side, object: ObjectRef) -> Self {
        self.key = self.key.with_object(side, object);
        self
    }

    /// Move the watermark forward; an earlier instant leaves it untouched
    #[must_use]
    pub fn advance_last_sync_at(mut self, last_sync_at: DateTime<Utc>) -> Self {
        self.last_sync_at = self.last_sync_at.max(last_sync_at);
        self
    }

    pub const fn object(&self, side: Side) -> &ObjectRef {
        self.key.object(side)
    }

    /// The object on `side`, as seen from the other half
    pub fn descriptor(&self, side: Side) -> ObjectDescriptor {
        let object = self.object(side);
        ObjectDescriptor::resolved(
            object.object_type.clone(),
            object.object_id.clone(),
            Some(self.last_sync_at),
        )
    }
}

/// Partial match on the five key columns; unset columns match anything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingFilter {
    pub integration: Option<String>,
    pub integration_object_type: Option<String>,
    pub integration_object_id: Option<String>,
    pub internal_object_type: Option<String>,
    pub internal_object_id: Option<String>,
}

impl MappingFilter {
    #[must_use]
    pub fn integration(mut self, integration: impl Into<String>) -> Self {
        self.integration = Some(integration.into());
        self
    }

    #[must_use]
    pub fn object_type(mut self, side: Side, object_type: impl Into<String>) -> Self {
        let object_type = Some(object_type.into());
        match side {
            Side::Integration => self.integration_object_type = object_type,
            Side::Internal => self.internal_object_type = object_type,
        }
        self
    }

    #[must_use]
    pub fn object(self, side: Side, object: &ObjectRef) -> Self {
        let mut filter = self.object_type(side, object.object_type.clone());
        let object_id = Some(object.object_id.clone());
        match side {
            Side::Integration => filter.integration_object_id = object_id,
            Side::Internal => filter.internal_object_id = object_id,
        }
        filter
    }

    /// The full key when every column is set
    pub fn as_key(&self) -> Option<MappingKey> {
        Some(MappingKey::new(
            self.integration.clone()?,
            ObjectRef::new(
                self.integration_object_type.clone()?,
                self.integration_object_id.clone()?,
            ),
            ObjectRef::new(
                self.internal_object_type.clone()?,
                self.internal_object_id.clone()?,
            ),
        ))
    }
}

impl From<&MappingKey> for MappingFilter {
    fn from(key: &MappingKey) -> Self {
        Self::default()
            .integration(key.integration.clone())
            .object(Side::Integration, &key.integration_object)
            .object(Side::Internal, &key.internal_object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn key() -> MappingKey {
        MappingKey::new(
            "crm-x",
            ObjectRef::new("contact", "42"),
            ObjectRef::new("contact", "7"),
        )
    }

    #[test]
    fn test_advance_last_sync_never_moves_backwards() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let record = MappingRecord::new(key(), late).advance_last_sync_at(early);
        assert_eq!(record.last_sync_at, late);

        let record = MappingRecord::new(key(), early).advance_last_sync_at(late);
        assert_eq!(record.last_sync_at, late);
    }

    #[test]
    fn test_with_object_replaces_one_half() {
        let record = MappingRecord::new(key(), Utc::now())
            .with_object(Side::Integration, ObjectRef::new("lead", "99"));

        assert_eq!(record.object(Side::Integration), &ObjectRef::new("lead", "99"));
        assert_eq!(record.object(Side::Internal), &ObjectRef::new("contact", "7"));
    }

    #[test]
    fn test_descriptor_reports_watermark() {
        let at = Utc.with_ymd_and_hms(2024, 2, 2, 2, 2, 2).unwrap();
        let record = MappingRecord::new(key(), at);

        assert_eq!(
            record.descriptor(Side::Internal),
            ObjectDescriptor::resolved("contact", "7", Some(at))
        );
        assert_eq!(
            record.descriptor(Side::Integration),
            ObjectDescriptor::resolved("contact", "42", Some(at))
        );
    }

    #[test]
    fn test_filter_from_key_round_trips() {
        let filter = MappingFilter::from(&key());
        assert_eq!(filter.as_key(), Some(key()));
    }

    #[test]
    fn test_partial_filter_has_no_key() {
        let filter = MappingFilter::default()
            .integration("crm-x")
            .object(Side::Integration, &ObjectRef::new("contact", "42"))
            .object_type(Side::Internal, "contact");

        assert_eq!(filter.as_key(), None);
        assert_eq!(filter.internal_object_type.as_deref(), Some("contact"));
        assert_eq!(filter.internal_object_id, None);
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Internal.opposite(), Side::Integration);
        assert_eq!(Side::Integration.opposite(), Side::Internal);
    }
}
