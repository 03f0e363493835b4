//! Change descriptors fed into resolution and reconciliation

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ObjectRef;
use crate::error::{Error, Result};
use crate::util::{normalize_text_option, require_text};

/// An observed mutation on one side of the sync.
///
/// `system` names the system that emitted the change. An empty `system`,
/// `object_type` or `object_id` is rejected both by [`ChangeDescriptor::new`]
/// and during deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawChangeDescriptor")]
pub struct ChangeDescriptor {
    system: String,
    object_type: String,
    object_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mapped_object_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mapped_object_id: Option<String>,
    fields: BTreeMap<String, String>,
    change_timestamp: DateTime<Utc>,
}

impl ChangeDescriptor {
    /// Create a change for `object_type`/`object_id` reported by `system`
    pub fn new(
        system: impl Into<String>,
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        change_timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        Ok(Self {
            system: require_text(system, "system")?,
            object_type: require_text(object_type, "object_type")?,
            object_id: require_text(object_id, "object_id")?,
            mapped_object_type: None,
            mapped_object_id: None,
            fields: BTreeMap::new(),
            change_timestamp,
        })
    }

    /// Attach the counterpart identity when it is already known
    #[must_use]
    pub fn with_mapped_object(
        mut self,
        object_type: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Self {
        self.mapped_object_type = normalize_text_option(Some(object_type.into()));
        self.mapped_object_id = normalize_text_option(Some(object_id.into()));
        self
    }

    /// Add a normalized field value
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// The changed object's own identity
    pub fn object(&self) -> ObjectRef {
        ObjectRef::new(self.object_type.clone(), self.object_id.clone())
    }

    /// The counterpart identity, present only when both type and id are known
    pub fn mapped_object(&self) -> Option<ObjectRef> {
        match (&self.mapped_object_type, &self.mapped_object_id) {
            (Some(object_type), Some(object_id)) => {
                Some(ObjectRef::new(object_type.clone(), object_id.clone()))
            }
            _ => None,
        }
    }

    /// Non-empty value of `name`, trimmed
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub const fn change_timestamp(&self) -> DateTime<Utc> {
        self.change_timestamp
    }
}

#[derive(Deserialize)]
struct RawChangeDescriptor {
    system: String,
    object_type: String,
    object_id: String,
    #[serde(default)]
    mapped_object_type: Option<String>,
    #[serde(default)]
    mapped_object_id: Option<String>,
    #[serde(default)]
    fields: BTreeMap<String, String>,
    change_timestamp: DateTime<Utc>,
}

impl TryFrom<RawChangeDescriptor> for ChangeDescriptor {
    type Error = Error;

    fn try_from(raw: RawChangeDescriptor) -> Result<Self> {
        let mut change = Self::new(
            raw.system,
            raw.object_type,
            raw.object_id,
            raw.change_timestamp,
        )?;
        change.mapped_object_type = normalize_text_option(raw.mapped_object_type);
        change.mapped_object_id = normalize_text_option(raw.mapped_object_id);
        change.fields = raw.fields;
        Ok(change)
    }
}

/// A change whose counterpart is known, ready to be written to the mapping store.
///
/// `object_type`/`object_id` are the current identity of the changed half. They
/// normally equal the change's own identity but may differ when the object was
/// reassigned since the change was observed. Identity text is trimmed, and
/// blank values are rejected during deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawReconciliationEvent")]
pub struct ReconciliationEvent {
    /// Integration half of the mapping key
    pub integration: String,
    pub change: ChangeDescriptor,
    pub object_type: String,
    pub object_id: String,
    /// New synchronization watermark
    pub modified_at: DateTime<Utc>,
}

impl ReconciliationEvent {
    /// Build an event whose current identity is the change's own identity
    pub fn new(
        integration: impl Into<String>,
        change: ChangeDescriptor,
        modified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            integration: integration.into().trim().to_string(),
            object_type: change.object_type.clone(),
            object_id: change.object_id.clone(),
            change,
            modified_at,
        }
    }

    /// Point the changed half at a different object
    #[must_use]
    pub fn with_object(mut self, object_type: impl Into<String>, object_id: impl Into<String>) -> Self {
        self.object_type = object_type.into().trim().to_string();
        self.object_id = object_id.into().trim().to_string();
        self
    }

    pub fn object(&self) -> ObjectRef {
        ObjectRef::new(self.object_type.clone(), self.object_id.clone())
    }
}

#[derive(Deserialize)]
struct RawReconciliationEvent {
    integration: String,
    change: ChangeDescriptor,
    object_type: String,
    object_id: String,
    modified_at: DateTime<Utc>,
}

impl TryFrom<RawReconciliationEvent> for ReconciliationEvent {
    type Error = Error;

    fn try_from(raw: RawReconciliationEvent) -> Result<Self> {
        Ok(Self {
            integration: require_text(raw.integration, "integration")?,
            object_type: require_text(raw.object_type, "object_type")?,
            object_id: require_text(raw.object_id, "object_id")?,
            change: raw.change,
            modified_at: raw.modified_at,
        })
    }
}
