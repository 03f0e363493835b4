//! Object references and resolution results

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The identity of an object within its own system
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub object_type: String,
    pub object_id: String,
}

impl ObjectRef {
    pub fn new(object_type: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            object_id: object_id.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.object_id)
    }
}

/// Result of resolving a counterpart in the other system.
///
/// A missing `object_id` means no counterpart was found; callers treat that
/// as a new object rather than an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    pub object_type: String,
    pub object_id: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl ObjectDescriptor {
    /// A counterpart that was found
    pub fn resolved(
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        last_sync_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            object_type: object_type.into(),
            object_id: Some(object_id.into()),
            last_sync_at,
        }
    }

    /// No counterpart is known for this object type
    pub fn unresolved(object_type: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            object_id: None,
            last_sync_at: None,
        }
    }

    pub const fn is_resolved(&self) -> bool {
        self.object_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_has_no_id_or_watermark() {
        let descriptor = ObjectDescriptor::unresolved("contact");
        assert!(!descriptor.is_resolved());
        assert_eq!(descriptor.last_sync_at, None);
    }

    #[test]
    fn test_unresolved_serializes_null_id() {
        let json = serde_json::to_value(ObjectDescriptor::unresolved("contact")).unwrap();
        assert_eq!(json["object_type"], "contact");
        assert!(json["object_id"].is_null());
    }

    #[test]
    fn test_object_ref_display() {
        assert_eq!(ObjectRef::new("contact", "7").to_string(), "contact:7");
    }
}
