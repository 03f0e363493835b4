//! Sync configuration file.
//!
//! Declares the reserved internal system name, the unique identifier fields of
//! each internal object type, and per-integration field mappings. Stored as JSON;
//! a missing file yields the defaults.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::db::DatabaseConfig;
use crate::error::{Error, Result};
use crate::sync::{FieldResolver, FieldTranslator};
use crate::util::normalize_text_option;

const CONFIG_SCHEMA_VERSION: u32 = 1;
const DEFAULT_INTERNAL_SYSTEM_NAME: &str = "internal";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SyncMapConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    /// Name a change's `system` carries when the internal store emitted it
    #[serde(default = "default_internal_system_name")]
    pub internal_system_name: String,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default)]
    pub unique_fields: UniqueFieldRegistry,
    #[serde(default)]
    pub integrations: IntegrationRegistry,
}

const fn default_config_version() -> u32 {
    CONFIG_SCHEMA_VERSION
}

fn default_internal_system_name() -> String {
    DEFAULT_INTERNAL_SYSTEM_NAME.to_string()
}

const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

impl Default for SyncMapConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_SCHEMA_VERSION,
            internal_system_name: default_internal_system_name(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            unique_fields: UniqueFieldRegistry::default(),
            integrations: IntegrationRegistry::default(),
        }
    }
}

impl SyncMapConfig {
    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config = Self::parse(&raw)
            .map_err(|error| Error::Config(format!("{}: {error}", path.display())))?;
        Ok(config)
    }

    /// Parse and validate a JSON payload
    pub fn parse(raw: &str) -> Result<Self> {
        let mut config = serde_json::from_str::<Self>(raw)
            .map_err(|error| Error::Config(format!("invalid config JSON: {error}")))?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::default().with_busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }

    fn normalize(&mut self) {
        self.internal_system_name = self.internal_system_name.trim().to_string();
        self.unique_fields.normalize();
        self.integrations.normalize();
    }

    fn validate(&self) -> Result<()> {
        if self.version != CONFIG_SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "unsupported config version {} (expected {CONFIG_SCHEMA_VERSION})",
                self.version
            )));
        }
        if self.internal_system_name.is_empty() {
            return Err(Error::Config(
                "internal_system_name must not be empty".to_string(),
            ));
        }
        // An integration sharing the internal name would flip change orientation
        if self.integrations.0.contains_key(&self.internal_system_name) {
            return Err(Error::Config(format!(
                "integration '{}' collides with internal_system_name",
                self.internal_system_name
            )));
        }
        Ok(())
    }
}

/// Ordered unique identifier fields per internal object type
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct UniqueFieldRegistry(BTreeMap<String, Vec<String>>);

impl UniqueFieldRegistry {
    #[must_use]
    pub fn with_fields<I, S>(mut self, object_type: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.insert(
            object_type.into(),
            fields.into_iter().map(Into::into).collect(),
        );
        self.normalize();
        self
    }

    /// Trim names, drop blanks and repeated fields; the first occurrence keeps its place
    fn normalize(&mut self) {
        let entries = std::mem::take(&mut self.0);
        for (object_type, fields) in entries {
            let Some(object_type) = normalize_text_option(Some(object_type)) else {
                continue;
            };
            let mut unique = Vec::with_capacity(fields.len());
            for field in fields.into_iter().filter_map(|f| normalize_text_option(Some(f))) {
                if !unique.contains(&field) {
                    unique.push(field);
                }
            }
            self.0.insert(object_type, unique);
        }
    }
}

impl FieldResolver for UniqueFieldRegistry {
    fn unique_identifier_fields(&self, object_type: &str) -> Result<Vec<String>> {
        Ok(self.0.get(object_type).cloned().unwrap_or_default())
    }
}

/// Field mappings of one integration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MappingManual {
    #[serde(default)]
    pub objects: Vec<ObjectMapping>,
}

/// How one internal object type lines up with one integration object type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ObjectMapping {
    pub internal_object: String,
    pub integration_object: String,
    /// Internal field name -> integration field name
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl ObjectMapping {
    pub fn new(internal_object: impl Into<String>, integration_object: impl Into<String>) -> Self {
        Self {
            internal_object: internal_object.into(),
            integration_object: integration_object.into(),
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_field(
        mut self,
        internal_field: impl Into<String>,
        integration_field: impl Into<String>,
    ) -> Self {
        self.fields
            .insert(internal_field.into(), integration_field.into());
        self
    }
}

impl MappingManual {
    #[must_use]
    pub fn with_object(mut self, object: ObjectMapping) -> Self {
        self.objects.push(object);
        self
    }

    /// Integration field that carries `internal_field`, if one is configured
    pub fn integration_field(
        &self,
        internal_object: &str,
        integration_object: &str,
        internal_field: &str,
    ) -> Option<&str> {
        self.objects
            .iter()
            .filter(|object| {
                object.internal_object == internal_object
                    && object.integration_object == integration_object
            })
            .find_map(|object| object.fields.get(internal_field))
            .map(String::as_str)
    }

    fn normalize(&mut self) {
        self.objects.retain_mut(|object| {
            object.internal_object = object.internal_object.trim().to_string();
            object.integration_object = object.integration_object.trim().to_string();
            object.fields = std::mem::take(&mut object.fields)
                .into_iter()
                .filter_map(|(internal, integration)| {
                    Some((
                        normalize_text_option(Some(internal))?,
                        normalize_text_option(Some(integration))?,
                    ))
                })
                .collect();
            !object.internal_object.is_empty() && !object.integration_object.is_empty()
        });
    }
}

/// Field mappings keyed by integration name
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct IntegrationRegistry(BTreeMap<String, MappingManual>);

impl IntegrationRegistry {
    #[must_use]
    pub fn with_integration(mut self, name: impl Into<String>, manual: MappingManual) -> Self {
        self.0.insert(name.into(), manual);
        self
    }

    pub fn manual(&self, integration: &str) -> Option<&MappingManual> {
        self.0.get(integration)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    fn normalize(&mut self) {
        let entries = std::mem::take(&mut self.0);
        for (name, mut manual) in entries {
            let Some(name) = normalize_text_option(Some(name)) else {
                continue;
            };
            manual.normalize();
            self.0.insert(name, manual);
        }
    }
}

impl FieldTranslator for IntegrationRegistry {
    fn integration_field(
        &self,
        integration: &str,
        internal_object: &str,
        integration_object: &str,
        internal_field: &str,
    ) -> Option<String> {
        self.manual(integration)?
            .integration_field(internal_object, integration_object, internal_field)
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
    {
      "version": 1,
      "internal_system_name": " internal ",
      "unique_fields": {
        "contact": ["email", " phone ", "email", ""]
      },
      "integrations": {
        "crm-x": {
          "objects": [
            {
              "internal_object": "contact",
              "integration_object": "contact",
              "fields": { "email": "Email", "phone": " " }
            }
          ]
        }
      }
    }
    "#;

    #[test]
    fn parse_normalizes_names_and_fields() {
        let config = SyncMapConfig::parse(SAMPLE).unwrap();

        assert_eq!(config.internal_system_name, "internal");
        assert_eq!(
            config.unique_fields.unique_identifier_fields("contact").unwrap(),
            vec!["email".to_string(), "phone".to_string()]
        );
        assert_eq!(
            config
                .integrations
                .integration_field("crm-x", "contact", "contact", "email"),
            Some("Email".to_string())
        );
        // Blank integration field names are dropped
        assert_eq!(
            config
                .integrations
                .integration_field("crm-x", "contact", "contact", "phone"),
            None
        );
    }

    #[test]
    fn unknown_lookups_are_absent() {
        let config = SyncMapConfig::parse(SAMPLE).unwrap();

        assert!(config
            .unique_fields
            .unique_identifier_fields("company")
            .unwrap()
            .is_empty());
        assert_eq!(
            config
                .integrations
                .integration_field("crm-y", "contact", "contact", "email"),
            None
        );
        assert_eq!(
            config
                .integrations
                .integration_field("crm-x", "contact", "lead", "email"),
            None
        );
    }

    #[test]
    fn parse_rejects_unknown_fields() {
        let error = SyncMapConfig::parse(r#"{ "version": 1, "unexpected": true }"#).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn parse_rejects_unsupported_version() {
        let error = SyncMapConfig::parse(r#"{ "version": 9 }"#).unwrap_err();
        assert!(error.to_string().contains("version"));
    }

    #[test]
    fn parse_rejects_integration_named_like_internal_system() {
        let error = SyncMapConfig::parse(r#"{ "integrations": { "internal": {} } }"#).unwrap_err();
        assert!(error.to_string().contains("internal_system_name"));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let tmp = tempdir().unwrap();
        let config = SyncMapConfig::load_from_path(&tmp.path().join("absent.json")).unwrap();
        assert_eq!(config, SyncMapConfig::default());
        assert_eq!(config.internal_system_name, "internal");
        assert_eq!(
            config.database_config().busy_timeout,
            Duration::from_millis(5000)
        );
    }

    #[test]
    fn serialized_config_loads_back() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("syncmap.json");
        let config = SyncMapConfig {
            busy_timeout_ms: 250,
            unique_fields: UniqueFieldRegistry::default().with_fields("contact", ["email"]),
            integrations: IntegrationRegistry::default().with_integration(
                "crm-x",
                MappingManual::default()
                    .with_object(ObjectMapping::new("contact", "person").with_field("email", "work_email")),
            ),
            ..SyncMapConfig::default()
        };

        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
        let loaded = SyncMapConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.integrations.names().collect::<Vec<_>>(), vec!["crm-x"]);
    }
}
