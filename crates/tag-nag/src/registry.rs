//! which resource types support tags
//!
//! The information comes from the provider schema terraform reports for an initialized working
//! directory (`terraform providers schema -json`). A resource type is taggable iff its schema has a
//! `tags` attribute.
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

/// Address of the AWS provider in the provider schema output
pub const AWS_PROVIDER_ADDRESS: &str = "registry.terraform.io/hashicorp/aws";

const TAGS_ATTRIBUTE: &str = "tags";

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TaggabilityRegistry {
    resource_types: indexmap::IndexMap<String, bool>,
}

#[derive(Deserialize)]
struct ProvidersSchema {
    #[serde(default)]
    provider_schemas: indexmap::IndexMap<String, ProviderSchema>,
}

#[derive(Deserialize)]
struct ProviderSchema {
    #[serde(default)]
    resource_schemas: indexmap::IndexMap<String, ResourceSchema>,
}

#[derive(Deserialize)]
struct ResourceSchema {
    block: SchemaBlock,
}

#[derive(Deserialize)]
struct SchemaBlock {
    #[serde(default)]
    attributes: indexmap::IndexMap<String, serde::de::IgnoredAny>,
}

impl TaggabilityRegistry {
    /// Runs `terraform providers schema -json` in `working_dir`
    #[tracing::instrument(level = "debug")]
    pub fn load(working_dir: &Path, provider_address: &str) -> Result<Self, RegistryError> {
        let output = Command::new("terraform")
            .args(["providers", "schema", "-json"])
            .current_dir(working_dir)
            .output()
            .map_err(RegistryError::Spawn)?;

        if !output.status.success() {
            return Err(RegistryError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let json = String::from_utf8_lossy(&output.stdout);
        Self::from_schema_json(&json, provider_address)
    }

    /// Parses provider schema JSON and keeps the resource types of `provider_address`
    pub fn from_schema_json(json: &str, provider_address: &str) -> Result<Self, RegistryError> {
        let mut schema: ProvidersSchema = serde_json::from_str(json)?;

        let provider = schema
            .provider_schemas
            .shift_remove(provider_address)
            .ok_or_else(|| RegistryError::ProviderNotFound(provider_address.to_string()))?;

        let resource_types: indexmap::IndexMap<_, _> = provider
            .resource_schemas
            .into_iter()
            .map(|(resource_type, resource)| {
                let taggable = resource.block.attributes.contains_key(TAGS_ATTRIBUTE);
                (resource_type, taggable)
            })
            .collect();

        tracing::info!(
            provider = provider_address,
            resource_types = resource_types.len(),
            taggable = resource_types.values().filter(|taggable| **taggable).count(),
            "loaded provider schema"
        );

        Ok(Self { resource_types })
    }

    /// `Some(false)` only if the type is known and has no `tags` attribute
    pub fn taggability(&self, resource_type: &str) -> Option<bool> {
        self.resource_types.get(resource_type).copied()
    }

    /// Unknown types are assumed taggable
    pub fn is_taggable(&self, resource_type: &str) -> bool {
        self.taggability(resource_type).unwrap_or(true)
    }

    pub fn len(&self) -> usize {
        self.resource_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resource_types.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, bool)> for TaggabilityRegistry {
    fn from_iter<T: IntoIterator<Item = (K, bool)>>(iter: T) -> Self {
        Self {
            resource_types: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("Unable to run terraform")]
    Spawn(#[source] std::io::Error),
    #[error("terraform providers schema exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },
    #[error("Unable to parse provider schema")]
    InvalidSchema(#[from] serde_json::Error),
    #[error("Provider {0} not found in schema (is the directory initialized?)")]
    ProviderNotFound(String),
}
