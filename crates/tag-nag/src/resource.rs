//! effective tags of `resource` blocks
//!
//! For every resource of the target provider we determine
//! - the provider it belongs to (`provider` attribute or the target provider's default)
//! - its own tags (the `tags` attribute)
//! - its effective tags: the provider's default tags overridden by its own tags
use crate::context::{EvaluationContext, ReferenceTable};
use crate::eval;
use crate::provider::{self, DefaultTagTable, ProviderIdentity};
use crate::registry::{TaggabilityRegistry, AWS_PROVIDER_ADDRESS};
use crate::tags::{Casing, TagMap};
use crate::terraform_documents::{SourceBlock, SourceFile, TerraformDocuments};
use crate::util;
use crate::value::Value;
use hcl_edit::structure::Block;

/// Provider whose resources are checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetProvider {
    /// provider name as used in `provider` blocks (`aws`)
    pub name: String,
    /// prefix of all resource types of this provider (`aws_`)
    pub resource_prefix: String,
    /// address used in the provider schema output
    pub registry_address: String,
}

impl Default for TargetProvider {
    fn default() -> Self {
        Self {
            name: "aws".to_string(),
            resource_prefix: "aws_".to_string(),
            registry_address: AWS_PROVIDER_ADDRESS.to_string(),
        }
    }
}

impl TargetProvider {
    pub fn owns(&self, resource_type: &str) -> bool {
        resource_type.starts_with(&self.resource_prefix)
    }

    /// Identity of the unaliased provider
    pub fn default_identity(&self, casing: Casing) -> ProviderIdentity {
        ProviderIdentity::new(&self.name, None, casing)
    }
}

/// A resource with its effective tags
#[derive(Debug, Clone)]
pub struct TaggedResource<'a> {
    pub source: &'a SourceFile,
    pub resource_type: &'a str,
    pub resource_name: &'a str,
    /// 1-based line of the declaration
    pub line: usize,
    /// 1-based line of the closing brace
    pub last_line: usize,
    pub provider: ProviderIdentity,
    pub tags: TagMap,
}

#[derive(derive_new::new)]
pub struct ResourceTagExtractor<'a> {
    context: &'a EvaluationContext,
    references: &'a ReferenceTable,
    default_tags: &'a DefaultTagTable,
    target: &'a TargetProvider,
    registry: Option<&'a TaggabilityRegistry>,
    casing: Casing,
}

impl<'a> ResourceTagExtractor<'a> {
    /// All checked resources, in file order
    pub fn resources<'d>(
        &'d self,
        documents: &'d TerraformDocuments,
    ) -> impl Iterator<Item = TaggedResource<'d>> + 'd {
        documents
            .blocks_of("resource")
            .filter_map(move |block| self.extract(block))
    }

    /// `None` for resources that are not checked (foreign provider, not taggable, missing labels)
    pub fn extract<'d>(&self, (_, source, block): SourceBlock<'d>) -> Option<TaggedResource<'d>> {
        let [resource_type, resource_name, ..] = block.labels.as_slice() else {
            tracing::debug!(path=%source.path.display(), "resource without type and name");
            return None;
        };
        let resource_type = resource_type.as_str();
        let resource_name = resource_name.as_str();

        if !self.target.owns(resource_type) {
            tracing::trace!(resource_type, "foreign provider");
            return None;
        }

        if let Some(registry) = self.registry {
            if !registry.is_taggable(resource_type) {
                tracing::debug!(resource_type, resource_name, "not taggable, skipped");
                return None;
            }
        }

        let provider = self.provider_of(block);
        let own_tags = self.own_tags(block);

        let tags = match self.default_tags.get(&provider) {
            Some(defaults) => defaults.merge(&own_tags),
            None => own_tags,
        };

        tracing::debug!(
            resource_type,
            resource_name,
            %provider,
            tags = ?tags.keys().collect::<Vec<_>>(),
            "effective tags"
        );

        Some(TaggedResource {
            source,
            resource_type,
            resource_name,
            line: source.declaration_line(block),
            last_line: source.last_line(block),
            provider,
            tags,
        })
    }

    /// Explicit `provider` attribute (`"aws"` or `aws.west`), otherwise the target's default
    fn provider_of(&self, block: &Block) -> ProviderIdentity {
        let Some(expression) = util::find_attribute(block, "provider") else {
            return self.target.default_identity(self.casing);
        };

        if let Ok(Value::String(reference)) = eval::evaluate_literal(&expression) {
            return ProviderIdentity::from_reference(&reference, self.casing);
        }

        if let Some(reference) = util::bare_reference(&expression) {
            return ProviderIdentity::from_reference(&reference, self.casing);
        }

        tracing::debug!(?expression, "unrecognized provider reference, using default");
        self.target.default_identity(self.casing)
    }

    fn own_tags(&self, block: &Block) -> TagMap {
        let Some(expression) = util::find_attribute(block, "tags") else {
            return TagMap::new();
        };

        provider::resolve_tags_with(&expression, self.references, self.casing, |expression| {
            self.context.evaluate_per_item(expression)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn effective_tags(
        documents: &TerraformDocuments,
        registry: Option<&TaggabilityRegistry>,
        casing: Casing,
    ) -> Vec<(String, TagMap)> {
        let (context, references) = crate::context::resolve(documents, casing);
        let defaults = provider::collect_default_tags(documents, &context, &references, casing);
        let target = TargetProvider::default();
        let extractor =
            ResourceTagExtractor::new(&context, &references, &defaults, &target, registry, casing);

        extractor
            .resources(documents)
            .map(|resource| (resource.resource_name.to_string(), resource.tags))
            .collect()
    }

    #[test]
    fn default_tags_are_overridden_by_resource_tags() {
        let documents = crate::terraform_documents! {r#"
            provider "aws" {
              default_tags {
                tags = { Owner = "team-a", CostCenter = "C1" }
              }
            }

            resource "aws_s3_bucket" "this" {
              tags = { Owner = "team-b" }
            }
        "#};

        let expected: TagMap = [("Owner", "team-b"), ("CostCenter", "C1")]
            .into_iter()
            .collect();
        assert_eq!(
            effective_tags(&documents, None, Casing::Sensitive),
            vec![("this".to_string(), expected)]
        );
    }

    #[test]
    fn aliased_providers() {
        let documents = crate::terraform_documents! {r#"
            provider "aws" {
              default_tags { tags = { Region = "east" } }
            }
            provider "aws" {
              alias = "West"
              default_tags { tags = { Region = "west" } }
            }

            resource "aws_s3_bucket" "traversal" {
              provider = aws.west
            }
            resource "aws_s3_bucket" "literal" {
              provider = "aws.west"
            }
            resource "aws_s3_bucket" "implicit" {}
        "#};

        let tags: Vec<_> = effective_tags(&documents, None, Casing::Insensitive)
            .into_iter()
            .map(|(name, tags)| (name, tags.get("region", Casing::Insensitive).map(<[String]>::to_vec)))
            .collect();

        assert_eq!(
            tags,
            vec![
                ("traversal".to_string(), Some(vec!["west".to_string()])),
                ("literal".to_string(), Some(vec!["west".to_string()])),
                ("implicit".to_string(), Some(vec!["east".to_string()])),
            ]
        );
    }

    #[test]
    fn foreign_and_untaggable_resources_are_skipped() {
        let documents = crate::terraform_documents! {r#"
            resource "aws_s3_bucket" "bucket" {}
            resource "aws_kms_alias" "alias" {}
            resource "google_storage_bucket" "foreign" {}
            resource "aws_new_service" "unknown" {}
        "#};

        let registry: TaggabilityRegistry =
            [("aws_s3_bucket", true), ("aws_kms_alias", false)].into_iter().collect();

        let names: Vec<_> = effective_tags(&documents, Some(&registry), Casing::Sensitive)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["bucket", "unknown"]);

        let names: Vec<_> = effective_tags(&documents, None, Casing::Sensitive)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["bucket", "alias", "unknown"]);
    }

    #[test]
    fn iterated_resources_use_placeholders() {
        let documents = crate::terraform_documents! {r#"
            variable "buckets" {
              default = { logs = "a", data = "b" }
            }

            resource "aws_s3_bucket" "each" {
              for_each = var.buckets
              tags = {
                Name  = "bucket-${each.key}"
                Owner = "team"
              }
            }
        "#};

        let expected: TagMap = [("Name", "bucket-"), ("Owner", "team")].into_iter().collect();
        assert_eq!(
            effective_tags(&documents, None, Casing::Sensitive),
            vec![("each".to_string(), expected)]
        );
    }

    #[test]
    fn unresolvable_tags_are_empty() {
        let documents = crate::terraform_documents! {r#"
            resource "aws_s3_bucket" "this" {
              tags = merge(local.missing, { Owner = "x" })
            }
        "#};

        assert_eq!(
            effective_tags(&documents, None, Casing::Sensitive),
            vec![("this".to_string(), TagMap::new())]
        );
    }

    #[test]
    fn declaration_line() {
        let documents = crate::terraform_documents! {
            "main.tf" => "\n\n# bucket\nresource \"aws_s3_bucket\" \"this\" {\n}\n"
        };
        let (context, references) = crate::context::resolve(&documents, Casing::Sensitive);
        let defaults = DefaultTagTable::default();
        let target = TargetProvider::default();
        let extractor = ResourceTagExtractor::new(
            &context,
            &references,
            &defaults,
            &target,
            None,
            Casing::Sensitive,
        );

        let resource = extractor.resources(&documents).next().unwrap();
        assert_eq!(resource.line, 4);
        assert_eq!(resource.last_line, 5);
        assert_eq!(resource.resource_type, "aws_s3_bucket");
        assert_eq!(resource.provider.as_str(), "aws");
    }
}
