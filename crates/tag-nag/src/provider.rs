//! provider identities and their `default_tags`
use crate::context::{EvaluationContext, ReferenceTable};
use crate::eval;
use crate::tags::{Casing, TagMap};
use crate::terraform_documents::TerraformDocuments;
use crate::util::find_attribute;
use crate::value::Value;
use hcl_edit::structure::Block;

/// `name` or `name.alias`, lowercased under [Casing::Insensitive]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderIdentity(String);

impl ProviderIdentity {
    pub fn new(name: &str, alias: Option<&str>, casing: Casing) -> Self {
        let identity = match alias {
            Some(alias) if !alias.is_empty() => format!("{name}.{alias}"),
            _ => name.to_string(),
        };

        Self(casing.normalize(&identity).into_owned())
    }

    /// Identity as written in a resource `provider` attribute (`aws.west`)
    pub fn from_reference(reference: &str, casing: Casing) -> Self {
        Self(casing.normalize(reference).into_owned())
    }

    /// Identity of a `provider` block, `None` if it has no name label
    pub fn of_block(block: &Block, casing: Casing) -> Option<Self> {
        let name = block.labels.first()?;

        let alias = find_attribute(block, "alias").and_then(|expression| {
            match eval::evaluate_literal(&expression) {
                Ok(Value::String(alias)) => Some(alias),
                Ok(other) => {
                    tracing::debug!(provider = name.as_str(), kind = other.type_name(), "alias is not a string, ignored");
                    None
                }
                Err(error) => {
                    tracing::debug!(provider = name.as_str(), %error, "alias is not a literal, ignored");
                    None
                }
            }
        });

        Some(Self::new(name.as_str(), alias.as_deref(), casing))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Default tags per provider
///
/// A provider without a `default_tags` block has no entry. A provider with an empty or
/// unresolvable `default_tags` block has an empty entry.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DefaultTagTable {
    entries: indexmap::IndexMap<ProviderIdentity, TagMap>,
}

impl DefaultTagTable {
    pub fn insert(&mut self, provider: ProviderIdentity, tags: TagMap) {
        self.entries.insert(provider, tags);
    }

    pub fn get(&self, provider: &ProviderIdentity) -> Option<&TagMap> {
        self.entries.get(provider)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProviderIdentity, &TagMap)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collects the `default_tags` of every `provider` block
#[tracing::instrument(level = "debug", skip_all)]
pub fn collect_default_tags(
    documents: &TerraformDocuments,
    context: &EvaluationContext,
    references: &ReferenceTable,
    casing: Casing,
) -> DefaultTagTable {
    let mut table = DefaultTagTable::default();

    for (_, source, block) in documents.blocks_of("provider") {
        let Some(provider) = ProviderIdentity::of_block(block, casing) else {
            tracing::debug!(path=%source.path.display(), "provider without name");
            continue;
        };

        let Some(default_tags) = block
            .body
            .blocks()
            .find(|nested| nested.ident.value().as_str() == "default_tags")
        else {
            continue;
        };

        let tags = match find_attribute(default_tags, "tags") {
            Some(expression) => resolve_tags(&expression, context, references, casing),
            None => TagMap::new(),
        };

        tracing::info!(
            %provider,
            tags = ?tags.keys().collect::<Vec<_>>(),
            "found default tags"
        );
        table.insert(provider, tags);
    }

    table
}

/// Evaluates a tags expression, falling back to the reference table and finally to no tags
pub(crate) fn resolve_tags(
    expression: &hcl::Expression,
    context: &EvaluationContext,
    references: &ReferenceTable,
    casing: Casing,
) -> TagMap {
    resolve_tags_with(expression, references, casing, |expression| {
        context.evaluate(expression)
    })
}

pub(crate) fn resolve_tags_with(
    expression: &hcl::Expression,
    references: &ReferenceTable,
    casing: Casing,
    evaluate: impl FnOnce(&hcl::Expression) -> Result<Value, eval::EvalError>,
) -> TagMap {
    match evaluate(expression) {
        Ok(value) => {
            if let Some(tags) = TagMap::from_value(&value, casing) {
                return tags;
            }
            tracing::debug!(kind = value.type_name(), "tags are not an object");
        }
        Err(error) => tracing::debug!(%error, "tags not evaluated"),
    }

    if let Some(tags) = references.lookup(expression) {
        return tags.clone();
    }

    TagMap::new()
}
