//! violation records
use crate::ignore::IgnoreDirectives;
use crate::matcher;
use crate::resource::TaggedResource;
use crate::tags::{Casing, TagSpec};
use serde::Serialize;
use std::path::PathBuf;

/// A resource missing required tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub resource_type: String,
    pub resource_name: String,
    pub file_path: PathBuf,
    /// 1-based line of the resource declaration
    pub line: usize,
    /// sorted descriptors (`Owner`, `Environment[Dev,Prod]`)
    pub missing_tags: Vec<String>,
    /// set by an ignore marker, the violation does not fail the scan
    pub suppressed: bool,
}

/// Checks a resource against the required tags, `None` if nothing is missing
pub fn assess(
    resource: &TaggedResource,
    required: &TagSpec,
    directives: &IgnoreDirectives,
    casing: Casing,
) -> Option<Violation> {
    let missing_tags = matcher::missing_tags(required, &resource.tags, casing);
    if missing_tags.is_empty() {
        return None;
    }

    let suppressed = directives.ignores_resource(resource.line, resource.last_line);

    tracing::debug!(
        resource_type = resource.resource_type,
        resource_name = resource.resource_name,
        ?missing_tags,
        suppressed,
        "violation"
    );

    Some(Violation {
        resource_type: resource.resource_type.to_string(),
        resource_name: resource.resource_name.to_string(),
        file_path: resource.source.path.clone(),
        line: resource.line,
        missing_tags,
        suppressed,
    })
}
