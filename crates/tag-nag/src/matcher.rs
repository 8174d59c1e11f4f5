//! compare required tags against effective tags
use crate::tags::{Casing, TagMap, TagSpec};

/// Missing-tag descriptors, sorted
///
/// A required key is reported
/// - as `key` if it is absent and no values were required
/// - as `key[v1,v2]` if it is absent or none of its values is allowed
///
/// A key without allowed values is satisfied by its presence.
pub fn missing_tags(required: &TagSpec, effective: &TagMap, casing: Casing) -> Vec<String> {
    let mut missing: Vec<String> = required
        .iter()
        .filter(|(key, allowed)| !is_satisfied(key, allowed, effective, casing))
        .map(|(key, allowed)| descriptor(key, allowed))
        .collect();

    missing.sort();
    missing
}

fn is_satisfied(key: &str, allowed: &[String], effective: &TagMap, casing: Casing) -> bool {
    let Some(values) = effective.get(key, casing) else {
        return false;
    };

    allowed.is_empty()
        || values
            .iter()
            .any(|value| allowed.iter().any(|allowed| casing.matches(value, allowed)))
}

fn descriptor(key: &str, allowed: &[String]) -> String {
    if allowed.is_empty() {
        key.to_string()
    } else {
        format!("{key}[{}]", allowed.join(","))
    }
}
