//! tag sets: required ([TagSpec]) and observed ([TagMap])
//!
//! Both are ordered maps from a tag key to a list of values. They differ in meaning:
//! - a [TagSpec] value list holds the *allowed* values, an empty list accepts anything
//! - a [TagMap] value list holds the *resolved* values and is never empty
use std::borrow::Cow;
use std::str::FromStr;

/// How tag keys and values are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Casing {
    #[default]
    Sensitive,
    Insensitive,
}

impl Casing {
    pub fn from_insensitive_flag(case_insensitive: bool) -> Self {
        if case_insensitive {
            Casing::Insensitive
        } else {
            Casing::Sensitive
        }
    }

    pub fn normalize<'a>(self, value: &'a str) -> Cow<'a, str> {
        match self {
            Casing::Sensitive => Cow::Borrowed(value),
            Casing::Insensitive => Cow::Owned(value.to_lowercase()),
        }
    }

    pub fn matches(self, a: &str, b: &str) -> bool {
        match self {
            Casing::Sensitive => a == b,
            Casing::Insensitive => a == b || a.to_lowercase() == b.to_lowercase(),
        }
    }
}

/// Required tags: key to allowed values (empty = any value)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSpec {
    tags: indexmap::IndexMap<String, Vec<String>>,
}

impl TagSpec {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, Vec<V>)> for TagSpec {
    fn from_iter<T: IntoIterator<Item = (K, Vec<V>)>>(iter: T) -> Self {
        Self {
            tags: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into_iter().map(Into::into).collect()))
                .collect(),
        }
    }
}

/// Parses `Owner,Environment[Dev,Prod]`
///
/// Commas inside brackets separate allowed values, all other commas separate keys.
impl FromStr for TagSpec {
    type Err = TagSpecError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut tags = indexmap::IndexMap::new();

        for component in split_outside_brackets(input) {
            let component = component.trim();
            if component.is_empty() {
                continue;
            }

            let (key, values) = parse_component(component)?;
            tags.insert(key, values);
        }

        Ok(Self { tags })
    }
}

fn split_outside_brackets(input: &str) -> Vec<&str> {
    let mut parts = vec![];
    let mut start = 0;
    let mut depth = 0usize;

    for (index, c) in input.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&input[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);

    parts
}

fn parse_component(component: &str) -> Result<(String, Vec<String>), TagSpecError> {
    let Some(open) = component.find('[') else {
        if component.contains(']') {
            return Err(TagSpecError::UnmatchedBracket(component.to_string()));
        }
        return Ok((component.to_string(), vec![]));
    };

    let Some(values) = component[open + 1..].strip_suffix(']') else {
        return Err(TagSpecError::MissingClosingBracket(component.to_string()));
    };

    let key = component[..open].trim();
    if key.is_empty() {
        return Err(TagSpecError::EmptyKey(component.to_string()));
    }

    if values.contains('[') || values.contains(']') {
        return Err(TagSpecError::UnmatchedBracket(component.to_string()));
    }

    let values = values
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect();

    Ok((key.to_string(), values))
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TagSpecError {
    #[error("invalid tag format '{0}': expected closing ']'")]
    MissingClosingBracket(String),
    #[error("invalid tag format '{0}': '[' or ']' without matching pair")]
    UnmatchedBracket(String),
    #[error("invalid tag format '{0}': empty key")]
    EmptyKey(String),
}

/// Observed tags: key to resolved values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMap {
    tags: indexmap::IndexMap<String, Vec<String>>,
}

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value for `key`
    ///
    /// The key is normalized according to `casing`. Adding to a key that is already present
    /// (e.g. `Owner` and `owner` under [Casing::Insensitive]) keeps both values.
    pub fn insert(&mut self, key: &str, value: impl Into<String>, casing: Casing) {
        let value = value.into();
        let values = self
            .tags
            .entry(casing.normalize(key).into_owned())
            .or_default();

        if !values.contains(&value) {
            values.push(value);
        }
    }

    /// Looks up the values of a key under the given casing rule
    pub fn get(&self, key: &str, casing: Casing) -> Option<&[String]> {
        if let Some(values) = self.tags.get(key) {
            return Some(values);
        }

        if casing == Casing::Sensitive {
            return None;
        }

        self.tags
            .iter()
            .find(|(existing, _)| casing.matches(existing, key))
            .map(|(_, values)| values.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Returns a new map with the entries of `overrides` replacing those of `self`
    pub fn merge(&self, overrides: &TagMap) -> TagMap {
        let mut merged = self.clone();
        for (key, values) in &overrides.tags {
            merged.tags.insert(key.clone(), values.clone());
        }
        merged
    }

    /// Converts an object-shaped value into a tag map, `None` for every other shape
    pub fn from_value(value: &crate::value::Value, casing: Casing) -> Option<TagMap> {
        let object = value.as_object()?;

        let mut tags = TagMap::new();
        for (key, value) in object {
            tags.insert(key, value.to_tag_string(), casing);
        }

        Some(tags)
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for TagMap {
    /// Builds a case sensitive tag map
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut tags = TagMap::new();
        for (key, value) in iter {
            tags.insert(key.as_ref(), value, Casing::Sensitive);
        }
        tags
    }
}
