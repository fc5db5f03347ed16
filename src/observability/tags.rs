//! Tag model for database call measurements
//!
//! Every measurement is attributed with a [`TagContext`]: an immutable set of
//! string key/value pairs. Three keys are owned by this crate (see [`TagKey`]);
//! any further tags come from the ambient context the call runs in.
//!
//! Ambient tags travel inside an [`opentelemetry::Context`] rather than in
//! thread-local state, so a caller decides explicitly which context (and which
//! tags) an operation inherits.

use std::collections::BTreeMap;

use opentelemetry::Context;

/// Tag keys written by every tracking operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKey {
    /// Fully qualified name of the observed call
    Method,
    /// Description of the error the call failed with
    Error,
    /// Outcome of the call, see [`CallStatus`]
    Status,
}

impl TagKey {
    pub const ALL: [TagKey; 3] = [TagKey::Method, TagKey::Error, TagKey::Status];

    pub fn as_str(&self) -> &'static str {
        match self {
            TagKey::Method => "method",
            TagKey::Error => "error",
            TagKey::Status => "status",
        }
    }

    /// Whether `key` collides with one of the crate-owned keys
    pub fn is_reserved(key: &str) -> bool {
        Self::ALL.iter().any(|reserved| reserved.as_str() == key)
    }
}

impl From<TagKey> for String {
    fn from(key: TagKey) -> Self {
        key.as_str().to_string()
    }
}

/// Canonical values of the `status` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Ok,
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Ok => "OK",
            CallStatus::Error => "ERROR",
        }
    }
}

/// Immutable set of tags attached to one measurement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagContext {
    tags: BTreeMap<String, String>,
}

impl TagContext {
    pub fn builder() -> TagContextBuilder {
        TagContextBuilder::default()
    }

    /// Start a new builder seeded with these tags
    pub fn to_builder(&self) -> TagContextBuilder {
        TagContextBuilder {
            tags: self.tags.clone(),
        }
    }

    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        self.tags.get(key.as_ref()).map(String::as_str)
    }

    pub fn contains(&self, key: impl AsRef<str>) -> bool {
        self.tags.contains_key(key.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TagContextBuilder {
    tags: BTreeMap<String, String>,
}

impl TagContextBuilder {
    /// Insert or overwrite a tag
    pub fn put(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn remove(mut self, key: impl AsRef<str>) -> Self {
        self.tags.remove(key.as_ref());
        self
    }

    /// Write the method/status/error triple for a finished call.
    ///
    /// Exactly one of `status=OK` or `status=ERROR` + `error=<description>`
    /// ends up in the context; an inherited `error` tag is dropped on success.
    pub fn outcome(self, method: &str, error: Option<&str>) -> Self {
        let builder = self.put(TagKey::Method, method);
        match error {
            None => builder
                .remove(TagKey::Error.as_str())
                .put(TagKey::Status, CallStatus::Ok.as_str()),
            Some(description) => builder
                .put(TagKey::Error, description)
                .put(TagKey::Status, CallStatus::Error.as_str()),
        }
    }

    pub fn build(self) -> TagContext {
        TagContext { tags: self.tags }
    }
}

/// Access to the tags carried by an OpenTelemetry context
pub trait TagContextExt {
    /// Tags carried by this context, empty when none were attached
    fn tag_context(&self) -> TagContext;

    /// Derive a child context carrying `tags`
    fn with_tag_context(&self, tags: TagContext) -> Self;
}

impl TagContextExt for Context {
    fn tag_context(&self) -> TagContext {
        self.get::<TagContext>().cloned().unwrap_or_default()
    }

    fn with_tag_context(&self, tags: TagContext) -> Self {
        self.with_value(tags)
    }
}
