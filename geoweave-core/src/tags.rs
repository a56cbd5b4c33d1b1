//! Decide whether a tag set carries meaning of its own.
//!
//! Primitives whose only tags are bookkeeping (import provenance, editor
//! names and similar) exist to give shape to something else. Exporters use
//! [`TagFilter`] to skip them as standalone features.

use std::collections::{BTreeMap, BTreeSet};

use crate::Tags;

/// Keys that never make a tag set interesting on their own.
pub const DEFAULT_UNINTERESTING_KEYS: &[&str] = &[
    "source",
    "source_ref",
    "source:ref",
    "history",
    "attribution",
    "created_by",
    "tiger:county",
    "tiger:tlid",
    "tiger:upload_uuid",
];

/// How an ignored key is matched.
#[derive(Debug, Clone, PartialEq, Eq)]
enum IgnoreRule {
    AnyValue,
    Value(String),
}

/// Classifies tag sets as interesting or not.
///
/// A tag is interesting when its key is not in the uninteresting set and
/// it is not excluded by an ignore rule. A tag set is interesting when it
/// holds at least one interesting tag.
///
/// # Examples
///
/// ```
/// use geoweave_core::{Tags, TagFilter};
///
/// let filter = TagFilter::default().with_ignored_tag("area", "yes");
/// let mut tags = Tags::new();
/// tags.insert("created_by".into(), "JOSM".into());
/// tags.insert("area".into(), "yes".into());
/// assert!(!filter.is_interesting(&tags));
///
/// tags.insert("name".into(), "Green".into());
/// assert!(filter.is_interesting(&tags));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    uninteresting_keys: BTreeSet<String>,
    ignored: BTreeMap<String, IgnoreRule>,
}

impl Default for TagFilter {
    fn default() -> Self {
        Self {
            uninteresting_keys: DEFAULT_UNINTERESTING_KEYS
                .iter()
                .map(|key| (*key).to_owned())
                .collect(),
            ignored: BTreeMap::new(),
        }
    }
}

impl TagFilter {
    /// Treat `key` as uninteresting in addition to the defaults.
    #[must_use]
    pub fn with_uninteresting_key(mut self, key: impl Into<String>) -> Self {
        self.uninteresting_keys.insert(key.into());
        self
    }

    /// Ignore `key` whatever its value.
    #[must_use]
    pub fn with_ignored_key(mut self, key: impl Into<String>) -> Self {
        self.ignored.insert(key.into(), IgnoreRule::AnyValue);
        self
    }

    /// Ignore `key` only when it carries exactly `value`.
    #[must_use]
    pub fn with_ignored_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ignored
            .insert(key.into(), IgnoreRule::Value(value.into()));
        self
    }

    /// Return `true` when `key=value` is interesting on its own.
    #[must_use]
    pub fn is_interesting_tag(&self, key: &str, value: &str) -> bool {
        if self.uninteresting_keys.contains(key) {
            return false;
        }
        match self.ignored.get(key) {
            Some(IgnoreRule::AnyValue) => false,
            Some(IgnoreRule::Value(ignored)) => ignored != value,
            None => true,
        }
    }

    /// Return `true` when at least one tag is interesting.
    #[must_use]
    pub fn is_interesting(&self, tags: &Tags) -> bool {
        tags.iter()
            .any(|(key, value)| self.is_interesting_tag(key, value))
    }
}
