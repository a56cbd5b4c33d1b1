//! Primitive and document types shared by every layer of the engine.
//!
//! A [`Primitive`] is the payload written by importers: a node, way or
//! relation plus its tags. The store wraps each written payload in a
//! [`Document`] carrying the identifier and version metadata used to pick a
//! winner among concurrent forks.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a primitive, shared by all of its versions.
pub type PrimitiveId = String;

/// Key/value tags attached to a primitive or a feature.
///
/// A sorted map keeps serialised output deterministic.
pub type Tags = BTreeMap<String, String>;

/// Opaque, store-assigned identifier of one version of a primitive.
///
/// Tokens that parse as unsigned integers compare numerically and sort
/// before any other token. Remaining tokens compare lexicographically.
///
/// # Examples
///
/// ```
/// use geoweave_core::VersionToken;
///
/// assert!(VersionToken::from("10") > VersionToken::from("9"));
/// assert!(VersionToken::from("abc") > VersionToken::from("9"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrow the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VersionToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for VersionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Ord for VersionToken {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.parse::<u64>(), other.0.parse::<u64>()) {
            (Ok(lhs), Ok(rhs)) => lhs.cmp(&rhs).then_with(|| self.0.cmp(&other.0)),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for VersionToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Discriminant of the three primitive kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// A single position.
    Node,
    /// An ordered sequence of node references.
    Way,
    /// An ordered list of typed member references.
    Relation,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        })
    }
}

/// A typed reference from a relation to another primitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Expected kind of the referenced primitive.
    #[serde(rename = "type")]
    pub kind: ElementKind,
    /// Identifier of the referenced primitive.
    #[serde(rename = "ref")]
    pub reference: PrimitiveId,
    /// Free-form role; carried but never interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Member {
    /// Build a member without a role.
    pub fn new(kind: ElementKind, reference: impl Into<PrimitiveId>) -> Self {
        Self {
            kind,
            reference: reference.into(),
            role: None,
        }
    }

    /// Attach a role to the member.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// Kind-specific body of a primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    /// A point in WGS84 degrees.
    Node {
        /// Latitude in degrees.
        lat: f64,
        /// Longitude in degrees.
        lon: f64,
    },
    /// Ordered node references. Repeating the first reference closes the way.
    Way {
        /// Node identifiers in path order.
        refs: Vec<PrimitiveId>,
    },
    /// Ordered members of arbitrary kinds.
    Relation {
        /// Member references in declaration order.
        members: Vec<Member>,
    },
}

impl Element {
    /// Return the kind discriminant.
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::Node { .. } => ElementKind::Node,
            Self::Way { .. } => ElementKind::Way,
            Self::Relation { .. } => ElementKind::Relation,
        }
    }

    /// Identifiers this element points at, in order.
    pub fn references(&self) -> Box<dyn Iterator<Item = &PrimitiveId> + '_> {
        match self {
            Self::Node { .. } => Box::new(std::iter::empty()),
            Self::Way { refs } => Box::new(refs.iter()),
            Self::Relation { members } => Box::new(members.iter().map(|m| &m.reference)),
        }
    }
}

/// Payload written to and read from the store.
///
/// # Examples
///
/// ```
/// use geoweave_core::{ElementKind, Primitive};
///
/// let way = Primitive::way(["a", "b"]).with_tag("highway", "path");
/// assert_eq!(way.kind(), ElementKind::Way);
/// assert_eq!(way.tags.get("highway").map(String::as_str), Some("path"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    /// Kind-specific body.
    #[serde(flatten)]
    pub element: Element,
    /// Tags; empty for untagged structural primitives.
    #[serde(default)]
    pub tags: Tags,
    /// Changeset the primitive was written under, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changeset: Option<String>,
}

impl Primitive {
    /// Untagged node at the given latitude and longitude.
    #[must_use]
    pub fn node(lat: f64, lon: f64) -> Self {
        Self::from_element(Element::Node { lat, lon })
    }

    /// Untagged way over the given node identifiers.
    pub fn way<I, S>(refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PrimitiveId>,
    {
        Self::from_element(Element::Way {
            refs: refs.into_iter().map(Into::into).collect(),
        })
    }

    /// Untagged relation over the given members.
    pub fn relation(members: impl IntoIterator<Item = Member>) -> Self {
        Self::from_element(Element::Relation {
            members: members.into_iter().collect(),
        })
    }

    fn from_element(element: Element) -> Self {
        Self {
            element,
            tags: Tags::new(),
            changeset: None,
        }
    }

    /// Replace the tag set.
    #[must_use]
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Add or replace a single tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Record the changeset the primitive belongs to.
    #[must_use]
    pub fn with_changeset(mut self, changeset: Option<String>) -> Self {
        self.changeset = changeset;
        self
    }

    /// Return the kind discriminant.
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        self.element.kind()
    }
}

/// One stored version of a primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Identifier shared by every version of the primitive.
    pub id: PrimitiveId,
    /// Identifier of this particular version.
    pub version: VersionToken,
    /// Milliseconds since the Unix epoch, when the store recorded one.
    pub timestamp: Option<u64>,
    /// Tombstone marker. Deleted forks never win fork selection.
    pub deleted: bool,
    /// Stored payload.
    pub primitive: Primitive,
}

impl Document {
    /// Order two forks of the same primitive; `Greater` means `self` wins.
    ///
    /// Differing timestamps decide first, newer winning. Missing or equal
    /// timestamps fall back to the version token order.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::cmp::Ordering;
    /// use geoweave_core::{Document, Primitive, VersionToken};
    ///
    /// let older = Document {
    ///     id: "n1".into(),
    ///     version: VersionToken::from("9"),
    ///     timestamp: Some(100),
    ///     deleted: false,
    ///     primitive: Primitive::node(0.0, 0.0),
    /// };
    /// let newer = Document { version: VersionToken::from("2"), timestamp: Some(200), ..older.clone() };
    /// assert_eq!(newer.cmp_fork(&older), Ordering::Greater);
    /// ```
    #[must_use]
    pub fn cmp_fork(&self, other: &Self) -> Ordering {
        match (self.timestamp, other.timestamp) {
            (Some(lhs), Some(rhs)) if lhs != rhs => lhs.cmp(&rhs),
            _ => self.version.cmp(&other.version),
        }
    }

    /// Return the kind of the stored primitive.
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        self.primitive.kind()
    }

    /// Borrow the stored tags.
    #[must_use]
    pub fn tags(&self) -> &Tags {
        &self.primitive.tags
    }
}
