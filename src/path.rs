//! Hierarchical path model.
//!
//! A [`NodePath`] addresses a storage leaf and only contains string keys.
//! An [`EntityPath`] may additionally contain list indexes and addresses a
//! location inside a stored value. Paths are parsed from `"a/b/c"` strings
//! or built from segment lists; both routes validate and never coerce.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Separator used by the string form of a path.
pub const SEPARATOR: char = '/';

/// One segment of an [`EntityPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// List index inside a structured value.
    Index(u64),
    /// Opaque string key.
    Key(String),
}

impl PathSegment {
    /// Returns the key if this is a string segment.
    #[must_use]
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(k) => Some(k),
            Self::Index(_) => None,
        }
    }

    /// Returns true for list indexes.
    #[must_use]
    pub const fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => f.write_str(k),
            Self::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<u64> for PathSegment {
    fn from(index: u64) -> Self {
        Self::Index(index)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index as u64)
    }
}

fn validate_key(key: &str, position: usize) -> Result<(), ValidationError> {
    if key.is_empty() {
        return Err(ValidationError::EmptySegment { position });
    }
    if key.contains(SEPARATOR) {
        return Err(ValidationError::SeparatorInSegment {
            segment: key.to_string(),
        });
    }
    Ok(())
}

fn split(s: &str) -> Result<Vec<&str>, ValidationError> {
    if s.is_empty() {
        return Err(ValidationError::EmptyPath);
    }
    let parts: Vec<&str> = s.split(SEPARATOR).collect();
    if let Some(position) = parts.iter().position(|p| p.is_empty()) {
        return Err(ValidationError::EmptySegment { position });
    }
    Ok(parts)
}

/// The index spelled by `part`, if `part` is its canonical decimal form.
fn canonical_index(part: &str) -> Option<u64> {
    let digits_only = part.bytes().all(|b| b.is_ascii_digit());
    let leading_zero = part.len() > 1 && part.starts_with('0');
    if !digits_only || leading_zero {
        return None;
    }
    part.parse().ok()
}

/// String-only path addressing a storage leaf.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct NodePath(Vec<String>);

impl NodePath {
    /// Builds a node path from keys.
    pub fn new<I, S>(segments: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(ValidationError::EmptyPath);
        }
        for (position, key) in segments.iter().enumerate() {
            validate_key(key, position)?;
        }
        Ok(Self(segments))
    }

    /// Parses `"a/b/c"`. Every segment is kept as an opaque key.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        Self::new(split(s)?)
    }

    /// Keys of this path.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments (always at least one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new path with `key` appended.
    pub fn child(&self, key: impl Into<String>) -> Result<Self, ValidationError> {
        let key = key.into();
        validate_key(&key, self.0.len())?;
        let mut segments = self.0.clone();
        segments.push(key);
        Ok(Self(segments))
    }

    /// True if `self` is a proper or improper prefix of `other`.
    #[must_use]
    pub fn is_prefix_of(&self, other: &NodePath) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// Same location as an entity path.
    #[must_use]
    pub fn to_entity_path(&self) -> EntityPath {
        EntityPath(self.0.iter().cloned().map(PathSegment::Key).collect())
    }

    pub(crate) fn from_keys_unchecked(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl FromStr for NodePath {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<Vec<String>> for NodePath {
    type Error = ValidationError;

    fn try_from(segments: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(segments)
    }
}

impl From<NodePath> for Vec<String> {
    fn from(path: NodePath) -> Self {
        path.0
    }
}

impl TryFrom<EntityPath> for NodePath {
    type Error = ValidationError;

    fn try_from(path: EntityPath) -> Result<Self, Self::Error> {
        let mut keys = Vec::with_capacity(path.0.len());
        for (position, segment) in path.0.into_iter().enumerate() {
            match segment {
                PathSegment::Key(k) => keys.push(k),
                PathSegment::Index(index) => {
                    return Err(ValidationError::NumericSegment { index, position });
                }
            }
        }
        Ok(Self(keys))
    }
}

/// Path that may address inside a stored value via list indexes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<PathSegment>", into = "Vec<PathSegment>")]
pub struct EntityPath(Vec<PathSegment>);

impl EntityPath {
    /// Builds an entity path from segments.
    pub fn new<I, S>(segments: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        let segments: Vec<PathSegment> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(ValidationError::EmptyPath);
        }
        for (position, segment) in segments.iter().enumerate() {
            if let PathSegment::Key(key) = segment {
                validate_key(key, position)?;
            }
        }
        Ok(Self(segments))
    }

    /// Parses `"list/0/title"`. Canonical decimal segments become list
    /// indexes; everything else, including `"007"` or digit runs too long
    /// for a `u64`, stays a key.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let segments = split(s)?
            .into_iter()
            .map(|part| match canonical_index(part) {
                Some(index) => PathSegment::Index(index),
                None => PathSegment::Key(part.to_string()),
            })
            .collect();
        Ok(Self(segments))
    }

    /// Segments of this path.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Number of segments (always at least one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if any segment is a list index.
    #[must_use]
    pub fn has_index(&self) -> bool {
        self.0.iter().any(PathSegment::is_index)
    }
}

impl fmt::Display for EntityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for EntityPath {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<Vec<PathSegment>> for EntityPath {
    type Error = ValidationError;

    fn try_from(segments: Vec<PathSegment>) -> Result<Self, Self::Error> {
        Self::new(segments)
    }
}

impl From<EntityPath> for Vec<PathSegment> {
    fn from(path: EntityPath) -> Self {
        path.0
    }
}

impl From<NodePath> for EntityPath {
    fn from(path: NodePath) -> Self {
        path.to_entity_path()
    }
}

/// Anything accepted where a [`NodePath`] is required.
pub trait IntoNodePath {
    /// Validates and converts into a node path.
    fn into_node_path(self) -> Result<NodePath, ValidationError>;
}

/// Anything accepted where an [`EntityPath`] is required.
pub trait IntoEntityPath {
    /// Validates and converts into an entity path.
    fn into_entity_path(self) -> Result<EntityPath, ValidationError>;
}

impl IntoNodePath for NodePath {
    fn into_node_path(self) -> Result<NodePath, ValidationError> {
        Ok(self)
    }
}

impl IntoNodePath for &NodePath {
    fn into_node_path(self) -> Result<NodePath, ValidationError> {
        Ok(self.clone())
    }
}

impl IntoNodePath for EntityPath {
    fn into_node_path(self) -> Result<NodePath, ValidationError> {
        NodePath::try_from(self)
    }
}

impl IntoNodePath for &str {
    fn into_node_path(self) -> Result<NodePath, ValidationError> {
        NodePath::parse(self)
    }
}

impl IntoNodePath for String {
    fn into_node_path(self) -> Result<NodePath, ValidationError> {
        NodePath::parse(&self)
    }
}

impl IntoNodePath for Vec<String> {
    fn into_node_path(self) -> Result<NodePath, ValidationError> {
        NodePath::new(self)
    }
}

impl IntoNodePath for Vec<&str> {
    fn into_node_path(self) -> Result<NodePath, ValidationError> {
        NodePath::new(self)
    }
}

impl IntoNodePath for &[&str] {
    fn into_node_path(self) -> Result<NodePath, ValidationError> {
        NodePath::new(self.iter().copied())
    }
}

impl<const N: usize> IntoNodePath for [&str; N] {
    fn into_node_path(self) -> Result<NodePath, ValidationError> {
        NodePath::new(self)
    }
}

impl IntoNodePath for Vec<PathSegment> {
    fn into_node_path(self) -> Result<NodePath, ValidationError> {
        NodePath::try_from(EntityPath::new(self)?)
    }
}

impl IntoEntityPath for EntityPath {
    fn into_entity_path(self) -> Result<EntityPath, ValidationError> {
        Ok(self)
    }
}

impl IntoEntityPath for &EntityPath {
    fn into_entity_path(self) -> Result<EntityPath, ValidationError> {
        Ok(self.clone())
    }
}

impl IntoEntityPath for NodePath {
    fn into_entity_path(self) -> Result<EntityPath, ValidationError> {
        Ok(self.to_entity_path())
    }
}

impl IntoEntityPath for &NodePath {
    fn into_entity_path(self) -> Result<EntityPath, ValidationError> {
        Ok(self.to_entity_path())
    }
}

impl IntoEntityPath for &str {
    fn into_entity_path(self) -> Result<EntityPath, ValidationError> {
        EntityPath::parse(self)
    }
}

impl IntoEntityPath for String {
    fn into_entity_path(self) -> Result<EntityPath, ValidationError> {
        EntityPath::parse(&self)
    }
}

impl IntoEntityPath for Vec<PathSegment> {
    fn into_entity_path(self) -> Result<EntityPath, ValidationError> {
        EntityPath::new(self)
    }
}

impl IntoEntityPath for Vec<&str> {
    fn into_entity_path(self) -> Result<EntityPath, ValidationError> {
        EntityPath::new(self)
    }
}

impl<const N: usize> IntoEntityPath for [&str; N] {
    fn into_entity_path(self) -> Result<EntityPath, ValidationError> {
        EntityPath::new(self)
    }
}

impl<const N: usize> IntoEntityPath for [PathSegment; N] {
    fn into_entity_path(self) -> Result<EntityPath, ValidationError> {
        EntityPath::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_on_separator() {
        let p = NodePath::parse("a/b/c").unwrap();
        assert_eq!(p.segments(), &["a", "b", "c"]);
        assert_eq!(p.to_string(), "a/b/c");
    }

    #[test]
    fn empty_paths_are_rejected() {
        assert_eq!(NodePath::parse(""), Err(ValidationError::EmptyPath));
        assert_eq!(NodePath::new(Vec::<String>::new()), Err(ValidationError::EmptyPath));
        assert_eq!(EntityPath::parse(""), Err(ValidationError::EmptyPath));
    }

    #[test]
    fn empty_segments_are_rejected() {
        assert_eq!(NodePath::parse("a//b"), Err(ValidationError::EmptySegment { position: 1 }));
        assert_eq!(NodePath::parse("/a"), Err(ValidationError::EmptySegment { position: 0 }));
        assert_eq!(EntityPath::parse("a/"), Err(ValidationError::EmptySegment { position: 1 }));
    }

    #[test]
    fn separator_inside_segment_is_rejected() {
        let err = NodePath::new(["a", "b/c"]).unwrap_err();
        assert!(matches!(err, ValidationError::SeparatorInSegment { .. }));
    }

    #[test]
    fn entity_parse_turns_digits_into_indexes() {
        let p = EntityPath::parse("list/3/title").unwrap();
        assert_eq!(
            p.segments(),
            &[PathSegment::from("list"), PathSegment::Index(3), PathSegment::from("title")]
        );
        assert!(p.has_index());
        assert_eq!(p.to_string(), "list/3/title");
    }

    #[test]
    fn non_canonical_digits_stay_keys() {
        let p = EntityPath::parse("codes/007/0/123456789012345678901234").unwrap();
        assert_eq!(
            p.segments(),
            &[
                PathSegment::from("codes"),
                PathSegment::from("007"),
                PathSegment::Index(0),
                PathSegment::from("123456789012345678901234"),
            ]
        );
        assert_eq!(p.to_string(), "codes/007/0/123456789012345678901234");
        assert_eq!(EntityPath::parse(&p.to_string()).unwrap(), p);
    }

    #[test]
    fn numeric_segment_rejected_for_node_path() {
        let entity = EntityPath::new([PathSegment::from("list"), PathSegment::Index(0)]).unwrap();
        let err = NodePath::try_from(entity).unwrap_err();
        assert_eq!(err, ValidationError::NumericSegment { index: 0, position: 1 });

        let err = vec![PathSegment::Index(1)].into_node_path().unwrap_err();
        assert!(matches!(err, ValidationError::NumericSegment { .. }));
    }

    #[test]
    fn node_parse_keeps_digit_keys_opaque() {
        let p = NodePath::parse("years/2024").unwrap();
        assert_eq!(p.segments(), &["years", "2024"]);
    }

    #[test]
    fn prefix_relation() {
        let a = NodePath::parse("a").unwrap();
        let ab = NodePath::parse("a/b").unwrap();
        assert!(a.is_prefix_of(&ab));
        assert!(a.is_prefix_of(&a));
        assert!(!ab.is_prefix_of(&a));
    }

    #[test]
    fn serde_uses_segment_arrays() {
        let p = EntityPath::parse("list/2").unwrap();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#"["list",2]"#);
        let back: EntityPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);

        let bad: Result<NodePath, _> = serde_json::from_str("[]");
        assert!(bad.is_err());
    }
}
