//! Metric and service check tags.
use std::fmt;

use serde::{Serialize, Serializer};

/// A tag.
///
/// Tags are generally in the form of `name:value`, where the name and value are separated by the first colon.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub struct Tag(String);

impl Tag {
    /// Creates a tag from the given name and value.
    pub fn from_parts<N, V>(name: N, value: V) -> Self
    where
        N: fmt::Display,
        V: fmt::Display,
    {
        Self(format!("{}:{}", name, value))
    }

    /// Returns the full tag as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Tag {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Tag {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&Tag> for Tag {
    fn from(tag: &Tag) -> Self {
        tag.clone()
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Tag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

/// A set of tags.
///
/// Insertion order is kept for display purposes only: equality between two sets ignores order, and inserting a tag
/// that is already present does nothing.
#[derive(Clone, Debug, Default, Serialize)]
pub struct TagSet(Vec<Tag>);

impl TagSet {
    /// Returns `true` if the tag set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of tags in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Inserts a tag into the set.
    ///
    /// If the tag is already present in the set, this does nothing.
    pub fn insert_tag<T>(&mut self, tag: T)
    where
        T: Into<Tag>,
    {
        let tag = tag.into();
        if !self.0.iter().any(|existing| existing == &tag) {
            self.0.push(tag);
        }
    }

    /// Builder-style variant of [`insert_tag`][Self::insert_tag].
    pub fn with_tag<T>(mut self, tag: T) -> Self
    where
        T: Into<Tag>,
    {
        self.insert_tag(tag);
        self
    }

    /// Returns `true` if the given tag is contained in the set.
    ///
    /// This matches the complete tag, rather than just the name.
    pub fn has_tag<T>(&self, tag: T) -> bool
    where
        T: AsRef<str>,
    {
        let tag = tag.as_ref();
        self.0.iter().any(|existing| existing.as_str() == tag)
    }

    /// Merges the tags from another set into this set.
    ///
    /// Tags from `other` that are already present are skipped.
    pub fn merge_missing(&mut self, other: &TagSet) {
        for tag in &other.0 {
            self.insert_tag(tag);
        }
    }

    /// Returns an iterator over the tags in the set.
    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.0.iter()
    }
}

impl PartialEq<TagSet> for TagSet {
    fn eq(&self, other: &TagSet) -> bool {
        // Both sides are deduplicated on insert, so equal lengths plus containment means equal sets.
        self.0.len() == other.0.len() && other.0.iter().all(|tag| self.0.contains(tag))
    }
}

impl Eq for TagSet {}

impl<T> FromIterator<T> for TagSet
where
    T: Into<Tag>,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut tags = TagSet::default();
        tags.extend(iter);
        tags
    }
}

impl<T> Extend<T> for TagSet
where
    T: Into<Tag>,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for tag in iter {
            self.insert_tag(tag);
        }
    }
}

impl IntoIterator for TagSet {
    type Item = Tag;
    type IntoIter = std::vec::IntoIter<Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, tag) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", tag)?;
        }
        write!(f, "]")
    }
}
