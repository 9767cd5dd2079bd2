//! Ordered attribute lists.

use std::fmt;

use crate::error::{Error, Result};
use crate::tag::Tag;
use crate::value::Value;

/// An ordered list of `(tag, value)` attributes.
///
/// Insertion order is preserved and duplicate tags are representable:
/// callers may hand over whatever the binding layer produced, and the
/// validator reports duplicates as a caller error instead of merging them.
#[derive(Clone, Default)]
pub struct Attrs {
    entries: Vec<(Tag, Value)>,
}

impl Attrs {
    /// Create an empty attribute list.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Append an attribute, keeping any existing entry with the same tag.
    pub fn push(&mut self, tag: Tag, value: impl Into<Value>) {
        self.entries.push((tag, value.into()));
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, tag: Tag, value: impl Into<Value>) -> Self {
        self.push(tag, value);
        self
    }

    /// Replace the first entry with this tag, or append one.
    pub fn set(&mut self, tag: Tag, value: impl Into<Value>) {
        match self.entries.iter_mut().find(|(t, _)| *t == tag) {
            Some((_, v)) => *v = value.into(),
            None => self.entries.push((tag, value.into())),
        }
    }

    /// Remove every entry with this tag.
    pub fn remove(&mut self, tag: Tag) {
        self.entries.retain(|(t, _)| *t != tag);
    }

    /// The first value supplied for this tag.
    pub fn get(&self, tag: Tag) -> Option<&Value> {
        self.entries.iter().find(|(t, _)| *t == tag).map(|(_, v)| v)
    }

    /// Whether any entry carries this tag.
    pub fn contains(&self, tag: Tag) -> bool {
        self.get(tag).is_some()
    }

    /// How many entries carry this tag.
    pub fn count_of(&self, tag: Tag) -> usize {
        self.entries.iter().filter(|(t, _)| *t == tag).count()
    }

    /// Number of entries, duplicates included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Tag, &Value)> {
        self.entries.iter().map(|(t, v)| (*t, v))
    }

    /// The byte payload of this tag.
    ///
    /// # Errors
    /// - `InvalidArgument` if the tag is absent or carries a non-bytes value.
    pub fn bytes(&self, tag: Tag) -> Result<&[u8]> {
        match self.get(tag) {
            Some(Value::Bytes(b)) => Ok(b),
            Some(_) => Err(Error::InvalidArgument(format!(
                "attribute [{tag}] is not a byte array"
            ))),
            None => Err(Error::InvalidArgument(format!("attribute [{tag}] is missing"))),
        }
    }

    /// The numeric payload of this tag.
    ///
    /// # Errors
    /// - `InvalidArgument` if the tag is absent or carries a non-number value.
    pub fn number(&self, tag: Tag) -> Result<u32> {
        match self.get(tag) {
            Some(Value::Number(n)) => Ok(*n),
            Some(_) => Err(Error::InvalidArgument(format!(
                "attribute [{tag}] is not a number"
            ))),
            None => Err(Error::InvalidArgument(format!("attribute [{tag}] is missing"))),
        }
    }

    /// The boolean payload of this tag.
    ///
    /// # Errors
    /// - `InvalidArgument` if the tag is absent or carries a non-bool value.
    pub fn flag(&self, tag: Tag) -> Result<bool> {
        match self.get(tag) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(Error::InvalidArgument(format!(
                "attribute [{tag}] is not a bool"
            ))),
            None => Err(Error::InvalidArgument(format!("attribute [{tag}] is missing"))),
        }
    }

    /// Decode this tag's numeric payload into an enumeration.
    ///
    /// # Errors
    /// - `InvalidArgument` if the tag is absent, non-numeric, or out of the
    ///   enumeration's domain.
    pub fn decode<T>(&self, tag: Tag) -> Result<T>
    where
        T: TryFrom<u32, Error = Error>,
    {
        T::try_from(self.number(tag)?)
    }
}

impl fmt::Debug for Attrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(t, v)| (t, v)))
            .finish()
    }
}

impl FromIterator<(Tag, Value)> for Attrs {
    fn from_iter<I: IntoIterator<Item = (Tag, Value)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

impl IntoIterator for Attrs {
    type Item = (Tag, Value);
    type IntoIter = std::vec::IntoIter<(Tag, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_get() {
        let attrs = Attrs::new()
            .with(Tag::Alias, "mail")
            .with(Tag::Accessibility, 1u32)
            .with(Tag::IsPersistent, true);

        assert_eq!(attrs.bytes(Tag::Alias).unwrap(), b"mail");
        assert_eq!(attrs.number(Tag::Accessibility).unwrap(), 1);
        assert!(attrs.flag(Tag::IsPersistent).unwrap());
        assert!(!attrs.contains(Tag::Secret));
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut attrs = Attrs::new();
        attrs.push(Tag::Alias, "a");
        attrs.push(Tag::Alias, "b");
        assert_eq!(attrs.count_of(Tag::Alias), 2);
        // `get` sees the first entry.
        assert_eq!(attrs.bytes(Tag::Alias).unwrap(), b"a");
    }

    #[test]
    fn test_set_replaces() {
        let mut attrs = Attrs::new().with(Tag::Alias, "a");
        attrs.set(Tag::Alias, "b");
        assert_eq!(attrs.count_of(Tag::Alias), 1);
        assert_eq!(attrs.bytes(Tag::Alias).unwrap(), b"b");
    }

    #[test]
    fn test_typed_accessor_mismatch() {
        let attrs = Attrs::new().with(Tag::Alias, "a");
        assert!(attrs.number(Tag::Alias).is_err());
        assert!(attrs.flag(Tag::Alias).is_err());
    }
}
