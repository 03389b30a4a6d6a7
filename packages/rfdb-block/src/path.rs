//! Path addressing for structured containers.
//!
//! A `PathElement` names one child of a node; a `Path` is the sequence of
//! elements walked from a root. Elements are non-empty and slash-free so a
//! path has one unambiguous textual form, `a/b/c`.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use crate::error::{BlockError, Result};

/// Reserved child name holding an entry's typed metadata.
pub const METADATA_ENTRY: &str = "md";

/// One segment of a structured path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathElement(String);

impl PathElement {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(BlockError::invalid_argument("path element cannot be empty"));
        }
        if name.contains('/') {
            return Err(BlockError::invalid_argument(format!(
                "path element '{}' cannot contain '/'",
                name
            )));
        }
        Ok(Self(name))
    }

    /// The reserved `md` element.
    pub fn metadata() -> Self {
        Self(METADATA_ENTRY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PathElement {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PathElement {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for PathElement {
    type Error = BlockError;

    fn try_from(name: &str) -> Result<Self> {
        Self::new(name)
    }
}

impl FromStr for PathElement {
    type Err = BlockError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Ordered sequence of path elements. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    elements: Vec<PathElement>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `a/b/c`. The empty string is the empty path.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Self::new());
        }
        s.split('/').map(PathElement::new).collect()
    }

    pub fn push(&mut self, element: PathElement) {
        self.elements.push(element);
    }

    /// Path extended by one element.
    pub fn join(&self, element: PathElement) -> Self {
        let mut joined = self.clone();
        joined.push(element);
        joined
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// First element.
    pub fn head(&self) -> Option<&PathElement> {
        self.elements.first()
    }

    /// Everything after the first element.
    pub fn tail(&self) -> Path {
        Self {
            elements: self.elements.iter().skip(1).cloned().collect(),
        }
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathElement> {
        self.elements.iter()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            f.write_str(element.as_str())?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = BlockError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<PathElement> for Path {
    fn from(element: PathElement) -> Self {
        Self {
            elements: vec![element],
        }
    }
}

impl From<Vec<PathElement>> for Path {
    fn from(elements: Vec<PathElement>) -> Self {
        Self { elements }
    }
}

impl FromIterator<PathElement> for Path {
    fn from_iter<I: IntoIterator<Item = PathElement>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a PathElement;
    type IntoIter = std::slice::Iter<'a, PathElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_validation() {
        assert!(PathElement::new("columns").is_ok());
        assert!(PathElement::new("").is_err());
        assert!(PathElement::new("a/b").is_err());
        assert_eq!(PathElement::metadata().as_str(), METADATA_ENTRY);
    }

    #[test]
    fn test_parse_and_display() {
        let path = Path::parse("a/b/c").unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.head().unwrap().as_str(), "a");
        assert_eq!(path.tail().to_string(), "b/c");
        assert_eq!(path.to_string(), "a/b/c");
        assert!(Path::parse("").unwrap().is_empty());
        assert!(Path::parse("a//b").is_err());
    }

    #[test]
    fn test_tail_of_single_element_is_empty() {
        let path: Path = "only".parse().unwrap();
        assert!(path.tail().is_empty());
        assert!(Path::new().head().is_none());
    }

    #[test]
    fn test_join() {
        let base = Path::parse("a").unwrap();
        let joined = base.join(PathElement::new("b").unwrap());
        assert_eq!(joined.to_string(), "a/b");
        assert_eq!(base.len(), 1);
    }
}
