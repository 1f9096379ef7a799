//! Textual index tree.
//!
//! A minimal element model (tag, string attributes, ordered children)
//! serialized as JSON. Attribute order is irrelevant; child order is
//! significant and is the decode order.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::util::{Error, Result};

/// One element of the index tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        self.attrs.insert(key.to_string(), value.into());
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// Attribute parsed with `FromStr`; `None` if missing or unparsable.
    pub fn attr_parse<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.attr(key).and_then(|s| s.trim().parse().ok())
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Children with the given tag.
    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Read an index file.
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| Error::from_open(path, e))?;
        Self::from_slice(&bytes)
    }

    /// Write an index file.
    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_json_shape() {
        let mut root = Element::new("cycles");
        root.push(Element::new("film").with_attr("name", "film"));
        let json = String::from_utf8(root.to_bytes().unwrap()).unwrap();
        assert!(json.contains("\"tag\": \"cycles\""));
        // Empty maps are omitted.
        assert!(!json.contains("\"attrs\": {}"));

        let back = Element::from_slice(json.as_bytes()).unwrap();
        assert_eq!(back, root);
    }

    #[test]
    fn test_attr_parse() {
        let e = Element::new("x").with_attr("n", " 42 ").with_attr("bad", "4x");
        assert_eq!(e.attr_parse::<i32>("n"), Some(42));
        assert_eq!(e.attr_parse::<i32>("bad"), None);
        assert_eq!(e.attr_parse::<i32>("missing"), None);
    }

    #[test]
    fn test_missing_children_field() {
        let e = Element::from_slice(br#"{"tag":"shader"}"#).unwrap();
        assert!(e.children.is_empty());
        assert!(e.attrs.is_empty());
    }
}
