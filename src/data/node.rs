//! Hierarchical data nodes.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::data::path::{InvalidPathError, ListKey, NodeName, PathArg};

/// Errors raised when decoding the JSON form of a node.
#[derive(Debug, Error)]
pub enum NodeFormatError {
    #[error("node must be a JSON object, found {0}")]
    NotAnObject(Value),

    #[error("invalid child name: {0}")]
    InvalidChild(#[from] InvalidPathError),
}

/// A node of the data tree: leaf attributes plus keyed children.
///
/// Children are addressed by [`PathArg`], so sibling list entries are unique
/// by construction. The JSON form puts attributes and children side by side:
///
/// ```text
/// {
///   "name": "bd1",                      <- attribute
///   "flood": true,                      <- attribute
///   "interface=eth0": { "mtu": 1500 }   <- child (list entry)
/// }
/// ```
///
/// Attributes are never JSON objects; objects are always children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataNode {
    attributes: BTreeMap<String, Value>,
    children: BTreeMap<PathArg, DataNode>,
}

impl DataNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a node from its attribute map.
    pub fn from_attributes(attributes: BTreeMap<String, Value>) -> Self {
        Self {
            attributes,
            children: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Builder-style child setter.
    pub fn with_child(mut self, arg: PathArg, child: DataNode) -> Self {
        self.children.insert(arg, child);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }

    /// Missing or non-boolean attributes read as `false`.
    pub fn get_bool(&self, name: &str) -> bool {
        self.attributes
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn children(&self) -> &BTreeMap<PathArg, DataNode> {
        &self.children
    }

    pub fn child(&self, arg: &PathArg) -> Option<&DataNode> {
        self.children.get(arg)
    }

    pub fn insert_child(&mut self, arg: PathArg, child: DataNode) {
        self.children.insert(arg, child);
    }

    pub fn remove_child(&mut self, arg: &PathArg) -> Option<DataNode> {
        self.children.remove(arg)
    }

    /// Navigate down a relative sequence of segments.
    pub fn descendant(&self, args: &[PathArg]) -> Option<&DataNode> {
        args.iter().try_fold(self, |node, arg| node.children.get(arg))
    }

    /// All list entries named `name`, keyed and ordered by entry key.
    pub fn entries<'a>(
        &'a self,
        name: &'a NodeName,
    ) -> impl Iterator<Item = (&'a ListKey, &'a DataNode)> + 'a {
        self.children.iter().filter_map(move |(arg, child)| match arg.key() {
            Some(key) if arg.name() == name => Some((key, child)),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty()
    }

    /// Overlay `other` onto `self`: attributes are replaced one by one and
    /// children are merged recursively.
    pub fn merge(&mut self, other: DataNode) {
        self.attributes.extend(other.attributes);
        for (arg, child) in other.children {
            match self.children.get_mut(&arg) {
                Some(existing) => existing.merge(child),
                None => {
                    self.children.insert(arg, child);
                }
            }
        }
    }

    /// JSON form of this node (see the type docs).
    pub fn to_json(&self) -> Value {
        let mut map: Map<String, Value> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (arg, child) in &self.children {
            map.insert(arg.to_string(), child.to_json());
        }
        Value::Object(map)
    }

    /// Parse the JSON form of a node.
    pub fn from_json(value: Value) -> Result<Self, NodeFormatError> {
        let map = match value {
            Value::Object(map) => map,
            other => return Err(NodeFormatError::NotAnObject(other)),
        };

        let mut node = DataNode::new();
        for (name, value) in map {
            match value {
                Value::Object(_) => {
                    let arg = PathArg::from_str(&name)?;
                    node.children.insert(arg, DataNode::from_json(value)?);
                }
                other => {
                    node.attributes.insert(name, other);
                }
            }
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn arg(s: &str) -> PathArg {
        s.parse().unwrap()
    }

    #[test]
    fn test_json_roundtrip() {
        let value = json!({
            "name": "bd1",
            "flood": true,
            "interface=eth0": { "mtu": 1500 },
            "settings": { "learn": false }
        });
        let node = DataNode::from_json(value.clone()).unwrap();
        assert_eq!(node.get_str("name"), Some("bd1"));
        assert!(node.get_bool("flood"));
        assert_eq!(node.children().len(), 2);
        assert_eq!(node.to_json(), value);
    }

    #[test]
    fn test_from_json_rejects_scalar_and_bad_names() {
        assert!(DataNode::from_json(json!(5)).is_err());
        assert!(DataNode::from_json(json!({ "bad/name": {} })).is_err());
    }

    #[test]
    fn test_entries_filters_by_name() {
        let node = DataNode::new()
            .with_child(arg("bridge-domain=a"), DataNode::new().with("name", "a"))
            .with_child(arg("bridge-domain=b"), DataNode::new().with("name", "b"))
            .with_child(arg("other=c"), DataNode::new());
        let name = NodeName::new("bridge-domain").unwrap();
        let keys: Vec<_> = node.entries(&name).map(|(k, _)| k.as_str().to_string()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_merge_recursive() {
        let mut base = DataNode::new()
            .with("a", 1)
            .with_child(arg("c"), DataNode::new().with("x", 1).with("y", 1));
        let overlay = DataNode::new()
            .with("b", 2)
            .with_child(arg("c"), DataNode::new().with("y", 2));
        base.merge(overlay);

        let expected = DataNode::new()
            .with("a", 1)
            .with("b", 2)
            .with_child(arg("c"), DataNode::new().with("x", 1).with("y", 2));
        assert_eq!(base, expected);
    }

    #[test]
    fn test_descendant() {
        let node = DataNode::new().with_child(
            arg("vpp"),
            DataNode::new().with_child(arg("bridge-domains"), DataNode::new().with("k", 1)),
        );
        let found = node.descendant(&[arg("vpp"), arg("bridge-domains")]).unwrap();
        assert_eq!(found.get("k"), Some(&json!(1)));
        assert!(node.descendant(&[arg("missing")]).is_none());
        assert_eq!(node.descendant(&[]), Some(&node));
    }
}
