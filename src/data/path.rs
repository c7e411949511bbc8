//! Instance and schema paths.
//!
//! A [`DataPath`] addresses a single node in the data tree. It is an ordered
//! sequence of [`PathArg`] segments, each naming a node type and, for list
//! entries, carrying the entry key:
//!
//! ```text
//! /vpp/bridge-domains/bridge-domain=bd1
//!  │   │              └── list entry: name "bridge-domain", key "bd1"
//!  │   └── container
//!  └── container
//! ```
//!
//! Stripping the keys yields the [`SchemaPath`], which identifies the node
//! *type* and is what customizers are registered under.

use std::fmt;
use std::str::FromStr;

/// error type for invalid node names, keys and paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidPathError {
    Empty,
    TooLong(usize),
    InvalidStart(char),
    InvalidCharacter { char: char, position: usize },
    NotAbsolute(String),
}

impl fmt::Display for InvalidPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "name cannot be empty"),
            Self::TooLong(len) => write!(f, "name too long: {} characters", len),
            Self::InvalidStart(c) => write!(f, "name cannot start with '{}'", c),
            Self::InvalidCharacter { char, position } => {
                write!(f, "invalid character '{}' at position {}", char, position)
            }
            Self::NotAbsolute(path) => write!(f, "path must start with '/': '{}'", path),
        }
    }
}

impl std::error::Error for InvalidPathError {}

/// A validated node type name.
///
/// Node names double as git tree entry names, so they are restricted:
/// - 1-64 characters
/// - ASCII alphanumerics, underscores, hyphens
/// - must start with a letter
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeName(String);

impl NodeName {
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidPathError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), InvalidPathError> {
        let first = name.chars().next().ok_or(InvalidPathError::Empty)?;

        if name.len() > 64 {
            return Err(InvalidPathError::TooLong(name.len()));
        }

        if !first.is_ascii_alphabetic() {
            return Err(InvalidPathError::InvalidStart(first));
        }

        for (i, c) in name.chars().enumerate() {
            if !c.is_ascii_alphanumeric() && c != '_' && c != '-' {
                return Err(InvalidPathError::InvalidCharacter { char: c, position: i });
            }
        }

        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NodeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A validated list entry key.
///
/// Keys end up in directory names (`name=key`), so `/` and `=` are rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListKey(String);

impl ListKey {
    pub fn new(key: impl Into<String>) -> Result<Self, InvalidPathError> {
        let key = key.into();
        Self::validate(&key)?;
        Ok(Self(key))
    }

    fn validate(key: &str) -> Result<(), InvalidPathError> {
        if key.is_empty() {
            return Err(InvalidPathError::Empty);
        }

        if key.len() > 128 {
            return Err(InvalidPathError::TooLong(key.len()));
        }

        for (i, c) in key.chars().enumerate() {
            if !c.is_ascii_alphanumeric() && !matches!(c, '_' | '-' | '.' | ':') {
                return Err(InvalidPathError::InvalidCharacter { char: c, position: i });
            }
        }

        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ListKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ListKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One segment of a [`DataPath`]: a node type plus an optional list key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathArg {
    name: NodeName,
    key: Option<ListKey>,
}

impl PathArg {
    /// A container (singleton) segment.
    pub fn container(name: NodeName) -> Self {
        Self { name, key: None }
    }

    /// A list entry segment.
    pub fn entry(name: NodeName, key: ListKey) -> Self {
        Self { name, key: Some(key) }
    }

    pub fn name(&self) -> &NodeName {
        &self.name
    }

    pub fn key(&self) -> Option<&ListKey> {
        self.key.as_ref()
    }

    pub fn is_entry(&self) -> bool {
        self.key.is_some()
    }
}

impl fmt::Display for PathArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}={}", self.name, key),
            None => write!(f, "{}", self.name),
        }
    }
}

impl FromStr for PathArg {
    type Err = InvalidPathError;

    /// Parse `name` or `name=key`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((name, key)) => Ok(Self::entry(NodeName::new(name)?, ListKey::new(key)?)),
            None => Ok(Self::container(NodeName::new(s)?)),
        }
    }
}

/// Absolute path to a node in the data tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DataPath(Vec<PathArg>);

impl DataPath {
    /// The root path (`/`).
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_args(args: Vec<PathArg>) -> Self {
        Self(args)
    }

    /// Extend with a container segment.
    pub fn child(&self, name: &str) -> Result<Self, InvalidPathError> {
        Ok(self.join(PathArg::container(NodeName::new(name)?)))
    }

    /// Extend with a list entry segment.
    pub fn entry(&self, name: &str, key: &str) -> Result<Self, InvalidPathError> {
        Ok(self.join(PathArg::entry(NodeName::new(name)?, ListKey::new(key)?)))
    }

    /// Extend with an already validated segment.
    pub fn join(&self, arg: PathArg) -> Self {
        let mut args = self.0.clone();
        args.push(arg);
        Self(args)
    }

    pub fn args(&self) -> &[PathArg] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&PathArg> {
        self.0.last()
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    pub fn starts_with(&self, prefix: &DataPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// The key of the first segment named `name`, if that segment is a list entry.
    pub fn first_key_of(&self, name: &str) -> Option<&ListKey> {
        self.0
            .iter()
            .find(|arg| arg.name.as_str() == name)
            .and_then(|arg| arg.key.as_ref())
    }

    /// The type of the addressed node.
    pub fn schema_path(&self) -> SchemaPath {
        SchemaPath(self.0.iter().map(|arg| arg.name.clone()).collect())
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for arg in &self.0 {
            write!(f, "/{}", arg)?;
        }
        Ok(())
    }
}

impl FromStr for DataPath {
    type Err = InvalidPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| InvalidPathError::NotAbsolute(s.to_string()))?;

        rest.split('/')
            .filter(|segment| !segment.is_empty())
            .map(PathArg::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

/// A node type identifier: a [`DataPath`] with the list keys stripped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SchemaPath(Vec<NodeName>);

impl SchemaPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn names(&self) -> &[NodeName] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&NodeName> {
        self.0.last()
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    pub fn child(&self, name: NodeName) -> Self {
        let mut names = self.0.clone();
        names.push(name);
        Self(names)
    }

    /// True if `self` lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &SchemaPath) -> bool {
        self.0.len() > ancestor.0.len() && self.0.starts_with(&ancestor.0)
    }
}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for name in &self.0 {
            write!(f, "/{}", name)?;
        }
        Ok(())
    }
}

impl FromStr for SchemaPath {
    type Err = InvalidPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| InvalidPathError::NotAbsolute(s.to_string()))?;

        rest.split('/')
            .filter(|segment| !segment.is_empty())
            .map(NodeName::new)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}
