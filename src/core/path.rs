//! Path - Slash-separated addresses for the path store
//!
//! Paths address nodes by their keys from the root, like filesystem paths.
//!
//! # Examples
//! - `/user/name`
//! - `user/preferences/coffee`
//! - `/` (the root)
//!
//! # Key Points
//! - Leading, trailing and repeated slashes are ignored
//! - Segments follow the same rules as category names (no `:` or `/`,
//!   not blank, not the memory marker)

use std::fmt;

use super::error::{Result, TreeError};
use super::node::{MemoryNode, ROOT_ID};
use super::tree::validate_name;

/// A path into the memory tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    /// Keys from the root down (e.g., ["user", "name"])
    segments: Vec<String>,
}

impl Path {
    /// Parse a path string
    ///
    /// # Examples
    /// ```
    /// use memtree::core::path::Path;
    ///
    /// let path = Path::parse("/user/preferences/coffee").unwrap();
    /// assert_eq!(path.segments().len(), 3);
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() {
            return Err(TreeError::InvalidPath("path cannot be empty".to_string()));
        }

        let segments = s
            .split('/')
            .filter(|segment| !segment.trim().is_empty())
            .map(|segment| {
                validate_name(segment)
                    .map_err(|_| TreeError::InvalidPath(format!("invalid segment {:?} in {}", segment, s)))
            })
            .collect::<Result<Vec<String>>>()?;

        Ok(Self { segments })
    }

    /// Get path segments
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Id of the node this path addresses; ids follow keys from the root
    pub fn to_node_id(&self) -> String {
        let mut id = ROOT_ID.to_string();
        for segment in &self.segments {
            id = MemoryNode::child_id(&id, segment);
        }
        id
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let path = Path::parse("/user/preferences/coffee").unwrap();
        assert_eq!(path.segments(), &["user", "preferences", "coffee"]);
    }

    #[test]
    fn test_parse_with_slashes() {
        let path1 = Path::parse("/user/name/").unwrap();
        let path2 = Path::parse("user/name").unwrap();
        assert_eq!(path1, path2);
    }

    #[test]
    fn test_multiple_consecutive_slashes() {
        let path = Path::parse("user//name///first").unwrap();
        assert_eq!(path.segments(), &["user", "name", "first"]);
    }

    #[test]
    fn test_root() {
        let path = Path::parse("/").unwrap();
        assert!(path.is_root());
        assert_eq!(path.to_string(), "/");
        assert_eq!(path.to_node_id(), "root");
    }

    #[test]
    fn test_empty_path_error() {
        assert!(Path::parse("").is_err());
        assert!(Path::parse("   ").is_err());
    }

    #[test]
    fn test_invalid_segments() {
        assert!(matches!(Path::parse("/a:b/c"), Err(TreeError::InvalidPath(_))));
        assert!(matches!(Path::parse("/记忆"), Err(TreeError::InvalidPath(_))));
    }

    #[test]
    fn test_unicode_segments() {
        let path = Path::parse("/个人信息/基本信息").unwrap();
        assert_eq!(path.to_node_id(), "root:个人信息:基本信息");
        assert_eq!(path.to_string(), "/个人信息/基本信息");
    }
}
