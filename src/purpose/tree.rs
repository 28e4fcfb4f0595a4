//! The dot-hierarchical purpose tree and its persisted form.

use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::search::PurposeMatches;

/// Key under which a node's own bucket is persisted.
pub const BUCKET_KEY: &str = "#";

/// One node of the purpose tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurposeNode {
    pub(crate) bucket: Vec<String>,
    pub(crate) children: IndexMap<String, PurposeNode>,
}

impl PurposeNode {
    /// Names registered exactly at this node.
    pub fn bucket(&self) -> &[String] {
        &self.bucket
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &PurposeNode)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn child(&self, token: &str) -> Option<&PurposeNode> {
        self.children.get(token)
    }
}

/// A tree of uppercased purpose tokens.
///
/// The root is never a purpose itself; its bucket stays empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurposeTree {
    root: PurposeNode,
}

/// Split a purpose tag into uppercased tokens, keeping empty tokens.
pub(crate) fn tokenize(tag: &str) -> Vec<String> {
    tag.to_uppercase().split('.').map(str::to_string).collect()
}

impl PurposeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    pub fn root(&self) -> &PurposeNode {
        &self.root
    }

    /// Register `name` under `purpose`.
    ///
    /// Intermediate nodes are created as needed and stay structural; only the
    /// last token's node receives the name. Registration ends at the first
    /// empty or `0` token, which still gets a node of its own: `LOG.` files
    /// the name under an empty-named child of `LOG`. Returns `false` when a
    /// token is the reserved `#`.
    pub fn register(&mut self, purpose: &str, name: impl Into<String>) -> bool {
        let mut tokens = Vec::new();
        for token in tokenize(purpose) {
            let last = token.is_empty() || token == "0";
            tokens.push(token);
            if last {
                break;
            }
        }

        if tokens.iter().any(|t| t == BUCKET_KEY) {
            tracing::warn!(purpose, "ignoring unusable purpose tag");
            return false;
        }

        let mut node = &mut self.root;
        for token in tokens {
            node = node.children.entry(token).or_default();
        }
        node.bucket.push(name.into());
        true
    }

    /// Look up the node registered at an exact dotted path.
    pub fn node(&self, path: &str) -> Option<&PurposeNode> {
        tokenize(path)
            .iter()
            .try_fold(&self.root, |node, token| node.children.get(token))
    }

    /// Search the tree with a purpose pattern.
    ///
    /// Patterns are dot separated. Each token matches a child literally or
    /// as a glob (`PURPOSE1.*` selects every child of `PURPOSE1`,
    /// `PURPOSE1.*.TEST` every `TEST` below any child). A trailing dot
    /// selects recursively: `PURPOSE1.` yields `PURPOSE1` and all of its
    /// descendants. With `include_ancestors`, the buckets of every node on a
    /// matched path are yielded as well, not only the terminal ones.
    pub fn search(&self, pattern: &str, include_ancestors: bool) -> PurposeMatches<'_> {
        PurposeMatches::new(&self.root, tokenize(pattern), include_ancestors)
    }

    /// Every distinct name registered anywhere in the tree, in tree order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for hit in self.search("", false) {
            if !names.contains(&hit.name) {
                names.push(hit.name);
            }
        }
        names
    }
}

impl Serialize for PurposeNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.children.len() + 1))?;
        map.serialize_entry(BUCKET_KEY, &self.bucket)?;
        for (token, child) in &self.children {
            map.serialize_entry(token, child)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PurposeNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NodeVisitor;

        impl<'de> Visitor<'de> for NodeVisitor {
            type Value = PurposeNode;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a purpose node map")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<PurposeNode, A::Error> {
                let mut node = PurposeNode::default();
                while let Some(key) = access.next_key::<String>()? {
                    if key == BUCKET_KEY {
                        node.bucket = access.next_value()?;
                    } else if node.children.contains_key(&key) {
                        return Err(de::Error::custom(format!("duplicate purpose {:?}", key)));
                    } else {
                        let child = access.next_value()?;
                        node.children.insert(key, child);
                    }
                }
                Ok(node)
            }
        }

        deserializer.deserialize_map(NodeVisitor)
    }
}

impl Serialize for PurposeTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // The root carries no bucket of its own.
        let mut map = serializer.serialize_map(Some(self.root.children.len()))?;
        for (token, child) in &self.root.children {
            map.serialize_entry(token, child)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PurposeTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut root = PurposeNode::deserialize(deserializer)?;
        root.bucket.clear();
        Ok(Self { root })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_attaches_to_last_token() {
        let mut tree = PurposeTree::new();
        assert!(tree.register("a.b.c", "N"));

        assert!(tree.node("A").unwrap().bucket().is_empty());
        assert!(tree.node("A.B").unwrap().bucket().is_empty());
        assert_eq!(tree.node("A.B.C").unwrap().bucket(), ["N"]);
    }

    #[test]
    fn test_register_single_token_under_root() {
        let mut tree = PurposeTree::new();
        tree.register("ActionController", "App\\Index");
        assert_eq!(tree.node("ACTIONCONTROLLER").unwrap().bucket(), ["App\\Index"]);
        assert!(tree.root().bucket().is_empty());
    }

    #[test]
    fn test_register_stops_at_first_empty_token() {
        let mut tree = PurposeTree::new();
        assert!(tree.register("LOG.", "X"));
        assert!(tree.register("LOG..WRITE", "Y"));
        assert!(tree.register("LEVEL.0.DEBUG", "Z"));

        assert!(tree.node("LOG").unwrap().bucket().is_empty());
        assert_eq!(tree.node("LOG.").unwrap().bucket(), ["X", "Y"]);
        assert!(tree.node("LOG.WRITE").is_none());
        assert_eq!(tree.node("LEVEL.0").unwrap().bucket(), ["Z"]);
        assert!(tree.node("LEVEL.0.DEBUG").is_none());

        // The empty-named child is reached by the recursive select.
        let found: Vec<&str> = tree.search("LOG.", false).map(|m| m.name).collect();
        assert_eq!(found, vec!["X", "Y"]);
    }

    #[test]
    fn test_register_empty_tag_under_empty_root_child() {
        let mut tree = PurposeTree::new();
        assert!(tree.register("", "X"));
        assert_eq!(tree.root().child("").unwrap().bucket(), ["X"]);
        assert!(tree.root().bucket().is_empty());
    }

    #[test]
    fn test_register_rejects_bucket_key() {
        let mut tree = PurposeTree::new();
        assert!(!tree.register("A.#", "X"));
        assert!(!tree.register("#", "X"));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let mut tree = PurposeTree::new();
        tree.register("ERRORHANDLER", "A");
        tree.register("LOG.WRITE", "B");

        let json = serde_json::to_string(&tree).unwrap();
        assert_eq!(
            json,
            r##"{"ERRORHANDLER":{"#":["A"]},"LOG":{"#":[],"WRITE":{"#":["B"]}}}"##
        );

        let back: PurposeTree = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn test_deserialize_without_bucket_keys() {
        let tree: PurposeTree = serde_json::from_str(r##"{"A":{"B":{"#":["x"]}}}"##).unwrap();
        assert!(tree.node("A").unwrap().bucket().is_empty());
        assert_eq!(tree.node("A.B").unwrap().bucket(), ["x"]);
    }
}
