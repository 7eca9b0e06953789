//! Node lookup trie.
//!
//! Indexes subscription paths and classifies a mutated path against them.
//! Nodes are either a terminal [`TrieNode::Leaf`] or a [`TrieNode::Branch`]
//! keyed by segment; the root is always a branch.
//!
//! Adding a path always makes its final node a leaf, discarding whatever
//! branch (and descendant leaves) lived there before. Adding a path that
//! runs through an existing leaf turns that leaf into a branch. In both
//! directions the most recent `add` wins.

use std::collections::BTreeMap;

use crate::path::{EntityPath, NodePath, PathSegment};

#[derive(Debug, Clone, PartialEq, Eq)]
enum TrieNode {
    Leaf,
    Branch(BTreeMap<String, TrieNode>),
}

impl TrieNode {
    fn branch() -> Self {
        Self::Branch(BTreeMap::new())
    }
}

/// Relationship between a queried path and the registered leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafMatch {
    /// Nothing registered along the path, or the path has a list index.
    None,
    /// The path itself is registered.
    Exact(NodePath),
    /// A registered leaf is a proper prefix of the path.
    Ancestor(NodePath),
    /// The path is a proper prefix of these registered leaves.
    Descendants(Vec<NodePath>),
}

impl LeafMatch {
    /// Registered paths affected by the query, in lookup order.
    #[must_use]
    pub fn paths(&self) -> &[NodePath] {
        match self {
            Self::None => &[],
            Self::Exact(p) | Self::Ancestor(p) => std::slice::from_ref(p),
            Self::Descendants(ps) => ps,
        }
    }

    /// True for [`LeafMatch::None`].
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Path-matching trie over subscription paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLookupTrie {
    root: TrieNode,
}

impl Default for NodeLookupTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeLookupTrie {
    /// Creates an empty trie.
    #[must_use]
    pub fn new() -> Self {
        Self { root: TrieNode::branch() }
    }

    /// Registers `path` as a leaf.
    pub fn add(&mut self, path: &NodePath) {
        let segments = path.segments();
        let Some((last, parents)) = segments.split_last() else {
            return;
        };

        let mut node = &mut self.root;
        for key in parents {
            if matches!(node, TrieNode::Leaf) {
                *node = TrieNode::branch();
            }
            let TrieNode::Branch(children) = node else {
                return;
            };
            node = children.entry(key.clone()).or_insert_with(TrieNode::branch);
        }

        if matches!(node, TrieNode::Leaf) {
            *node = TrieNode::branch();
        }
        if let TrieNode::Branch(children) = node {
            children.insert(last.clone(), TrieNode::Leaf);
        }
    }

    /// Removes the leaf at `path`, pruning branches left without children.
    ///
    /// Returns false if no leaf was registered there.
    pub fn delete(&mut self, path: &NodePath) -> bool {
        fn remove(node: &mut TrieNode, segments: &[String]) -> bool {
            let TrieNode::Branch(children) = node else {
                return false;
            };
            let Some((first, rest)) = segments.split_first() else {
                return false;
            };

            if rest.is_empty() {
                if matches!(children.get(first), Some(TrieNode::Leaf)) {
                    children.remove(first);
                    return true;
                }
                return false;
            }

            let Some(child) = children.get_mut(first) else {
                return false;
            };
            let removed = remove(child, rest);
            if removed && matches!(child, TrieNode::Branch(c) if c.is_empty()) {
                children.remove(first);
            }
            removed
        }

        remove(&mut self.root, path.segments())
    }

    /// Classifies `path` against the registered leaves.
    #[must_use]
    pub fn find_matching_leaf_nodes(&self, path: &EntityPath) -> LeafMatch {
        if path.has_index() {
            return LeafMatch::None;
        }

        let segments = path.segments();
        let mut node = &self.root;
        let mut walked: Vec<String> = Vec::with_capacity(segments.len());

        for (i, segment) in segments.iter().enumerate() {
            let PathSegment::Key(key) = segment else {
                return LeafMatch::None;
            };
            let TrieNode::Branch(children) = node else {
                return LeafMatch::None;
            };
            let Some(child) = children.get(key) else {
                return LeafMatch::None;
            };
            walked.push(key.clone());

            if matches!(child, TrieNode::Leaf) {
                let matched = NodePath::from_keys_unchecked(walked);
                return if i + 1 == segments.len() {
                    LeafMatch::Exact(matched)
                } else {
                    LeafMatch::Ancestor(matched)
                };
            }
            node = child;
        }

        let mut found = Vec::new();
        collect_leaves(node, &mut walked, &mut found);
        if found.is_empty() {
            LeafMatch::None
        } else {
            LeafMatch::Descendants(found)
        }
    }

    /// Every registered leaf path.
    #[must_use]
    pub fn leaf_paths(&self) -> Vec<NodePath> {
        let mut found = Vec::new();
        collect_leaves(&self.root, &mut Vec::new(), &mut found);
        found
    }

    /// True if `path` is registered exactly.
    #[must_use]
    pub fn contains(&self, path: &NodePath) -> bool {
        matches!(
            self.find_matching_leaf_nodes(&path.to_entity_path()),
            LeafMatch::Exact(_)
        )
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(&self.root, TrieNode::Branch(children) if children.is_empty())
    }

    /// Resets to an empty root.
    pub fn clear(&mut self) {
        self.root = TrieNode::branch();
    }
}

fn collect_leaves(node: &TrieNode, prefix: &mut Vec<String>, out: &mut Vec<NodePath>) {
    match node {
        TrieNode::Leaf => {
            if !prefix.is_empty() {
                out.push(NodePath::from_keys_unchecked(prefix.clone()));
            }
        }
        TrieNode::Branch(children) => {
            for (key, child) in children {
                prefix.push(key.clone());
                collect_leaves(child, prefix, out);
                prefix.pop();
            }
        }
    }
}
