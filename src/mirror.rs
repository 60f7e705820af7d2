//! In-memory mirror of a remote OSCQuery tree.
//!
//! Holds the metadata tree, the value tree and the flat path index, and
//! applies full syncs, structural patches and value updates to them. The
//! mirror does no I/O and fires no listeners; the client worker drives it.

use crate::error::{OscQueryError, Result};
use crate::osc::{OscArg, OscMessage};
use crate::path::{ancestry, index_key, is_within, sanitize_path, split_parent};
use crate::tree::{node_at_mut, remove_child, shared_node_at, value_at, value_at_mut};
use crate::types::{NodeInfo, NodeType, Point2D, Point3D, Rgba, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Index entry for one node
///
/// Shares the node with the metadata tree, so a lookup is a single map access.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IndexEntry {
    pub info: Arc<NodeInfo>,
}

impl IndexEntry {
    /// Canonical path in its original case
    pub fn full_path(&self) -> &str {
        &self.info.full_path
    }

    pub fn node_type(&self) -> NodeType {
        self.info.node_type()
    }
}

/// Flat lookup from lower-cased canonical path to node metadata
#[derive(Debug, Default)]
pub(crate) struct PathIndex {
    entries: BTreeMap<String, IndexEntry>,
}

impl PathIndex {
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.get(&index_key(path))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(&index_key(path))
    }

    /// Register or refresh a single node
    fn insert_node(&mut self, node: &Arc<NodeInfo>) {
        self.entries.insert(
            index_key(&node.full_path),
            IndexEntry { info: node.clone() },
        );
    }

    /// Register `node` and all of its descendants
    pub fn insert_tree(&mut self, node: &Arc<NodeInfo>) {
        self.insert_node(node);
        if let Some(contents) = node.contents() {
            for child in contents.values() {
                self.insert_tree(child);
            }
        }
    }

    /// Drop every entry at or below `path` on segment boundaries
    pub fn remove_prefix(&mut self, path: &str) -> usize {
        let prefix = index_key(path);
        let before = self.entries.len();
        self.entries.retain(|key, _| !is_within(key, &prefix));
        before - self.entries.len()
    }

    /// Canonical paths at or below `start`, in key order
    pub fn paths_under(&self, start: &str) -> Vec<String> {
        let prefix = index_key(start);
        self.entries
            .range(prefix.clone()..)
            .take_while(|(key, _)| prefix == "/" || key.starts_with(prefix.as_str()))
            .filter(|(key, _)| is_within(key, &prefix))
            .map(|(_, entry)| entry.full_path().to_string())
            .collect()
    }

    #[cfg(test)]
    pub fn entries(&self) -> impl Iterator<Item = (&str, &IndexEntry)> {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }
}

/// Metadata tree, value tree and path index of one remote server
#[derive(Debug)]
pub(crate) struct Mirror {
    root: Option<Arc<NodeInfo>>,
    values: Value,
    index: PathIndex,
}

impl Default for Mirror {
    fn default() -> Self {
        Self {
            root: None,
            values: Value::empty_container(),
            index: PathIndex::default(),
        }
    }
}

impl Mirror {
    pub fn clear(&mut self) {
        self.root = None;
        self.values = Value::empty_container();
        self.index.clear();
    }

    /// Install freshly parsed trees and rebuild the index by full traversal
    pub fn install(&mut self, node: NodeInfo, value: Value) {
        let root = Arc::new(node);
        self.index.clear();
        self.index.insert_tree(&root);
        self.root = Some(root);
        self.values = value;
    }

    pub fn root(&self) -> Option<&NodeInfo> {
        self.root.as_deref()
    }

    pub fn values(&self) -> &Value {
        &self.values
    }

    pub fn index(&self) -> &PathIndex {
        &self.index
    }

    pub fn value_at(&self, path: &str) -> Option<&Value> {
        value_at(&self.values, path)
    }

    pub fn node_at(&self, path: &str) -> Option<&NodeInfo> {
        self.index.get(path).map(|entry| entry.info.as_ref())
    }

    /// Point the index entries of `path` and its ancestors at the current tree
    ///
    /// Structural patches unshare every node on the way down, so the entries
    /// along that chain would otherwise keep the pre-patch copies.
    fn reindex_chain(&mut self, path: &str) {
        let Some(root) = &self.root else {
            return;
        };
        for level in ancestry(path) {
            if let Some(node) = shared_node_at(root, &level) {
                self.index.insert_node(node);
            }
        }
    }

    /// Resolve value and metadata for `path`
    pub fn lookup(&self, path: &str) -> Result<(Value, NodeInfo)> {
        let path = sanitize_path(path);
        let value = self
            .value_at(&path)
            .ok_or_else(|| OscQueryError::NotFound(format!("no value at {}", path)))?;
        let info = self
            .node_at(&path)
            .ok_or_else(|| OscQueryError::NotFound(format!("no metadata at {}", path)))?;
        Ok((value.clone(), info.clone()))
    }

    /// Apply a binary value update; returns the canonical path that changed
    pub fn apply_osc(&mut self, msg: &OscMessage) -> Result<String> {
        let entry = self.index.get(&msg.address).ok_or_else(|| {
            OscQueryError::NotFound(format!("no metadata for address {}", msg.address))
        })?;
        let path = entry.full_path().to_string();
        let node_type = entry.node_type();
        let new_value = value_from_args(node_type, &msg.args).ok_or_else(|| {
            OscQueryError::MalformedWire(format!(
                "arguments {:?} do not fit {:?} node {}",
                msg.args, node_type, path
            ))
        })?;

        let slot = value_at_mut(&mut self.values, &path)
            .ok_or_else(|| OscQueryError::NotFound(format!("no value slot at {}", path)))?;
        *slot = new_value;
        Ok(path)
    }

    /// Splice a freshly fetched subtree under its parent container
    pub fn add_path(&mut self, path: &str, node: NodeInfo, value: Value) -> Result<()> {
        let path = sanitize_path(path);
        let (parent, name) = split_parent(&path)
            .ok_or_else(|| OscQueryError::InvalidPath("cannot add the root node".to_string()))?;

        let parent_missing = || OscQueryError::NotFound(format!("no container at {}", parent));
        if !self.index.contains(&parent) {
            return Err(parent_missing());
        }
        let parent_values = value_at_mut(&mut self.values, &parent)
            .and_then(Value::as_container_mut)
            .ok_or_else(parent_missing)?;
        let root = self.root.as_mut().ok_or_else(parent_missing)?;
        let parent_info = node_at_mut(root, &parent)
            .and_then(NodeInfo::contents_mut)
            .ok_or_else(parent_missing)?;

        // A re-added path replaces whatever was there, including its subtree
        remove_child(parent_info, &name);
        remove_child(parent_values, &name);

        let node = Arc::new(node);
        parent_info.insert(name.clone(), node.clone());
        parent_values.insert(name, value);

        self.index.remove_prefix(&path);
        self.index.insert_tree(&node);
        self.reindex_chain(&parent);
        Ok(())
    }

    /// Remove a node and its subtree; returns the number of index entries dropped
    pub fn remove_path(&mut self, path: &str) -> Result<usize> {
        let path = sanitize_path(path);
        let (parent, name) = split_parent(&path)
            .ok_or_else(|| OscQueryError::InvalidPath("cannot remove the root node".to_string()))?;

        let removed = self.index.remove_prefix(&path);
        if let Some(contents) = self
            .root
            .as_mut()
            .and_then(|root| node_at_mut(root, &parent))
            .and_then(NodeInfo::contents_mut)
        {
            remove_child(contents, &name);
        }
        if let Some(map) = value_at_mut(&mut self.values, &parent).and_then(Value::as_container_mut)
        {
            remove_child(map, &name);
        }
        self.reindex_chain(&parent);
        Ok(removed)
    }

    /// Move `old` to `new`, installing the subtree fetched from `new`
    pub fn rename_path(&mut self, old: &str, new: &str, node: NodeInfo, value: Value) -> Result<()> {
        let old = sanitize_path(old);
        let new = sanitize_path(new);
        let (new_parent, _) = split_parent(&new)
            .ok_or_else(|| OscQueryError::InvalidPath("cannot rename onto the root node".to_string()))?;
        if !self.index.contains(&new_parent) {
            return Err(OscQueryError::NotFound(format!("no container at {}", new_parent)));
        }

        self.remove_path(&old)?;
        self.add_path(&new, node, value)
    }
}

/// Build the value a node of `node_type` holds after an update with `args`
fn value_from_args(node_type: NodeType, args: &[OscArg]) -> Option<Value> {
    let number = |i: usize| args.get(i).and_then(OscArg::as_f64);
    match node_type {
        NodeType::Integer => number(0).map(|v| Value::Int(v as i64)),
        NodeType::Float => number(0).map(Value::Float),
        NodeType::String => match args.first()? {
            OscArg::String(s) => Some(Value::String(s.clone())),
            OscArg::Char(c) => Some(Value::String(c.to_string())),
            _ => None,
        },
        NodeType::Boolean => match args.first()? {
            OscArg::Bool(b) => Some(Value::Bool(*b)),
            other => other.as_f64().map(|v| Value::Bool(v != 0.0)),
        },
        NodeType::Color => match args.first()? {
            OscArg::Color(c) => Some(Value::Color(*c)),
            OscArg::Int(word) => Some(Value::Color(Rgba::from_packed(*word as u32))),
            _ => None,
        },
        NodeType::Point2D => Some(Value::Point2D(Point2D {
            x: number(0)?,
            y: number(1)?,
        })),
        NodeType::Point3D => Some(Value::Point3D(Point3D {
            x: number(0)?,
            y: number(1)?,
            z: number(2)?,
        })),
        NodeType::Container => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SerializedNode;
    use crate::tree::{node_at, parse_node};
    use serde_json::{json, Value as Json};

    fn parse(json: Json) -> (NodeInfo, Value) {
        let node: SerializedNode = serde_json::from_value(json).unwrap();
        parse_node(&node)
    }

    fn sample() -> Mirror {
        let (node, value) = parse(json!({
            "FULL_PATH": "/",
            "CONTENTS": {
                "a": {
                    "FULL_PATH": "/a",
                    "CONTENTS": {
                        "b": {"FULL_PATH": "/a/b", "TYPE": "f", "VALUE": [0.5]},
                        "bc": {"FULL_PATH": "/a/bc", "TYPE": "i", "VALUE": [1]},
                        "pos": {"FULL_PATH": "/a/pos", "TYPE": "ff", "VALUE": [0, 0]}
                    }
                },
                "ab": {"FULL_PATH": "/ab", "TYPE": "s", "VALUE": ["x"]},
                "Color": {"FULL_PATH": "/Color", "TYPE": "r"}
            }
        }));
        let mut mirror = Mirror::default();
        mirror.install(node, value);
        mirror
    }

    fn assert_prefix_closed(mirror: &Mirror) {
        for (key, _) in mirror.index().entries() {
            for ancestor in crate::path::ancestry(key) {
                assert!(mirror.index().contains(&ancestor), "{ancestor} missing for {key}");
            }
        }
    }

    /// Every index entry agrees with the metadata tree and with the value kind
    fn assert_consistent(mirror: &Mirror) {
        let root = mirror.root().unwrap();
        for (key, entry) in mirror.index().entries() {
            let in_tree = node_at(root, key).unwrap_or_else(|| panic!("{key} not in tree"));
            assert_eq!(entry.info.as_ref(), in_tree, "stale index entry at {key}");
            let value = mirror.value_at(key).unwrap_or_else(|| panic!("no value at {key}"));
            assert!(
                value.matches(entry.node_type()),
                "{key} holds {value:?} for a {:?} node",
                entry.node_type()
            );
        }
    }

    #[test]
    fn index_has_one_entry_per_node() {
        let mirror = sample();
        assert_eq!(mirror.index().len(), 7);
        assert_prefix_closed(&mirror);
        assert_consistent(&mirror);
        assert!(mirror.index().contains("/COLOR"));
    }

    #[test]
    fn empty_mirror_lookup_is_not_found() {
        let mirror = Mirror::default();
        assert!(matches!(mirror.lookup("/x"), Err(OscQueryError::NotFound(_))));
    }

    #[test]
    fn lookup_returns_value_and_info() {
        let mirror = sample();
        let (value, info) = mirror.lookup("a//b").unwrap();
        assert_eq!(value, Value::Float(0.5));
        assert_eq!(info.full_path, "/a/b");
    }

    #[test]
    fn paths_under_respects_segment_boundaries() {
        let mirror = sample();
        let under_a = mirror.index().paths_under("/a");
        assert_eq!(under_a, vec!["/a", "/a/b", "/a/bc", "/a/pos"]);
        assert_eq!(mirror.index().paths_under("/").len(), 7);
    }

    #[test]
    fn osc_update_changes_only_values() {
        let mut mirror = sample();
        let before = mirror.root().cloned();
        let path = mirror
            .apply_osc(&OscMessage::new("/a/pos", vec![OscArg::Float(1.5), OscArg::Float(-2.0)]))
            .unwrap();
        assert_eq!(path, "/a/pos");
        assert_eq!(
            mirror.value_at("/a/pos"),
            Some(&Value::Point2D(Point2D { x: 1.5, y: -2.0 }))
        );
        assert_eq!(mirror.root().cloned(), before);
    }

    #[test]
    fn osc_update_matches_address_case_insensitively() {
        let mut mirror = sample();
        mirror
            .apply_osc(&OscMessage::new("/color", vec![OscArg::Color(Rgba::new(1, 2, 3, 4))]))
            .unwrap();
        assert_eq!(mirror.value_at("/Color"), Some(&Value::Color(Rgba::new(1, 2, 3, 4))));
    }

    #[test]
    fn osc_update_for_unknown_address_fails() {
        let mut mirror = sample();
        let err = mirror.apply_osc(&OscMessage::new("/nope", vec![OscArg::Int(1)]));
        assert!(matches!(err, Err(OscQueryError::NotFound(_))));
    }

    #[test]
    fn remove_path_stops_at_segment_boundary() {
        let mut mirror = sample();
        let removed = mirror.remove_path("/a/b").unwrap();
        assert_eq!(removed, 1);
        assert!(!mirror.index().contains("/a/b"));
        assert!(mirror.index().contains("/a/bc"));
        assert!(mirror.value_at("/a/b").is_none());
        assert_eq!(mirror.value_at("/a/bc"), Some(&Value::Int(1)));
        assert!(mirror.root().and_then(|r| node_at(r, "/a/b")).is_none());
        assert!(mirror
            .node_at("/a")
            .and_then(NodeInfo::contents)
            .is_some_and(|c| !c.contains_key("b")));
        assert_prefix_closed(&mirror);
        assert_consistent(&mirror);
    }

    #[test]
    fn remove_container_drops_subtree() {
        let mut mirror = sample();
        assert_eq!(mirror.remove_path("/a").unwrap(), 4);
        assert!(mirror.index().contains("/ab"));
        assert_eq!(mirror.index().len(), 3);
    }

    #[test]
    fn add_path_splices_into_parent() {
        let mut mirror = sample();
        let (node, value) = parse(json!({"FULL_PATH": "/a/new", "TYPE": "T", "VALUE": [true]}));
        mirror.add_path("/a/new", node, value).unwrap();
        assert_eq!(mirror.value_at("/a/new"), Some(&Value::Bool(true)));
        assert!(mirror.node_at("/a/new").is_some());
        assert!(mirror
            .root()
            .and_then(|r| node_at(r, "/a"))
            .and_then(NodeInfo::contents)
            .is_some_and(|c| c.contains_key("new")));
        assert_prefix_closed(&mirror);
        assert_consistent(&mirror);
    }

    #[test]
    fn add_path_without_parent_is_rejected() {
        let mut mirror = sample();
        let (node, value) = parse(json!({"FULL_PATH": "/zz/new", "TYPE": "i"}));
        assert!(mirror.add_path("/zz/new", node, value).is_err());
        assert!(!mirror.index().contains("/zz/new"));
        assert_prefix_closed(&mirror);
    }

    #[test]
    fn rename_moves_value_and_metadata() {
        let mut mirror = sample();
        let (node, value) = parse(json!({"FULL_PATH": "/b2", "TYPE": "f", "VALUE": [0.75]}));
        mirror.rename_path("/a/b", "/b2", node, value).unwrap();
        assert!(mirror.value_at("/a/b").is_none());
        assert!(!mirror.index().contains("/a/b"));
        assert_eq!(mirror.value_at("/b2"), Some(&Value::Float(0.75)));
        assert_eq!(mirror.node_at("/b2").map(|n| n.node_type()), Some(NodeType::Float));
        assert_prefix_closed(&mirror);
        assert_consistent(&mirror);
    }

    #[test]
    fn index_shares_nodes_with_tree_after_patches() {
        let mut mirror = sample();
        let (node, value) = parse(json!({
            "FULL_PATH": "/a/sub",
            "CONTENTS": {"leaf": {"FULL_PATH": "/a/sub/leaf", "TYPE": "i", "VALUE": [2]}}
        }));
        mirror.add_path("/a/sub", node, value).unwrap();
        mirror.remove_path("/ab").unwrap();

        let root = mirror.root.as_ref().unwrap();
        for path in ["/", "/a", "/a/sub", "/a/sub/leaf"] {
            let in_tree = shared_node_at(root, path).unwrap();
            let indexed = &mirror.index().get(path).unwrap().info;
            assert!(Arc::ptr_eq(in_tree, indexed), "{path} is not shared");
        }
        assert!(mirror
            .node_at("/")
            .and_then(NodeInfo::contents)
            .is_some_and(|c| c.contains_key("a") && !c.contains_key("ab")));
        assert_consistent(&mirror);
    }

    #[test]
    fn color_update_accepts_packed_int() {
        let mut mirror = sample();
        mirror
            .apply_osc(&OscMessage::new("/Color", vec![OscArg::Int(0xFF0000FFu32 as i32)]))
            .unwrap();
        assert_eq!(
            mirror.value_at("/Color").and_then(Value::as_color),
            Some(Rgba::new(255, 0, 0, 255))
        );
        assert_consistent(&mirror);
    }
}
