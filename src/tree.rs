//! Descriptor parsing and tree navigation.
//!
//! A discovery descriptor is turned into two parallel trees with the same
//! shape: [`NodeInfo`] (metadata, replaced wholesale on structural change)
//! and [`Value`] (current values, patched in place by live updates).
//!
//! Color decision: a Color node's `VALUE[0]` is read as a packed 32-bit
//! integer `0xRRGGBBAA`, the same layout the OSC `r` tag uses. Other encodings
//! decode to transparent black.

use crate::path::{sanitize_path, segments};
use crate::protocol::{SerializedNode, SerializedRange};
use crate::types::{Access, NodeInfo, NodeKind, Point2D, Point3D, Range, Rgba, Value};
use serde::Deserialize;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::sync::Arc;

fn to_range(range: Option<&SerializedRange>) -> Option<Range> {
    range.map(|r| Range {
        min: r.min,
        max: r.max,
    })
}

fn enum_values(range: Option<&SerializedRange>) -> Option<Vec<String>> {
    let vals = range?.vals.as_ref()?;
    Some(
        vals.iter()
            .map(|v| match v {
                Json::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
    )
}

fn json_f64(value: Option<&Json>) -> f64 {
    value.and_then(Json::as_f64).unwrap_or(0.0)
}

fn json_i64(value: Option<&Json>) -> i64 {
    value
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(0)
}

fn json_bool(value: Option<&Json>) -> bool {
    match value {
        Some(Json::Bool(b)) => *b,
        Some(Json::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

fn access_code(code: &Json) -> Option<u64> {
    code.as_u64().or_else(|| {
        code.as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0)
            .map(|f| f as u64)
    })
}

fn json_color(value: Option<&Json>, path: &str) -> Rgba {
    match value {
        None | Some(Json::Null) => Rgba::default(),
        // Servers typing the word as an OSC int send it signed
        Some(v) => match v.as_i64().or_else(|| v.as_u64().map(|w| w as i64)) {
            Some(word) => Rgba::from_packed(word as u32),
            None => {
                tracing::warn!("Color value at {} is not a packed integer: {}", path, v);
                Rgba::default()
            }
        },
    }
}

/// Parse a discovery descriptor into metadata and value trees
///
/// CONTENTS makes a node a container regardless of its TYPE tag. An
/// unrecognized TYPE without CONTENTS yields an empty container.
pub fn parse_node(node: &SerializedNode) -> (NodeInfo, Value) {
    let full_path = sanitize_path(&node.full_path);
    let access = match &node.access {
        None | Some(Json::Null) => Access::ReadWrite,
        Some(code) => access_code(code)
            .and_then(Access::from_wire)
            .unwrap_or_else(|| {
                tracing::warn!("Unknown ACCESS {} at {}, assuming read/write", code, full_path);
                Access::ReadWrite
            }),
    };

    let values = node.value.as_deref().unwrap_or(&[]);
    let ranges = node.range.as_deref().unwrap_or(&[]);
    let range_at = |i: usize| ranges.get(i).and_then(Option::as_ref);

    let (kind, value) = match (&node.contents, node.type_tag.as_deref()) {
        (None, Some("i")) => (
            NodeKind::Integer {
                range: to_range(range_at(0)),
            },
            Value::Int(json_i64(values.first())),
        ),
        (None, Some("f")) => (
            NodeKind::Float {
                range: to_range(range_at(0)),
            },
            Value::Float(json_f64(values.first())),
        ),
        (None, Some("s")) => (
            NodeKind::String {
                enum_values: enum_values(range_at(0)),
            },
            Value::String(
                values
                    .first()
                    .and_then(Json::as_str)
                    .unwrap_or_default()
                    .to_string(),
            ),
        ),
        (None, Some("T" | "F")) => (NodeKind::Boolean, Value::Bool(json_bool(values.first()))),
        (None, Some("r")) => (
            NodeKind::Color,
            Value::Color(json_color(values.first(), &full_path)),
        ),
        (None, Some("ff")) => (
            NodeKind::Point2D {
                x: to_range(range_at(0)),
                y: to_range(range_at(1)),
            },
            Value::Point2D(Point2D {
                x: json_f64(values.first()),
                y: json_f64(values.get(1)),
            }),
        ),
        (None, Some("fff")) => (
            NodeKind::Point3D {
                x: to_range(range_at(0)),
                y: to_range(range_at(1)),
                z: to_range(range_at(2)),
            },
            Value::Point3D(Point3D {
                x: json_f64(values.first()),
                y: json_f64(values.get(1)),
                z: json_f64(values.get(2)),
            }),
        ),
        (contents, tag) => {
            if contents.is_none() {
                tracing::debug!("Node {} has type {:?}, treating as container", full_path, tag);
            }
            let mut infos = BTreeMap::new();
            let mut children = BTreeMap::new();
            for (name, raw) in contents.iter().flatten() {
                let child = match SerializedNode::deserialize(raw) {
                    Ok(child) => child,
                    Err(e) => {
                        tracing::warn!("Skipping malformed child {:?} of {}: {}", name, full_path, e);
                        continue;
                    }
                };
                let (info, value) = parse_node(&child);
                // Child keys follow the same space rule as canonical paths
                let name = name.replace(' ', "_");
                infos.insert(name.clone(), Arc::new(info));
                children.insert(name, value);
            }
            (
                NodeKind::Container { contents: infos },
                Value::Container(children),
            )
        }
    };

    let info = NodeInfo {
        description: node.description.clone().unwrap_or_default(),
        full_path,
        access,
        kind,
    };
    (info, value)
}

/// Look up a child by name, falling back to a case-insensitive match
fn child_key<'a, T>(map: &'a BTreeMap<String, T>, name: &str) -> Option<&'a String> {
    if let Some((key, _)) = map.get_key_value(name) {
        return Some(key);
    }
    map.keys().find(|k| k.eq_ignore_ascii_case(name))
}

/// Resolve the value at `path` by walking the value tree segment by segment
pub fn value_at<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path).try_fold(root, |current, segment| {
        let map = current.as_container()?;
        map.get(child_key(map, segment)?)
    })
}

pub(crate) fn value_at_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in segments(path) {
        let map = current.as_container_mut()?;
        let key = child_key(map, segment)?.clone();
        current = map.get_mut(&key)?;
    }
    Some(current)
}

/// Resolve the metadata node at `path` by walking container contents
pub fn node_at<'a>(root: &'a NodeInfo, path: &str) -> Option<&'a NodeInfo> {
    segments(path).try_fold(root, |current, segment| {
        let contents = current.contents()?;
        contents.get(child_key(contents, segment)?).map(Arc::as_ref)
    })
}

/// Like [`node_at`], returning the shared handle of the node
pub(crate) fn shared_node_at<'a>(root: &'a Arc<NodeInfo>, path: &str) -> Option<&'a Arc<NodeInfo>> {
    segments(path).try_fold(root, |current, segment| {
        let contents = current.contents()?;
        contents.get(child_key(contents, segment)?)
    })
}

/// Mutable access to the node at `path`, unsharing every node on the way
pub(crate) fn node_at_mut<'a>(root: &'a mut Arc<NodeInfo>, path: &str) -> Option<&'a mut NodeInfo> {
    let mut current = Arc::make_mut(root);
    for segment in segments(path) {
        let contents = current.contents_mut()?;
        let key = child_key(contents, segment)?.clone();
        current = Arc::make_mut(contents.get_mut(&key)?);
    }
    Some(current)
}

/// Remove `name` from a container map, matching case-insensitively
pub(crate) fn remove_child<T>(map: &mut BTreeMap<String, T>, name: &str) -> Option<T> {
    let key = child_key(map, name)?.clone();
    map.remove(&key)
}
