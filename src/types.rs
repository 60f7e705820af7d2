use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Access level advertised by a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Access {
    NoValue,
    Read,
    Write,
    #[default]
    ReadWrite,
}

impl Access {
    /// Map the numeric ACCESS code from a discovery descriptor
    pub fn from_wire(code: u64) -> Option<Self> {
        match code {
            0 => Some(Access::NoValue),
            1 => Some(Access::Read),
            2 => Some(Access::Write),
            3 => Some(Access::ReadWrite),
            _ => None,
        }
    }

    pub fn is_readable(self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    pub fn is_writable(self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

/// Numeric range; either bound may be absent on the wire
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Range {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Node type without its metadata payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeType {
    Integer,
    Float,
    String,
    Boolean,
    Color,
    Point2D,
    Point3D,
    Container,
}

/// Kind-specific node metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum NodeKind {
    Integer {
        range: Option<Range>,
    },
    Float {
        range: Option<Range>,
    },
    String {
        /// Allowed values, from `RANGE[0].VALS`
        enum_values: Option<Vec<String>>,
    },
    Boolean,
    Color,
    Point2D {
        x: Option<Range>,
        y: Option<Range>,
    },
    Point3D {
        x: Option<Range>,
        y: Option<Range>,
        z: Option<Range>,
    },
    Container {
        contents: BTreeMap<String, Arc<NodeInfo>>,
    },
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Integer { .. } => NodeType::Integer,
            NodeKind::Float { .. } => NodeType::Float,
            NodeKind::String { .. } => NodeType::String,
            NodeKind::Boolean => NodeType::Boolean,
            NodeKind::Color => NodeType::Color,
            NodeKind::Point2D { .. } => NodeType::Point2D,
            NodeKind::Point3D { .. } => NodeType::Point3D,
            NodeKind::Container { .. } => NodeType::Container,
        }
    }
}

/// Typed metadata for one node of the remote tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeInfo {
    pub description: String,
    /// Canonical full path (original case)
    pub full_path: String,
    pub access: Access,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl NodeInfo {
    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    /// Children of a container node
    pub fn contents(&self) -> Option<&BTreeMap<String, Arc<NodeInfo>>> {
        match &self.kind {
            NodeKind::Container { contents } => Some(contents),
            _ => None,
        }
    }

    pub(crate) fn contents_mut(&mut self) -> Option<&mut BTreeMap<String, Arc<NodeInfo>>> {
        match &mut self.kind {
            NodeKind::Container { contents } => Some(contents),
            _ => None,
        }
    }

    /// Visit this node and every descendant, parents first
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a NodeInfo)) {
        visit(self);
        if let Some(contents) = self.contents() {
            for child in contents.values() {
                child.walk(visit);
            }
        }
    }
}

/// 8-bit RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Decode a packed `0xRRGGBBAA` word
    pub fn from_packed(word: u32) -> Self {
        let [r, g, b, a] = word.to_be_bytes();
        Self { r, g, b, a }
    }

    /// Encode as a packed `0xRRGGBBAA` word
    pub fn to_packed(self) -> u32 {
        u32::from_be_bytes([self.r, self.g, self.b, self.a])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Current value of a node; containers map child names to child values
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Color(Rgba),
    Point2D(Point2D),
    Point3D(Point3D),
    Container(BTreeMap<String, Value>),
}

impl Value {
    pub fn empty_container() -> Self {
        Value::Container(BTreeMap::new())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Rgba> {
        match self {
            Value::Color(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Container(map) => Some(map),
            _ => None,
        }
    }

    pub(crate) fn as_container_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Container(map) => Some(map),
            _ => None,
        }
    }

    /// Whether this value has the shape a node of `node_type` carries
    pub fn matches(&self, node_type: NodeType) -> bool {
        matches!(
            (self, node_type),
            (Value::Int(_), NodeType::Integer)
                | (Value::Float(_), NodeType::Float)
                | (Value::String(_), NodeType::String)
                | (Value::Bool(_), NodeType::Boolean)
                | (Value::Color(_), NodeType::Color)
                | (Value::Point2D(_), NodeType::Point2D)
                | (Value::Point3D(_), NodeType::Point3D)
                | (Value::Container(_), NodeType::Container)
        )
    }
}

/// Synchronization state of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ClientState {
    #[default]
    Idle,
    Syncing,
    Ready,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientState::Idle => "idle",
            ClientState::Syncing => "syncing",
            ClientState::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Address of an OSCQuery server
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Use `wss://` and `https://` instead of `ws://` and `http://`
    pub secure: bool,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, secure: bool) -> Self {
        Self {
            host: host.into(),
            port,
            secure,
        }
    }

    /// URL of the live channel
    pub fn ws_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}:{}/", scheme, self.host, self.port)
    }

    /// Discovery URL for a node path
    pub fn http_url(&self, path: &str) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}{}", scheme, self.host, self.port, path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)?;
        if self.secure {
            f.write_str(" (secure)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_color_layout() {
        let c = Rgba::from_packed(0x11223344);
        assert_eq!(c, Rgba::new(0x11, 0x22, 0x33, 0x44));
        assert_eq!(c.to_packed(), 0x11223344);
    }

    #[test]
    fn endpoint_urls() {
        let plain = Endpoint::new("localhost", 5678, false);
        assert_eq!(plain.ws_url(), "ws://localhost:5678/");
        assert_eq!(plain.http_url("/a/b"), "http://localhost:5678/a/b");

        let secure = Endpoint::new("example.org", 443, true);
        assert_eq!(secure.ws_url(), "wss://example.org:443/");
        assert_eq!(secure.http_url("/"), "https://example.org:443/");
    }

    #[test]
    fn access_codes() {
        assert_eq!(Access::from_wire(1), Some(Access::Read));
        assert_eq!(Access::from_wire(9), None);
        assert!(Access::ReadWrite.is_writable());
        assert!(!Access::Read.is_writable());
        assert!(Access::Read.is_readable());
        assert!(!Access::Write.is_readable());
        assert!(!Access::NoValue.is_readable());
    }

    #[test]
    fn values_match_their_node_type() {
        let red = Value::Color(Rgba::new(255, 0, 0, 255));
        assert!(red.matches(NodeType::Color));
        assert!(!red.matches(NodeType::Integer));
        assert_eq!(red.as_color(), Some(Rgba::new(255, 0, 0, 255)));
        assert_eq!(Value::Int(1).as_color(), None);

        assert!(Value::empty_container().matches(NodeType::Container));
        assert!(Value::Point2D(Point2D::default()).matches(NodeType::Point2D));
        assert!(!Value::Float(1.0).matches(NodeType::Integer));
    }
}
