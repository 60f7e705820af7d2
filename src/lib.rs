//! Rust client library for OSCQuery servers
//!
//! OSCQuery servers publish a tree of typed parameters over HTTP and stream
//! value changes over a WebSocket as binary OSC messages. This library keeps
//! a local mirror of that tree in sync. It supports:
//!
//! - Full namespace sync over HTTP
//! - Live value updates decoded from OSC binary frames
//! - Structural updates (paths added, removed and renamed)
//! - LISTEN / IGNORE control for single paths or whole subtrees
//! - Listeners for lifecycle events and per-path value changes
//! - One shared client per server through [`ClientRegistry`]
//!
//! # Quick Start
//!
//! ```no_run
//! use oscquery_client::{ClientEvent, ClientOptions, ClientRegistry, Value};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ClientRegistry::new();
//!     let client = registry.get(ClientOptions::new("127.0.0.1", 5678));
//!
//!     // Load the namespace
//!     client.sync_data().await?;
//!
//!     // Watch one subtree
//!     client.on("/layer", |event: &ClientEvent| {
//!         if let ClientEvent::ValueChanged { path, value } = event {
//!             println!("{} changed: {:?}", path, value);
//!         }
//!     })?;
//!     client.listen_all("/layer")?;
//!
//!     // Read a node and write it back through the host callback
//!     let node = client.get_node("/layer/opacity").await?;
//!     println!("{} = {:?}", node.info.full_path, node.value);
//!     let _ = node.setter.set(Value::Float(0.5));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Writing Values
//!
//! The library never sends values on its own. Hosts install a callback that
//! decides how a write reaches the server:
//!
//! ```no_run
//! use oscquery_client::{ClientOptions, OscArg, OscMessage, OscQueryClient, Value};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ClientOptions::new("127.0.0.1", 5678).with_set_value(|path, value, transport| {
//!         if let (Some(transport), Value::Float(v)) = (transport, value) {
//!             let _ = transport.send_osc(&OscMessage::new(path, vec![OscArg::Float(*v as f32)]));
//!         }
//!     });
//!     let client = OscQueryClient::new(options);
//!     client.sync_data().await?;
//!     client.get_node("/layer/opacity").await?.setter.set(Value::Float(0.25))?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The library is organized into several layers:
//!
//! - **Registry**: one shared client per endpoint
//! - **Client**: public handle, listener registration and request forwarding
//! - **Worker**: single task owning the mirror; applies syncs, frames and patches in order
//! - **Mirror**: metadata tree, value tree and flat path index
//! - **Discovery**: HTTP descriptor fetches behind the `NodeFetcher` trait
//! - **Connection**: WebSocket live channel
//! - **OSC**: binary message codec
//! - **Protocol**: JSON message structures
//! - **Types**: Domain types and data structures

mod actor;
mod client;
mod connection;
mod discovery;
mod error;
mod mirror;
mod osc;
mod path;
mod protocol;
mod registry;
mod subscription;
mod tree;
mod types;

// Public exports
pub use client::{ClientOptions, NodeValueInfo, OscQueryClient, SetValueCallback, ValueSetter};
pub use connection::TransportHandle;
pub use discovery::{HttpFetcher, NodeFetcher, StaticFetcher};
pub use error::{OscQueryError, Result};
pub use osc::{decode_message, encode_message, OscArg, OscMessage};
pub use path::{index_key, is_osc_path, sanitize_path};
pub use protocol::{ControlCommand, ControlFrame, RenameData, SerializedNode, SerializedRange, ServerMessage};
pub use registry::ClientRegistry;
pub use subscription::{ClientEvent, EventKind, Listener, ListenerId, Topic};
pub use tree::{node_at, parse_node, value_at};
pub use types::{
    Access, ClientState, Endpoint, NodeInfo, NodeKind, NodeType, Point2D, Point3D, Range, Rgba,
    Value,
};
