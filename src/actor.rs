//! Single-owner worker behind every client.
//!
//! The worker exclusively owns the [`Mirror`]. Public calls, live-channel
//! frames and connection lifecycle events all arrive through one command
//! queue and are handled one at a time. Discovery fetches are awaited inside
//! the handler, so frames that arrive while a PATH_ADDED or PATH_RENAMED
//! fetch is outstanding stay queued and are applied after the structural
//! change lands.

use crate::client::{NodeValueInfo, SetValueCallback, ValueSetter};
use crate::connection::LiveChannel;
use crate::discovery::NodeFetcher;
use crate::error::{OscQueryError, Result};
use crate::mirror::Mirror;
use crate::osc::decode_message;
use crate::path::{ancestry, is_osc_path, sanitize_path};
use crate::protocol::{ControlCommand, ControlFrame, ServerMessage};
use crate::subscription::{ClientEvent, ListenerTable};
use crate::tree::parse_node;
use crate::types::{ClientState, Endpoint};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::Message;

/// Work item for the client worker
pub(crate) enum Command {
    Sync(oneshot::Sender<Result<()>>),
    Control(ControlCommand, String),
    ControlAll(ControlCommand, String),
    GetNode(String, oneshot::Sender<Result<NodeValueInfo>>),
    ChannelOpened(LiveChannel),
    ChannelFailed(OscQueryError),
    ChannelClosed,
    Frame(Message),
    Shutdown,
}

pub(crate) struct Worker {
    endpoint: Endpoint,
    mirror: Mirror,
    listeners: Arc<ListenerTable>,
    fetcher: Arc<dyn NodeFetcher>,
    set_value: Option<SetValueCallback>,
    channel: Option<LiveChannel>,
    connected: watch::Sender<bool>,
    state: watch::Sender<ClientState>,
}

impl Worker {
    pub fn new(
        endpoint: Endpoint,
        listeners: Arc<ListenerTable>,
        fetcher: Arc<dyn NodeFetcher>,
        set_value: Option<SetValueCallback>,
        connected: watch::Sender<bool>,
        state: watch::Sender<ClientState>,
    ) -> Self {
        Self {
            endpoint,
            mirror: Mirror::default(),
            listeners,
            fetcher,
            set_value,
            channel: None,
            connected,
            state,
        }
    }

    /// Process commands until shutdown or until every sender is gone
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            if !self.handle(command).await {
                break;
            }
        }
        tracing::debug!("Worker for {} stopped", self.endpoint);
    }

    /// Handle one command; returns `false` when the worker should stop
    pub async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Sync(reply) => {
                let _ = reply.send(self.sync().await);
            }
            Command::Control(command, path) => self.control(command, &path),
            Command::ControlAll(command, start) => self.control_all(command, &start),
            Command::GetNode(path, reply) => {
                let _ = reply.send(self.get_node(&path));
            }
            Command::ChannelOpened(channel) => {
                tracing::info!("Connection to OSCQuery server {} established", self.endpoint);
                self.set_channel(Some(channel));
            }
            Command::ChannelFailed(e) => {
                tracing::error!("Live channel to {} failed: {}", self.endpoint, e);
                self.set_channel(None);
                self.emit_error(e);
            }
            Command::ChannelClosed => {
                tracing::info!("Live channel to {} closed", self.endpoint);
                self.set_channel(None);
            }
            Command::Frame(Message::Binary(bytes)) => self.handle_osc(&bytes),
            Command::Frame(Message::Text(text)) => self.handle_text(&text).await,
            Command::Frame(_) => {}
            Command::Shutdown => return false,
        }
        true
    }

    fn set_channel(&mut self, channel: Option<LiveChannel>) {
        self.connected.send_replace(channel.is_some());
        self.channel = channel;
    }

    fn set_state(&self, state: ClientState) {
        self.state.send_replace(state);
    }

    fn emit_error(&self, error: OscQueryError) {
        self.listeners.emit(&ClientEvent::Error(Arc::new(error)));
    }

    async fn sync(&mut self) -> Result<()> {
        self.set_state(ClientState::Syncing);
        self.mirror.clear();

        let descriptor = match self.fetcher.fetch("/").await {
            Ok(descriptor) => descriptor,
            Err(e) => {
                tracing::error!("Sync with {} failed: {}", self.endpoint, e);
                self.set_state(ClientState::Idle);
                self.emit_error(OscQueryError::SyncFailed(e.to_string()));
                return Err(e);
            }
        };

        let (node, value) = parse_node(&descriptor);
        self.mirror.install(node, value);
        tracing::info!(
            "Synced {} node(s) from {}",
            self.mirror.index().len(),
            self.endpoint
        );

        self.set_state(ClientState::Ready);
        if let Some(root) = self.mirror.root() {
            self.listeners.emit(&ClientEvent::Sync {
                node: root.clone(),
                value: self.mirror.values().clone(),
            });
        }
        Ok(())
    }

    fn send_control(&self, command: ControlCommand, path: &str) {
        let Some(channel) = &self.channel else {
            tracing::debug!("Live channel not open, {:?} {} skipped", command, path);
            return;
        };
        match serde_json::to_string(&ControlFrame::new(command, path)) {
            Ok(json) => channel.send_text(json),
            Err(e) => tracing::error!("Failed to encode control frame: {}", e),
        }
    }

    fn control(&self, command: ControlCommand, path: &str) {
        let path = sanitize_path(path);
        if !is_osc_path(&path) {
            self.emit_error(OscQueryError::InvalidPath(path));
            return;
        }
        self.send_control(command, &path);
    }

    fn control_all(&self, command: ControlCommand, start: &str) {
        for path in self.mirror.index().paths_under(start) {
            self.send_control(command, &path);
        }
    }

    fn get_node(&self, path: &str) -> Result<NodeValueInfo> {
        let (value, info) = self.mirror.lookup(path)?;
        let setter = ValueSetter::new(
            info.full_path.clone(),
            self.set_value.clone(),
            self.channel.as_ref().map(|c| c.handle().clone()),
        );
        Ok(NodeValueInfo {
            value,
            info,
            setter,
        })
    }

    /// Fire value-change listeners for the root, every ancestor and `path`
    fn notify_value_chain(&self, path: &str) {
        for level in ancestry(path) {
            if !self.listeners.has_path_listeners(&level) {
                continue;
            }
            let Some(value) = self.mirror.value_at(&level) else {
                continue;
            };
            let display = self
                .mirror
                .index()
                .get(&level)
                .map(|entry| entry.full_path().to_string())
                .unwrap_or(level);
            let event = ClientEvent::ValueChanged {
                path: display.clone(),
                value: value.clone(),
            };
            self.listeners.emit_path(&display, &event);
        }
    }

    fn handle_osc(&mut self, bytes: &[u8]) {
        let msg = match decode_message(bytes) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!("Invalid OSC message received, skipping: {}", e);
                return;
            }
        };
        tracing::debug!("OSC {} {:?}", msg.address, msg.args);

        match self.mirror.apply_osc(&msg) {
            Ok(path) => self.notify_value_chain(&path),
            Err(e) => tracing::warn!("Dropping update for {}: {}", msg.address, e),
        }
    }

    async fn handle_text(&mut self, text: &str) {
        tracing::debug!("Received: {}", text);
        let message = match serde_json::from_str::<ServerMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Unexpected message {}: {}", text, e);
                return;
            }
        };

        let result = match message {
            ServerMessage::PathAdded(path) => self.path_added(&path).await,
            ServerMessage::PathRemoved(path) => self.path_removed(&path),
            ServerMessage::PathRenamed(data) => self.path_renamed(&data.old, &data.new).await,
            ServerMessage::Log(data) => {
                self.listeners.emit(&ClientEvent::Log(data));
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::warn!("Structural update failed: {}", e);
            self.emit_error(e);
        }
    }

    fn checked_path(path: &str) -> Result<String> {
        let path = sanitize_path(path);
        if is_osc_path(&path) {
            Ok(path)
        } else {
            Err(OscQueryError::InvalidPath(path))
        }
    }

    async fn path_added(&mut self, path: &str) -> Result<()> {
        let path = Self::checked_path(path)?;
        let descriptor = self.fetcher.fetch(&path).await?;
        let (node, value) = parse_node(&descriptor);

        self.mirror.add_path(&path, node.clone(), value.clone())?;
        tracing::info!("Path added: {}", path);

        self.listeners.emit(&ClientEvent::PathAdded {
            path: path.clone(),
            node,
            value,
        });
        self.notify_value_chain(&path);
        Ok(())
    }

    fn path_removed(&mut self, path: &str) -> Result<()> {
        let path = Self::checked_path(path)?;
        let removed = self.mirror.remove_path(&path)?;
        tracing::info!("Path removed: {} ({} node(s))", path, removed);

        self.listeners.emit(&ClientEvent::PathRemoved { path: path.clone() });
        self.notify_value_chain(&path);
        Ok(())
    }

    async fn path_renamed(&mut self, old: &str, new: &str) -> Result<()> {
        let old = Self::checked_path(old)?;
        let new = Self::checked_path(new)?;
        let descriptor = self.fetcher.fetch(&new).await?;
        let (node, value) = parse_node(&descriptor);

        self.mirror.rename_path(&old, &new, node, value)?;
        tracing::info!("Path renamed: {} -> {}", old, new);

        self.listeners.emit(&ClientEvent::PathChanged {
            old_path: old,
            new_path: new.clone(),
        });
        self.notify_value_chain(&new);
        Ok(())
    }
}
