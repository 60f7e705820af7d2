use crate::actor::{Command, Worker};
use crate::connection::{LiveChannel, TransportHandle};
use crate::discovery::{HttpFetcher, NodeFetcher};
use crate::error::{OscQueryError, Result};
use crate::protocol::ControlCommand;
use crate::subscription::{ClientEvent, Listener, ListenerId, ListenerTable, Topic};
use crate::types::{ClientState, Endpoint, NodeInfo, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

/// Host write hook: receives the node path, the new value and the live
/// channel when it is open
pub type SetValueCallback = Arc<dyn Fn(&str, &Value, Option<&TransportHandle>) + Send + Sync>;

/// Connection settings for one OSCQuery server
#[derive(Clone)]
pub struct ClientOptions {
    endpoint: Endpoint,
    set_value: Option<SetValueCallback>,
    fetcher: Option<Arc<dyn NodeFetcher>>,
}

impl ClientOptions {
    /// Plain `ws://` / `http://` connection to `host:port`
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            endpoint: Endpoint::new(host, port, false),
            set_value: None,
            fetcher: None,
        }
    }

    /// Switch to `wss://` / `https://`
    pub fn secure(mut self, secure: bool) -> Self {
        self.endpoint.secure = secure;
        self
    }

    /// Install the callback used by [`ValueSetter::set`]
    pub fn with_set_value(
        mut self,
        callback: impl Fn(&str, &Value, Option<&TransportHandle>) + Send + Sync + 'static,
    ) -> Self {
        self.set_value = Some(Arc::new(callback));
        self
    }

    /// Replace HTTP discovery with another descriptor source
    pub fn with_fetcher(mut self, fetcher: Arc<dyn NodeFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("endpoint", &self.endpoint)
            .field("set_value", &self.set_value.is_some())
            .field("custom_fetcher", &self.fetcher.is_some())
            .finish()
    }
}

/// Write hook bound to one node path
#[derive(Clone)]
pub struct ValueSetter {
    path: String,
    callback: Option<SetValueCallback>,
    transport: Option<TransportHandle>,
}

impl ValueSetter {
    pub(crate) fn new(
        path: String,
        callback: Option<SetValueCallback>,
        transport: Option<TransportHandle>,
    ) -> Self {
        Self {
            path,
            callback,
            transport,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Hand `value` to the host write callback
    ///
    /// The mirror is not touched; the new value shows up once the server
    /// echoes it back.
    pub fn set(&self, value: Value) -> Result<()> {
        let callback = self.callback.as_ref().ok_or_else(|| {
            OscQueryError::Configuration(format!("no set-value callback for {}", self.path))
        })?;
        callback(&self.path, &value, self.transport.as_ref());
        Ok(())
    }
}

impl fmt::Debug for ValueSetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueSetter")
            .field("path", &self.path)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Snapshot of one node returned by [`OscQueryClient::get_node`]
#[derive(Debug, Clone)]
pub struct NodeValueInfo {
    pub value: Value,
    pub info: NodeInfo,
    pub setter: ValueSetter,
}

/// Client for one OSCQuery server
///
/// The client mirrors the server's namespace: [`sync_data`](Self::sync_data)
/// fetches the full tree over HTTP, and the WebSocket live channel keeps it
/// current afterwards. All mutation happens on a background worker task.
pub struct OscQueryClient {
    endpoint: Endpoint,
    tx: mpsc::UnboundedSender<Command>,
    listeners: Arc<ListenerTable>,
    state: watch::Receiver<ClientState>,
    connected: watch::Receiver<bool>,
}

impl OscQueryClient {
    /// Create a client and start opening its live channel
    ///
    /// Must be called from within a Tokio runtime. The client starts out
    /// `Idle`; call [`sync_data`](Self::sync_data) to load the tree.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use oscquery_client::{ClientOptions, OscQueryClient};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = OscQueryClient::new(ClientOptions::new("127.0.0.1", 5678));
    ///     client.sync_data().await?;
    ///     let node = client.get_node("/layer/opacity").await?;
    ///     println!("{:?}", node.value);
    ///     Ok(())
    /// }
    /// ```
    pub fn new(options: ClientOptions) -> Self {
        let ClientOptions {
            endpoint,
            set_value,
            fetcher,
        } = options;
        let fetcher =
            fetcher.unwrap_or_else(|| Arc::new(HttpFetcher::new(endpoint.clone())) as Arc<dyn NodeFetcher>);

        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ClientState::Idle);
        let listeners = Arc::new(ListenerTable::new());
        let (connected_tx, connected) = watch::channel(false);

        let worker = Worker::new(
            endpoint.clone(),
            listeners.clone(),
            fetcher,
            set_value,
            connected_tx,
            state_tx,
        );
        tokio::spawn(worker.run(rx));

        // Open the live channel without blocking construction
        let url = endpoint.ws_url();
        let connect_tx = tx.clone();
        tokio::spawn(async move {
            let command = match LiveChannel::connect(&url, connect_tx.clone()).await {
                Ok(channel) => Command::ChannelOpened(channel),
                Err(e) => Command::ChannelFailed(e),
            };
            let _ = connect_tx.send(command);
        });

        Self {
            endpoint,
            tx,
            listeners,
            state,
            connected,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Current synchronization state
    pub fn state(&self) -> ClientState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn state_changes(&self) -> watch::Receiver<ClientState> {
        self.state.clone()
    }

    /// Whether the live channel is open
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Watch the live channel opening and closing
    pub fn connection_changes(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| OscQueryError::ChannelError("client worker stopped".to_string()))
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<Result<T>>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(build(reply_tx))?;
        reply_rx
            .await
            .map_err(|_| OscQueryError::ChannelError("client worker dropped the request".to_string()))?
    }

    /// Fetch the whole namespace and replace both trees
    ///
    /// On success the state is `Ready` and a `sync` event has fired. On
    /// failure the state returns to `Idle` and an `error` event fires.
    pub async fn sync_data(&self) -> Result<()> {
        self.request(Command::Sync).await
    }

    /// Ask the server to stream value updates for `path`
    pub fn listen(&self, path: &str) -> Result<()> {
        self.send(Command::Control(ControlCommand::Listen, path.to_string()))
    }

    /// Stop value updates for `path`
    pub fn ignore(&self, path: &str) -> Result<()> {
        self.send(Command::Control(ControlCommand::Ignore, path.to_string()))
    }

    /// `listen` to every known path at or below `start`
    pub fn listen_all(&self, start: &str) -> Result<()> {
        self.send(Command::ControlAll(ControlCommand::Listen, start.to_string()))
    }

    /// `ignore` every known path at or below `start`
    pub fn ignore_all(&self, start: &str) -> Result<()> {
        self.send(Command::ControlAll(ControlCommand::Ignore, start.to_string()))
    }

    /// Value, metadata and write hook for `path`
    pub async fn get_node(&self, path: &str) -> Result<NodeValueInfo> {
        let path = path.to_string();
        self.request(|reply| Command::GetNode(path, reply)).await
    }

    /// Register a listener
    ///
    /// `topic` is an event category (`sync`, `error`, `log`, `path-added`,
    /// `path-removed`, `path-changed`) or a path starting with `/` to receive
    /// value changes at or below that node.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use oscquery_client::{ClientEvent, ClientOptions, OscQueryClient};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = OscQueryClient::new(ClientOptions::new("127.0.0.1", 5678));
    ///     let id = client.on("/layer", |event: &ClientEvent| {
    ///         if let ClientEvent::ValueChanged { path, value } = event {
    ///             println!("{} = {:?}", path, value);
    ///         }
    ///     })?;
    ///     client.sync_data().await?;
    ///     client.listen_all("/layer")?;
    ///     client.off(id);
    ///     Ok(())
    /// }
    /// ```
    pub fn on(
        &self,
        topic: &str,
        listener: impl Fn(&ClientEvent) + Send + Sync + 'static,
    ) -> Result<ListenerId> {
        let topic = match topic.parse::<Topic>() {
            Ok(topic) => topic,
            Err(e) => {
                tracing::warn!("Rejected listener topic {:?}: {}", topic, e);
                self.listeners
                    .emit(&ClientEvent::Error(Arc::new(OscQueryError::InvalidPath(
                        topic.to_string(),
                    ))));
                return Err(e);
            }
        };
        let listener: Listener = Arc::new(listener);
        Ok(self.listeners.add(topic, listener))
    }

    /// Unregister a listener; unknown ids are ignored
    pub fn off(&self, id: ListenerId) {
        self.listeners.remove(id);
    }
}

impl fmt::Debug for OscQueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OscQueryClient")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Drop for OscQueryClient {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn options_build_endpoint() {
        let options = ClientOptions::new("example.local", 8080).secure(true);
        assert_eq!(options.endpoint(), &Endpoint::new("example.local", 8080, true));
        assert_eq!(options.endpoint().ws_url(), "wss://example.local:8080/");
    }

    #[test]
    fn setter_calls_host_callback_with_path() {
        let seen: Arc<Mutex<Vec<(String, Value, bool)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: SetValueCallback = Arc::new(move |path: &str, value: &Value, transport: Option<&TransportHandle>| {
            sink.lock()
                .unwrap()
                .push((path.to_string(), value.clone(), transport.is_some()));
        });
        let setter = ValueSetter::new("/a/b".into(), Some(callback), None);

        setter.set(Value::Int(3)).unwrap();
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[("/a/b".to_string(), Value::Int(3), false)]
        );
    }

    #[test]
    fn setter_without_callback_fails() {
        let setter = ValueSetter::new("/x".into(), None, None);
        assert_eq!(setter.path(), "/x");
        assert!(matches!(
            setter.set(Value::Bool(true)),
            Err(OscQueryError::Configuration(_))
        ));
    }
}
