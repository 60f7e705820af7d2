use crate::actor::Command;
use crate::error::{OscQueryError, Result};
use crate::osc::{encode_message, OscMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Sending side of the live channel, handed to the host write callback
#[derive(Debug, Clone)]
pub struct TransportHandle {
    ws_tx: mpsc::UnboundedSender<Message>,
}

impl TransportHandle {
    pub(crate) fn new(ws_tx: mpsc::UnboundedSender<Message>) -> Self {
        Self { ws_tx }
    }

    /// Send a text frame
    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.ws_tx
            .send(Message::Text(text.into()))
            .map_err(|_| OscQueryError::ConnectionClosed)
    }

    /// Send a binary frame
    pub fn send_binary(&self, bytes: Vec<u8>) -> Result<()> {
        self.ws_tx
            .send(Message::Binary(bytes))
            .map_err(|_| OscQueryError::ConnectionClosed)
    }

    /// Encode and send an OSC message as a binary frame
    pub fn send_osc(&self, msg: &OscMessage) -> Result<()> {
        self.send_binary(encode_message(msg))
    }

    pub fn is_closed(&self) -> bool {
        self.ws_tx.is_closed()
    }
}

/// Open WebSocket live channel
///
/// Incoming frames are forwarded to the client worker as commands so that
/// they are applied in order with everything else the worker does.
pub(crate) struct LiveChannel {
    handle: TransportHandle,
    reader: Option<JoinHandle<()>>,
}

impl LiveChannel {
    /// Connect to a WebSocket URL and start forwarding frames to `worker_tx`
    pub async fn connect(url: &str, worker_tx: mpsc::UnboundedSender<Command>) -> Result<Self> {
        tracing::info!("Connecting to {}", url);

        let (ws_stream, _) = connect_async(url).await?;
        let (mut write, mut read) = ws_stream.split();

        let (ws_tx, mut ws_rx) = mpsc::unbounded_channel::<Message>();

        // Spawn task to forward outgoing messages to WebSocket
        tokio::spawn(async move {
            while let Some(msg) = ws_rx.recv().await {
                if let Err(e) = write.send(msg).await {
                    tracing::error!("Failed to send message: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
        });

        // Spawn task to receive incoming frames
        let reader = tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                match msg_result {
                    Ok(msg @ (Message::Text(_) | Message::Binary(_))) => {
                        if worker_tx.send(Command::Frame(msg)).is_err() {
                            return;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        tracing::info!("WebSocket connection closed");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("WebSocket error: {}", e);
                        let _ = worker_tx.send(Command::ChannelFailed(e.into()));
                        return;
                    }
                    _ => {}
                }
            }
            let _ = worker_tx.send(Command::ChannelClosed);
        });

        Ok(Self {
            handle: TransportHandle::new(ws_tx),
            reader: Some(reader),
        })
    }

    /// Channel backed by a plain queue instead of a socket
    #[cfg(test)]
    pub fn detached(ws_tx: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            handle: TransportHandle::new(ws_tx),
            reader: None,
        }
    }

    pub fn handle(&self) -> &TransportHandle {
        &self.handle
    }

    /// Queue a text frame; a closed channel is not an error here
    pub fn send_text(&self, text: String) {
        tracing::debug!("Sending: {}", text);
        if self.handle.send_text(text).is_err() {
            tracing::debug!("Live channel already closed, frame dropped");
        }
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
