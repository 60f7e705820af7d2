use thiserror::Error;

/// Result type for OSCQuery operations
pub type Result<T> = std::result::Result<T, OscQueryError>;

/// Errors that can occur when talking to an OSCQuery server
#[derive(Error, Debug)]
pub enum OscQueryError {
    /// WebSocket connection error on the live channel
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// HTTP error during a discovery fetch
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Live channel was closed or never opened
    #[error("Connection closed")]
    ConnectionClosed,

    /// Binary frame is not a well-formed OSC message
    #[error("Malformed OSC message: {0}")]
    MalformedWire(String),

    /// No value or no metadata at the requested path
    #[error("Not found: {0}")]
    NotFound(String),

    /// Path does not follow the OSC address grammar
    #[error("Invalid OSC path: {0}")]
    InvalidPath(String),

    /// Operation needs host configuration that was not supplied
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Full sync could not fetch or parse the root descriptor
    #[error("Sync failed: {0}")]
    SyncFailed(String),

    /// Internal worker channel error
    #[error("Channel error: {0}")]
    ChannelError(String),
}
