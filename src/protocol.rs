use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Read an optional field, keeping `None` when the JSON does not fit `T`
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Value::deserialize(deserializer)?;
    if raw.is_null() {
        return Ok(None);
    }
    match T::deserialize(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!("Ignoring malformed descriptor field {}: {}", raw, e);
            Ok(None)
        }
    }
}

/// Node descriptor returned by an OSCQuery discovery request
///
/// Fields that do not have the expected shape are dropped with a warning
/// rather than failing the whole descriptor. Children stay raw JSON and are
/// decoded one by one, so a malformed child only loses its own subtree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedNode {
    #[serde(
        rename = "DESCRIPTION",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(rename = "FULL_PATH")]
    pub full_path: String,
    #[serde(
        rename = "TYPE",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub type_tag: Option<String>,
    /// Numeric access code; kept raw because servers send ints or floats
    #[serde(rename = "ACCESS", default, skip_serializing_if = "Option::is_none")]
    pub access: Option<Value>,
    #[serde(
        rename = "CONTENTS",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub contents: Option<BTreeMap<String, Value>>,
    #[serde(
        rename = "VALUE",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Vec<Value>>,
    #[serde(
        rename = "RANGE",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub range: Option<Vec<Option<SerializedRange>>>,
}

/// One RANGE entry of a node descriptor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerializedRange {
    #[serde(
        rename = "MIN",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub min: Option<f64>,
    #[serde(
        rename = "MAX",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub max: Option<f64>,
    #[serde(
        rename = "VALS",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub vals: Option<Vec<Value>>,
}

/// DATA of a PATH_RENAMED notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenameData {
    #[serde(rename = "OLD")]
    pub old: String,
    #[serde(rename = "NEW")]
    pub new: String,
}

/// JSON notification received on the live channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "COMMAND", content = "DATA")]
pub enum ServerMessage {
    #[serde(rename = "PATH_ADDED")]
    PathAdded(String),
    #[serde(rename = "PATH_REMOVED")]
    PathRemoved(String),
    #[serde(rename = "PATH_RENAMED")]
    PathRenamed(RenameData),
    #[serde(rename = "LOG")]
    Log(Value),
}

/// Control commands sent to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlCommand {
    Listen,
    Ignore,
}

/// Outbound control frame, e.g. `{"COMMAND":"LISTEN","DATA":"/a/b"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlFrame {
    #[serde(rename = "COMMAND")]
    pub command: ControlCommand,
    #[serde(rename = "DATA")]
    pub data: String,
}

impl ControlFrame {
    pub fn new(command: ControlCommand, path: impl Into<String>) -> Self {
        Self {
            command,
            data: path.into(),
        }
    }
}
