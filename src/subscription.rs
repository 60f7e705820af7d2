use crate::error::{OscQueryError, Result};
use crate::path::{index_key, is_osc_path, sanitize_path};
use crate::types::{NodeInfo, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Event categories a listener can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Sync,
    Error,
    Log,
    PathAdded,
    PathRemoved,
    PathChanged,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Sync => "sync",
            EventKind::Error => "error",
            EventKind::Log => "log",
            EventKind::PathAdded => "path-added",
            EventKind::PathRemoved => "path-removed",
            EventKind::PathChanged => "path-changed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something a listener is registered against
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// One of the fixed event categories
    Event(EventKind),
    /// Value changes at a path (stored as its lower-cased canonical key)
    Path(String),
}

impl FromStr for Topic {
    type Err = OscQueryError;

    /// Parse `"sync"`, `"path-added"`, ... (case-insensitive) or a path
    /// starting with `/`
    fn from_str(s: &str) -> Result<Self> {
        if s.starts_with('/') {
            let path = sanitize_path(s);
            if !is_osc_path(&path) {
                return Err(OscQueryError::InvalidPath(s.to_string()));
            }
            return Ok(Topic::Path(index_key(&path)));
        }
        let kind = match s.to_ascii_lowercase().as_str() {
            "sync" => EventKind::Sync,
            "error" => EventKind::Error,
            "log" => EventKind::Log,
            "path-added" => EventKind::PathAdded,
            "path-removed" => EventKind::PathRemoved,
            "path-changed" => EventKind::PathChanged,
            _ => return Err(OscQueryError::InvalidPath(s.to_string())),
        };
        Ok(Topic::Event(kind))
    }
}

/// Event delivered to listeners
///
/// Every value carried here is a copy taken at dispatch time; later changes
/// to the mirror never show through it.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Full sync finished
    Sync { node: NodeInfo, value: Value },
    /// Transport, discovery or protocol failure
    Error(Arc<OscQueryError>),
    /// LOG payload forwarded from the server
    Log(serde_json::Value),
    PathAdded {
        path: String,
        node: NodeInfo,
        value: Value,
    },
    PathRemoved { path: String },
    PathChanged { old_path: String, new_path: String },
    /// Value at `path` (or somewhere below it) changed
    ValueChanged { path: String, value: Value },
}

impl ClientEvent {
    /// Category of this event; `None` for per-path value changes
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            ClientEvent::Sync { .. } => Some(EventKind::Sync),
            ClientEvent::Error(_) => Some(EventKind::Error),
            ClientEvent::Log(_) => Some(EventKind::Log),
            ClientEvent::PathAdded { .. } => Some(EventKind::PathAdded),
            ClientEvent::PathRemoved { .. } => Some(EventKind::PathRemoved),
            ClientEvent::PathChanged { .. } => Some(EventKind::PathChanged),
            ClientEvent::ValueChanged { .. } => None,
        }
    }
}

/// Listener callback
pub type Listener = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

/// Handle returned by `on`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

#[derive(Default)]
struct Tables {
    events: HashMap<EventKind, Vec<(ListenerId, Listener)>>,
    paths: HashMap<String, Vec<(ListenerId, Listener)>>,
    topics: HashMap<ListenerId, Topic>,
}

/// Listener registry shared between a client handle and its worker
///
/// Registration is synchronous. Listeners are called with the table
/// unlocked, so a listener may subscribe or unsubscribe from inside its
/// callback.
#[derive(Default)]
pub struct ListenerTable {
    inner: Mutex<Tables>,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add(&self, topic: Topic, listener: Listener) -> ListenerId {
        let id = ListenerId(Uuid::new_v4());
        let mut tables = self.tables();
        match &topic {
            Topic::Event(kind) => tables.events.entry(*kind).or_default().push((id, listener)),
            Topic::Path(key) => tables.paths.entry(key.clone()).or_default().push((id, listener)),
        }
        tables.topics.insert(id, topic);
        id
    }

    /// Unregister a listener; unknown ids are ignored
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut tables = self.tables();
        let Some(topic) = tables.topics.remove(&id) else {
            return false;
        };
        match topic {
            Topic::Event(kind) => {
                if let Some(list) = tables.events.get_mut(&kind) {
                    list.retain(|(lid, _)| *lid != id);
                }
            }
            Topic::Path(key) => {
                if let Some(list) = tables.paths.get_mut(&key) {
                    list.retain(|(lid, _)| *lid != id);
                    if list.is_empty() {
                        tables.paths.remove(&key);
                    }
                }
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.tables().topics.len()
    }

    /// Whether anyone listens for value changes at `path`
    pub fn has_path_listeners(&self, path: &str) -> bool {
        self.tables().paths.contains_key(&index_key(path))
    }

    /// Deliver a categorized event
    pub fn emit(&self, event: &ClientEvent) {
        let Some(kind) = event.kind() else {
            return;
        };
        let listeners: Vec<Listener> = self
            .tables()
            .events
            .get(&kind)
            .map(|list| list.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();
        for listener in listeners {
            listener(event);
        }
    }

    /// Deliver a value change to the listeners registered on `path`
    pub fn emit_path(&self, path: &str, event: &ClientEvent) {
        let listeners: Vec<Listener> = self
            .tables()
            .paths
            .get(&index_key(path))
            .map(|list| list.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();
        for listener in listeners {
            listener(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Listener) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let listener: Listener = Arc::new(move |_: &ClientEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, listener)
    }

    #[test]
    fn topics_parse_categories_and_paths() {
        assert_eq!("SYNC".parse::<Topic>().unwrap(), Topic::Event(EventKind::Sync));
        assert_eq!(
            "path-changed".parse::<Topic>().unwrap(),
            Topic::Event(EventKind::PathChanged)
        );
        assert_eq!(
            "//Layer/Opacity".parse::<Topic>().unwrap(),
            Topic::Path("/layer/opacity".into())
        );
        assert!("bogus".parse::<Topic>().is_err());
        assert!("/a/b$c".parse::<Topic>().is_err());
    }

    #[test]
    fn emit_reaches_only_matching_category() {
        let table = ListenerTable::new();
        let (logs, log_listener) = counter();
        let (syncs, sync_listener) = counter();
        table.add(Topic::Event(EventKind::Log), log_listener);
        table.add(Topic::Event(EventKind::Sync), sync_listener);

        table.emit(&ClientEvent::Log(serde_json::json!("hello")));
        assert_eq!(logs.load(Ordering::SeqCst), 1);
        assert_eq!(syncs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn remove_is_idempotent_and_isolated() {
        let table = ListenerTable::new();
        let (first, l1) = counter();
        let (second, l2) = counter();
        let id1 = table.add(Topic::Path("/a".into()), l1);
        table.add(Topic::Path("/a".into()), l2);

        assert!(table.remove(id1));
        assert!(!table.remove(id1));

        let event = ClientEvent::ValueChanged {
            path: "/a".into(),
            value: Value::Int(1),
        };
        table.emit_path("/A", &event);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert!(table.has_path_listeners("/a"));
    }

    #[test]
    fn listener_may_unsubscribe_itself() {
        let table = Arc::new(ListenerTable::new());
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));
        let (t, s) = (table.clone(), slot.clone());
        let id = table.add(
            Topic::Event(EventKind::Error),
            Arc::new(move |_: &ClientEvent| {
                if let Some(id) = *s.lock().unwrap() {
                    t.remove(id);
                }
            }),
        );
        *slot.lock().unwrap() = Some(id);

        table.emit(&ClientEvent::Error(Arc::new(OscQueryError::ConnectionClosed)));
        assert_eq!(table.len(), 0);
    }
}
