use crate::client::{ClientOptions, OscQueryClient};
use crate::types::Endpoint;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Shares one client per server endpoint
///
/// Two requests for the same host, port and security flag get the same
/// client; the options of the later request are ignored. Dropping the
/// registry entry and every other handle shuts the client down.
///
/// # Example
///
/// ```no_run
/// use oscquery_client::{ClientOptions, ClientRegistry};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() {
///     let registry = ClientRegistry::new();
///     let a = registry.get(ClientOptions::new("127.0.0.1", 5678));
///     let b = registry.get(ClientOptions::new("127.0.0.1", 5678));
///     assert!(Arc::ptr_eq(&a, &b));
/// }
/// ```
#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<BTreeMap<Endpoint, Arc<OscQueryClient>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn clients(&self) -> MutexGuard<'_, BTreeMap<Endpoint, Arc<OscQueryClient>>> {
        self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Client for the endpoint in `options`, created on first use
    ///
    /// Must be called from within a Tokio runtime.
    pub fn get(&self, options: ClientOptions) -> Arc<OscQueryClient> {
        let mut clients = self.clients();
        if let Some(client) = clients.get(options.endpoint()) {
            tracing::debug!("Reusing existing connection to {}", options.endpoint());
            return client.clone();
        }

        tracing::info!("Creating connection to {}", options.endpoint());
        let endpoint = options.endpoint().clone();
        let client = Arc::new(OscQueryClient::new(options));
        clients.insert(endpoint, client.clone());
        client
    }

    /// Forget the client for `endpoint`
    pub fn remove(&self, endpoint: &Endpoint) -> Option<Arc<OscQueryClient>> {
        self.clients().remove(endpoint)
    }

    pub fn clear(&self) {
        self.clients().clear();
    }

    /// Endpoints with a live client
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.clients().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.clients().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients().is_empty()
    }
}
