use crate::error::{OscQueryError, Result};
use crate::path::{sanitize_path, segments};
use crate::protocol::SerializedNode;
use crate::types::Endpoint;
use async_trait::async_trait;
use std::sync::Mutex;

/// Source of node descriptors for a client
///
/// The client asks for `/` on a full sync and for individual paths when the
/// server announces PATH_ADDED or PATH_RENAMED.
#[async_trait]
pub trait NodeFetcher: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<SerializedNode>;
}

/// Fetches descriptors with `GET {scheme}://{host}:{port}{path}`
///
/// No timeout and no retry; a failed request surfaces as an error.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    endpoint: Endpoint,
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            http: reqwest::Client::new(),
        }
    }

    /// Use a preconfigured HTTP client (proxies, TLS roots, ...)
    pub fn with_client(endpoint: Endpoint, http: reqwest::Client) -> Self {
        Self { endpoint, http }
    }
}

#[async_trait]
impl NodeFetcher for HttpFetcher {
    async fn fetch(&self, path: &str) -> Result<SerializedNode> {
        let url = self.endpoint.http_url(&sanitize_path(path));
        tracing::debug!("Fetching {}", url);

        let node = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<SerializedNode>()
            .await?;
        Ok(node)
    }
}

/// Serves descriptors out of an in-memory namespace document
///
/// Useful for replaying a saved namespace dump and for driving a client
/// without a server.
#[derive(Debug)]
pub struct StaticFetcher {
    root: Mutex<serde_json::Value>,
}

impl StaticFetcher {
    pub fn new(root: serde_json::Value) -> Self {
        Self {
            root: Mutex::new(root),
        }
    }

    /// Swap in a new namespace document
    pub fn replace(&self, root: serde_json::Value) {
        *self.root.lock().unwrap_or_else(|p| p.into_inner()) = root;
    }
}

#[async_trait]
impl NodeFetcher for StaticFetcher {
    async fn fetch(&self, path: &str) -> Result<SerializedNode> {
        let path = sanitize_path(path);
        let node = {
            let root = self.root.lock().unwrap_or_else(|p| p.into_inner());
            let mut current = &*root;
            for segment in segments(&path) {
                current = current
                    .get("CONTENTS")
                    .and_then(|contents| contents.get(segment))
                    .ok_or_else(|| OscQueryError::NotFound(format!("no node at {}", path)))?;
            }
            current.clone()
        };
        Ok(serde_json::from_value(node)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn static_fetcher_walks_contents() {
        let fetcher = StaticFetcher::new(json!({
            "FULL_PATH": "/",
            "CONTENTS": {
                "a": {"FULL_PATH": "/a", "CONTENTS": {
                    "b": {"FULL_PATH": "/a/b", "TYPE": "i", "VALUE": [4]}
                }}
            }
        }));

        let node = fetcher.fetch("/a/b").await.unwrap();
        assert_eq!(node.full_path, "/a/b");
        assert_eq!(node.type_tag.as_deref(), Some("i"));

        assert!(matches!(
            fetcher.fetch("/a/c").await,
            Err(OscQueryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn http_fetcher_reports_unreachable_server() {
        let fetcher = HttpFetcher::new(Endpoint::new("127.0.0.1", 1, false));
        assert!(matches!(fetcher.fetch("/").await, Err(OscQueryError::Http(_))));
    }

    #[tokio::test]
    async fn preconfigured_http_client_is_used() {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap();
        let fetcher = HttpFetcher::with_client(Endpoint::new("127.0.0.1", 1, false), http);
        assert!(matches!(fetcher.fetch("/a").await, Err(OscQueryError::Http(_))));
    }
}
