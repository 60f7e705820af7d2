//! Connect to an OSCQuery server, print its namespace and log value changes.
//!
//! ```text
//! cargo run --example browse -- 127.0.0.1 5678 [--secure]
//! ```

use oscquery_client::{ClientEvent, ClientOptions, ClientRegistry, NodeInfo, NodeKind};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn print_tree(node: &NodeInfo, depth: usize) {
    let indent = "  ".repeat(depth);
    let detail = match &node.kind {
        NodeKind::Integer { range: Some(range) } | NodeKind::Float { range: Some(range) } => match (range.min, range.max) {
            (Some(min), Some(max)) => format!(" [{}..{}]", min, max),
            _ => String::new(),
        },
        NodeKind::String {
            enum_values: Some(values),
        } => format!(" {{{}}}", values.join(", ")),
        _ => String::new(),
    };
    let access = match (node.access.is_readable(), node.access.is_writable()) {
        (true, true) => "rw",
        (true, false) => "r",
        (false, true) => "w",
        (false, false) => "-",
    };
    println!(
        "{}{} ({:?}, {}){}",
        indent,
        node.full_path,
        node.node_type(),
        access,
        detail
    );
    if let Some(contents) = node.contents() {
        for child in contents.values() {
            print_tree(child, depth + 1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port = args.next().map(|p| p.parse()).transpose()?.unwrap_or(5678);
    let secure = args.any(|a| a == "--secure");

    let registry = ClientRegistry::new();
    let client = registry.get(ClientOptions::new(host, port).secure(secure));

    client.on("error", |event: &ClientEvent| {
        if let ClientEvent::Error(e) = event {
            tracing::error!("Client error: {}", e);
        }
    })?;
    client.on("path-added", |event: &ClientEvent| {
        if let ClientEvent::PathAdded { path, .. } = event {
            tracing::info!("Added {}", path);
        }
    })?;
    client.on("path-removed", |event: &ClientEvent| {
        if let ClientEvent::PathRemoved { path } = event {
            tracing::info!("Removed {}", path);
        }
    })?;
    client.on("sync", |event: &ClientEvent| {
        if let ClientEvent::Sync { node, .. } = event {
            print_tree(node, 0);
        }
    })?;

    let mut states = client.state_changes();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            tracing::debug!("Client state {:?}", state);
        }
    });

    client.sync_data().await?;

    // Log every leaf update; listeners on "/" would also see container copies
    let root = client.get_node("/").await?;
    let mut leaves = Vec::new();
    root.info.walk(&mut |n| {
        if n.contents().is_none() {
            leaves.push(n.full_path.clone());
        }
    });
    let mut watched = 0;
    for path in &leaves {
        let registered = client.on(path, |event: &ClientEvent| {
            if let ClientEvent::ValueChanged { path, value } = event {
                tracing::info!("{} = {:?}", path, value);
            }
        });
        match registered {
            Ok(_) => watched += 1,
            Err(e) => tracing::warn!("Not watching {}: {}", path, e),
        }
    }

    // LISTEN frames sent before the live channel opens are dropped
    let mut connection = client.connection_changes();
    match tokio::time::timeout(Duration::from_secs(5), connection.wait_for(|open| *open)).await {
        Ok(Ok(_)) => client.listen_all("/")?,
        _ => tracing::warn!("Live channel to {} is not open, values will not update", client.endpoint()),
    }

    tracing::info!(
        "Watching {} parameter(s) on {}, press Ctrl-C to stop",
        watched,
        client.endpoint()
    );
    tokio::signal::ctrl_c().await?;

    client.ignore_all("/")?;
    Ok(())
}
