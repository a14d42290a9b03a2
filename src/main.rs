use anyhow::Context;
use sharded_kvstore::service::{EntityService, router};
use sharded_kvstore::storage::MemoryStore;
use sharded_kvstore::topology::loader::load_topology;
use sharded_kvstore::replication::HttpTransport;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_PEER_TIMEOUT_MS: u64 = 2000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        // .with_max_level(tracing::Level::DEBUG)
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 5 {
        eprintln!(
            "Usage: {} --node <name> --topology <path> [--bind <addr:port>] [--peer-timeout-ms <ms>]",
            args[0]
        );
        eprintln!("Example: {} --node node0 --topology cluster.json", args[0]);
        eprintln!(
            "Example: {} --node node1 --topology cluster.json --bind 127.0.0.1:8081",
            args[0]
        );

        std::process::exit(1);
    }

    let mut node_name: Option<String> = None;
    let mut topology_path: Option<String> = None;
    let mut bind_addr: Option<SocketAddr> = None;
    let mut peer_timeout_ms = DEFAULT_PEER_TIMEOUT_MS;

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--node", Some(value)) => {
                node_name = Some(value.clone());
                i += 2;
            }
            ("--topology", Some(value)) => {
                topology_path = Some(value.clone());
                i += 2;
            }
            ("--bind", Some(value)) => {
                bind_addr = Some(value.parse()?);
                i += 2;
            }
            ("--peer-timeout-ms", Some(value)) => {
                peer_timeout_ms = value.parse()?;
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let node_name = node_name.context("--node is required")?;
    let topology_path = topology_path.context("--topology is required")?;

    // 1. Topology:
    let topology = Arc::new(load_topology(&topology_path, &node_name)?);
    let local = topology.local_node().clone();

    let bind_addr = match bind_addr {
        Some(addr) => addr,
        None => {
            let url = reqwest::Url::parse(&local.url)
                .with_context(|| format!("node url {} is not valid", local.url))?;
            let port = url
                .port_or_known_default()
                .with_context(|| format!("node url {} has no port", local.url))?;
            SocketAddr::from(([0, 0, 0, 0], port))
        }
    };

    // 2. Storage and peers:
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(HttpTransport::new(Duration::from_millis(peer_timeout_ms))?);

    // 3. Entity service:
    let service = Arc::new(EntityService::new(topology, transport, store)?);
    service.hydrate()?;

    // 4. HTTP Router:
    let app = router(service.clone());

    // 5. Start HTTP server:
    tracing::info!(
        "Node {} (group {}) listening on {}",
        local.name,
        local.group,
        bind_addr
    );
    tracing::info!("Peer timeout: {} ms", peer_timeout_ms);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
