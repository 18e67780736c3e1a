//! UDP broadcast discovery responder (§6).

use crate::config::Config;
use crate::session::SessionRegistry;
use serde::Serialize;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

const PROBE: &[u8] = b"MSN_DISCOVER";

#[derive(Debug, Serialize)]
struct DiscoveryRecord {
    #[serde(rename = "ServerName")]
    server_name: String,
    #[serde(rename = "Port")]
    port: u16,
    #[serde(rename = "UserCount")]
    user_count: usize,
}

pub async fn run(config: Config, registry: Arc<SessionRegistry>) {
    let socket = match UdpSocket::bind(("0.0.0.0", config.discovery_port)).await {
        Ok(socket) => socket,
        Err(err) => {
            warn!(%err, "failed to bind LAN discovery socket, discovery disabled");
            return;
        }
    };

    let mut buf = [0u8; 64];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(%err, "LAN discovery recv failed");
                continue;
            }
        };
        if &buf[..len] != PROBE {
            continue;
        }

        let record = DiscoveryRecord {
            server_name: config.server_name.clone(),
            port: config.tcp_port,
            user_count: registry.count().await,
        };
        let Ok(body) = serde_json::to_vec(&record) else {
            continue;
        };
        if let Err(err) = socket.send_to(&body, peer).await {
            debug!(%err, %peer, "LAN discovery reply failed");
        }
    }
}
