//! Server network identity discovery

use serde::{Deserialize, Serialize};
use tokio::process::Command;

/// Where clients can reach this server. Sent point-to-point on connect so a
/// director screen can show joinable addresses to the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub port: u16,
    pub hostname: String,
    pub addresses: Vec<String>,
}

impl ServerInfo {
    /// Discover the hostname and reachable addresses for this machine.
    pub async fn discover(port: u16) -> Self {
        Self {
            port,
            hostname: read_hostname().await,
            addresses: local_addresses(),
        }
    }
}

async fn read_hostname() -> String {
    match Command::new("hostname").output().await {
        Ok(output) if output.status.success() => {
            let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if name.is_empty() {
                "localhost".to_string()
            } else {
                name
            }
        }
        _ => "localhost".to_string(),
    }
}

/// Loopback plus the interface address used for outbound traffic.
fn local_addresses() -> Vec<String> {
    let mut addresses = vec!["127.0.0.1".to_string()];
    // Connecting a UDP socket resolves the outbound route without sending
    // any packet.
    if let Ok(socket) = std::net::UdpSocket::bind(("0.0.0.0", 0)) {
        if socket.connect(("8.8.8.8", 80)).is_ok() {
            if let Ok(addr) = socket.local_addr() {
                let ip = addr.ip().to_string();
                if !addresses.contains(&ip) {
                    addresses.push(ip);
                }
            }
        }
    }
    addresses
}
