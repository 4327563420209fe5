//! Wire protocol for the real-time channel
//!
//! Commands flow client -> server, events flow server -> client. Both
//! directions use JSON text frames tagged with a `type` field.

use serde::{Deserialize, Serialize};

use crate::state::{OvertimeMode, TimerSnapshot};
use crate::utils::net::ServerInfo;

/// Inbound command from any connected controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Command {
    /// Set the countdown to a number of seconds and go idle.
    SetTime { seconds: f64 },
    Start,
    Pause,
    Stop,
    /// Choose what happens when the countdown reaches zero.
    SetMode { mode: OvertimeMode },
    /// Set the countdown and start it in one step.
    SetAndStart { seconds: f64 },
    /// Ask the server process to exit.
    Shutdown,
    StartTunnel,
    StopTunnel,
}

/// Outbound event, broadcast to all clients or sent point-to-point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Event {
    /// Full timer snapshot, pushed on every observable change.
    TimerUpdate { state: TimerSnapshot },
    /// Server network identity, sent to a client on connect.
    ServerInfo { info: ServerInfo },
    /// Current tunnel state, or why there is none.
    TunnelStatus {
        url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        downloading: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Progress of a provider fetching its tunnel binary.
    TunnelDownloadProgress { downloaded: u64, total: Option<u64> },
    /// The server is about to exit.
    ServerShutdown,
}
