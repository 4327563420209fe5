//! Command ingress: validation and dispatch
//!
//! Every inbound frame is validated here before it can touch the timer.
//! Malformed payloads are dropped without a reply to the sender; controllers
//! are trusted and concurrent commands resolve last-writer-wins.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::state::AppState;

use super::protocol::Command;

/// Parse a raw text frame into a command, dropping anything malformed.
pub fn parse_command(raw: &str) -> Option<Command> {
    let command: Command = match serde_json::from_str(raw) {
        Ok(command) => command,
        Err(e) => {
            debug!("Dropping malformed command: {}", e);
            return None;
        }
    };

    match command {
        Command::SetTime { seconds } | Command::SetAndStart { seconds }
            if !seconds.is_finite() =>
        {
            debug!("Dropping command with non-finite seconds");
            None
        }
        _ => Some(command),
    }
}

/// Apply a validated command to the application state.
///
/// Commands from all connections serialize on the state lock, so they take
/// effect in arrival order. Tunnel operations can take seconds, so they run
/// in their own task.
pub fn dispatch(state: &Arc<AppState>, command: Command) {
    let result = match command {
        Command::SetTime { seconds } => state.set_time(seconds),
        Command::Start => state.start(),
        Command::Pause => state.pause(),
        Command::Stop => state.stop(),
        Command::SetMode { mode } => state.set_mode(mode),
        Command::SetAndStart { seconds } => state.set_and_start(seconds),
        Command::Shutdown => {
            state.request_shutdown();
            Ok(None)
        }
        Command::StartTunnel => {
            let state = Arc::clone(state);
            tokio::spawn(async move { state.start_tunnel().await });
            Ok(None)
        }
        Command::StopTunnel => {
            let state = Arc::clone(state);
            tokio::spawn(async move { state.stop_tunnel().await });
            Ok(None)
        }
    };

    if let Err(e) = result {
        warn!("Failed to apply command: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{OvertimeMode, Status};
    use crate::tunnel::TunnelManager;
    use crate::utils::net::ServerInfo;

    fn test_state() -> Arc<AppState> {
        let info = ServerInfo {
            port: 0,
            hostname: "test".to_string(),
            addresses: vec!["127.0.0.1".to_string()],
        };
        let tunnel = TunnelManager::new("cloudflared".to_string(), "http://127.0.0.1:0".to_string());
        Arc::new(AppState::new(info, tunnel))
    }

    #[test]
    fn parses_well_formed_commands() {
        assert_eq!(
            parse_command(r#"{"type":"set-time","seconds":90}"#),
            Some(Command::SetTime { seconds: 90.0 })
        );
        assert_eq!(parse_command(r#"{"type":"pause"}"#), Some(Command::Pause));
        assert_eq!(
            parse_command(r#"{"type":"set-mode","mode":"COUNT_UP"}"#),
            Some(Command::SetMode {
                mode: OvertimeMode::CountUp
            })
        );
    }

    #[test]
    fn drops_malformed_payloads() {
        assert_eq!(parse_command("not json"), None);
        assert_eq!(parse_command(r#"{"type":"warp-time"}"#), None);
        assert_eq!(parse_command(r#"{"type":"set-time","seconds":"ninety"}"#), None);
        assert_eq!(parse_command(r#"{"type":"set-mode","mode":"EXPLODE"}"#), None);
        // An overflowing literal must not reach the state machine.
        assert_eq!(parse_command(r#"{"type":"set-time","seconds":1e999}"#), None);
    }

    #[tokio::test]
    async fn dispatch_applies_commands_in_order() {
        let state = test_state();

        dispatch(&state, Command::SetTime { seconds: 125.0 });
        dispatch(&state, Command::Start);
        dispatch(&state, Command::Pause);

        let snapshot = state.snapshot().unwrap();
        assert_eq!(snapshot.time_left, 125);
        assert_eq!(snapshot.status, Status::Paused);
    }

    #[tokio::test]
    async fn clamping_is_applied_not_rejected() {
        let state = test_state();

        dispatch(&state, Command::SetTime { seconds: 1e9 });

        let snapshot = state.snapshot().unwrap();
        assert_eq!(snapshot.time_left, 5999);
        assert_eq!(snapshot.status, Status::Idle);
    }
}
