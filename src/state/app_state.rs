//! Main application state management

use std::sync::Mutex;

use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::api::protocol::Event;
use crate::tunnel::TunnelManager;
use crate::utils::net::ServerInfo;

use super::timer::{OvertimeMode, TimerSnapshot, TimerState};

/// Capacity of the client event fan-out channel. A client that falls more
/// than this many events behind skips ahead to the newest snapshot.
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Central application state: the authoritative timer, the channels that
/// coordinate it, and the server's network identity.
///
/// There is exactly one `AppState` per process. Every mutation of the timer
/// goes through [`AppState::mutate`], which applies the change under the
/// state lock, re-arms the tick scheduler, and broadcasts the fresh snapshot
/// to all connected clients.
#[derive(Debug)]
pub struct AppState {
    /// Authoritative timer state. Clients only ever see snapshots.
    timer: Mutex<TimerState>,
    /// Fan-out of events to all connected clients.
    events_tx: broadcast::Sender<Event>,
    /// Arms (true) or disarms (false) the tick scheduler.
    armed_tx: watch::Sender<bool>,
    /// Flipped to true when a client requests process shutdown.
    shutdown_tx: watch::Sender<bool>,
    /// Network identity handed to clients on connect.
    pub info: ServerInfo,
    /// Optional public tunnel exposing the server beyond the local network.
    pub tunnel: TunnelManager,
    /// Process start, for uptime reporting.
    pub start_time: Instant,
}

impl AppState {
    /// Create a new `AppState` with an idle timer.
    pub fn new(info: ServerInfo, tunnel: TunnelManager) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (armed_tx, _) = watch::channel(false);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            timer: Mutex::new(TimerState::new()),
            events_tx,
            armed_tx,
            shutdown_tx,
            info,
            tunnel,
            start_time: Instant::now(),
        }
    }

    /// Subscribe to the event fan-out.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events_tx.subscribe()
    }

    /// Subscribe to the tick scheduler arming flag.
    pub fn subscribe_armed(&self) -> watch::Receiver<bool> {
        self.armed_tx.subscribe()
    }

    /// Push an event to every connected client. Returns the receiver count.
    pub fn broadcast(&self, event: Event) -> usize {
        // send fails only when no client is currently subscribed.
        self.events_tx.send(event).unwrap_or(0)
    }

    /// Apply a mutation to the timer. When it reports an observable change,
    /// re-arm the scheduler to match the new status and broadcast the fresh
    /// snapshot; otherwise nothing leaves this function.
    fn mutate<F>(&self, f: F) -> Result<Option<TimerSnapshot>, String>
    where
        F: FnOnce(&mut TimerState) -> bool,
    {
        let mut timer = self
            .timer
            .lock()
            .map_err(|e| format!("Failed to lock timer state: {}", e))?;

        if !f(&mut timer) {
            return Ok(None);
        }

        let snapshot = timer.snapshot();
        let armed = timer.is_running();
        drop(timer);

        // Only a real transition wakes the scheduler.
        self.armed_tx.send_if_modified(|value| {
            if *value == armed {
                false
            } else {
                *value = armed;
                true
            }
        });

        self.broadcast(Event::TimerUpdate {
            state: snapshot.clone(),
        });
        Ok(Some(snapshot))
    }

    /// Set the countdown and return to IDLE.
    pub fn set_time(&self, seconds: f64) -> Result<Option<TimerSnapshot>, String> {
        info!("Setting timer to {} seconds", seconds);
        self.mutate(|timer| {
            timer.set_time(seconds);
            true
        })
    }

    /// Begin or resume counting. Silently a no-op on an exhausted idle timer.
    pub fn start(&self) -> Result<Option<TimerSnapshot>, String> {
        self.mutate(|timer| timer.start(Instant::now()))
    }

    /// Freeze the countdown in place.
    pub fn pause(&self) -> Result<Option<TimerSnapshot>, String> {
        self.mutate(|timer| {
            timer.pause();
            true
        })
    }

    /// Reset to an idle 00:00.
    pub fn stop(&self) -> Result<Option<TimerSnapshot>, String> {
        info!("Stopping timer");
        self.mutate(|timer| {
            timer.stop();
            true
        })
    }

    /// Switch the overtime policy.
    pub fn set_mode(&self, mode: OvertimeMode) -> Result<Option<TimerSnapshot>, String> {
        info!("Setting overtime mode to {:?}", mode);
        self.mutate(|timer| {
            timer.set_mode(mode);
            true
        })
    }

    /// Set the countdown and start it in one transition.
    pub fn set_and_start(&self, seconds: f64) -> Result<Option<TimerSnapshot>, String> {
        info!("Setting timer to {} seconds and starting", seconds);
        self.mutate(|timer| {
            timer.set_and_start(seconds, Instant::now());
            true
        })
    }

    /// Evaluate elapsed time against the running timer. Called by the tick
    /// scheduler; sub-second ticks produce no broadcast.
    pub fn apply_tick(&self) -> Result<Option<TimerSnapshot>, String> {
        let now = Instant::now();
        self.mutate(|timer| timer.tick(now).is_observable())
    }

    /// Current snapshot without mutating anything.
    pub fn snapshot(&self) -> Result<TimerSnapshot, String> {
        self.timer
            .lock()
            .map(|timer| timer.snapshot())
            .map_err(|e| format!("Failed to lock timer state: {}", e))
    }

    /// Everything a late-joining client needs to self-synchronize: the
    /// server identity, the current timer snapshot, and the tunnel status.
    pub async fn connect_events(&self) -> Vec<Event> {
        let mut events = vec![Event::ServerInfo {
            info: self.info.clone(),
        }];
        if let Ok(snapshot) = self.snapshot() {
            events.push(Event::TimerUpdate { state: snapshot });
        }
        events.push(Event::TunnelStatus {
            url: self.tunnel.current_url().await,
            downloading: None,
            error: None,
        });
        events
    }

    /// Ask the process to exit gracefully.
    pub fn request_shutdown(&self) {
        info!("Shutdown requested by client");
        self.shutdown_tx.send_replace(true);
    }

    /// Resolve once a client has requested shutdown.
    pub async fn shutdown_requested(&self) {
        let mut rx = self.shutdown_tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Open the public tunnel and report the outcome to all clients.
    /// Tunnel failures never affect the timer.
    pub async fn start_tunnel(&self) {
        match self.tunnel.open().await {
            Ok(url) => {
                info!("Tunnel available at {}", url);
                self.broadcast(Event::TunnelStatus {
                    url: Some(url),
                    downloading: None,
                    error: None,
                });
            }
            Err(e) => {
                warn!("Failed to open tunnel: {}", e);
                self.broadcast(Event::TunnelStatus {
                    url: None,
                    downloading: None,
                    error: Some(e),
                });
            }
        }
    }

    /// Tear down the public tunnel and tell all clients it is gone.
    pub async fn stop_tunnel(&self) {
        if self.tunnel.close().await {
            info!("Tunnel closed");
        }
        self.broadcast(Event::TunnelStatus {
            url: None,
            downloading: None,
            error: None,
        });
    }

    /// Calculate server uptime as a formatted string.
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}
