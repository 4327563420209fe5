//! Tick scheduler background task

use std::sync::Arc;

use tokio::time::{interval, Duration};
use tracing::{debug, error, info};

use crate::state::AppState;

/// Polling interval while the timer runs. Short enough that displays track
/// the true clock within a fraction of a second; elapsed time is measured,
/// so a missed wakeup costs nothing.
pub const TICK_INTERVAL: Duration = Duration::from_millis(200);

/// Background task driving the running timer.
///
/// Exactly one tick stream exists per process. The task idles until the
/// state machine arms it and tears the interval down whenever the timer
/// leaves RUNNING; a tick racing a pause or stop observes the non-running
/// status under the state lock and does nothing.
pub async fn tick_scheduler_task(state: Arc<AppState>) {
    info!("Starting tick scheduler task");

    let mut armed_rx = state.subscribe_armed();
    loop {
        // Wait until the state machine arms the scheduler.
        while !*armed_rx.borrow_and_update() {
            if armed_rx.changed().await.is_err() {
                return;
            }
        }

        debug!("Tick stream armed");
        let mut ticker = interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = state.apply_tick() {
                        error!("Failed to apply tick: {}", e);
                    }
                }
                changed = armed_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if !*armed_rx.borrow_and_update() {
                        break;
                    }
                }
            }
        }
        debug!("Tick stream disarmed");
    }
}
