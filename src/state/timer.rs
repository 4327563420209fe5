//! Authoritative timer state machine
//!
//! All countdown logic lives here. The machine is purely synchronous; the
//! surrounding application decides when to call it and what to do with the
//! snapshots it produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Manual time entry is clamped to +/- 99:59.
pub const MAX_SET_SECONDS: i64 = 5999;

/// Lifecycle phase of the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Idle,
    Running,
    Paused,
    Finished,
}

/// Policy for what happens when the countdown reaches zero while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OvertimeMode {
    /// Keep running past zero, counting into negative time.
    CountUp,
    /// Freeze at 00:00 and finish.
    Stop,
}

/// Result of a single tick evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Timer is not running; nothing to do.
    Skipped,
    /// Less than a full second has elapsed; no observable change.
    Unchanged,
    /// At least one whole second was deducted.
    Advanced,
    /// The countdown ran out and the timer stopped.
    Finished,
}

impl TickOutcome {
    /// Whether clients need to hear about this tick.
    pub fn is_observable(self) -> bool {
        matches!(self, Self::Advanced | Self::Finished)
    }
}

/// Wire-format snapshot of the timer, pushed to every client on change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub time_left: i64,
    pub status: Status,
    pub overtime_mode: OvertimeMode,
    pub last_tick: DateTime<Utc>,
}

/// Authoritative timer state. Exactly one instance exists per process,
/// owned by [`AppState`](crate::state::AppState); clients only ever see
/// [`TimerSnapshot`] copies.
#[derive(Debug, Clone)]
pub struct TimerState {
    remaining_seconds: i64,
    status: Status,
    overtime_mode: OvertimeMode,
    /// Monotonic instant of the last elapsed-time adjustment.
    last_tick: Instant,
    /// Wall-clock shadow of `last_tick`, carried in snapshots.
    last_tick_at: DateTime<Utc>,
}

impl TimerState {
    /// Create an idle timer at 00:00.
    pub fn new() -> Self {
        Self {
            remaining_seconds: 0,
            status: Status::Idle,
            overtime_mode: OvertimeMode::CountUp,
            last_tick: Instant::now(),
            last_tick_at: Utc::now(),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn remaining_seconds(&self) -> i64 {
        self.remaining_seconds
    }

    pub fn is_running(&self) -> bool {
        self.status == Status::Running
    }

    /// Take an immutable snapshot for broadcast.
    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            time_left: self.remaining_seconds,
            status: self.status,
            overtime_mode: self.overtime_mode,
            last_tick: self.last_tick_at,
        }
    }

    /// Set the countdown and return to IDLE. Always succeeds.
    pub fn set_time(&mut self, seconds: f64) {
        self.remaining_seconds = clamp_seconds(seconds);
        self.status = Status::Idle;
    }

    /// Begin or resume counting.
    ///
    /// Starting an exhausted non-paused timer is rejected: there is nothing
    /// to count down from 00:00. Returns whether the timer started.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.status == Status::Running {
            return false;
        }
        if self.remaining_seconds == 0 && self.status != Status::Paused {
            return false;
        }
        self.status = Status::Running;
        self.mark_tick(now);
        self.finish_if_exhausted();
        true
    }

    /// Freeze the countdown in place.
    pub fn pause(&mut self) {
        self.status = Status::Paused;
    }

    /// Reset to an idle 00:00.
    pub fn stop(&mut self) {
        self.status = Status::Idle;
        self.remaining_seconds = 0;
    }

    /// Switch the zero-crossing policy.
    pub fn set_mode(&mut self, mode: OvertimeMode) {
        self.overtime_mode = mode;
        self.finish_if_exhausted();
    }

    /// `set_time` and `start` fused into one transition so clients never
    /// observe an intermediate IDLE frame.
    pub fn set_and_start(&mut self, seconds: f64, now: Instant) {
        self.remaining_seconds = clamp_seconds(seconds);
        self.status = Status::Running;
        self.mark_tick(now);
        self.finish_if_exhausted();
    }

    /// Deduct however many whole seconds elapsed since the last adjustment.
    ///
    /// Elapsed time is measured from timestamps, not counted from the tick
    /// cadence, so the countdown stays correct across scheduler jitter and
    /// missed wakeups.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if self.status != Status::Running {
            return TickOutcome::Skipped;
        }
        let elapsed = now.saturating_duration_since(self.last_tick).as_secs() as i64;
        if elapsed < 1 {
            return TickOutcome::Unchanged;
        }
        self.remaining_seconds -= elapsed;
        self.mark_tick(now);
        if self.finish_if_exhausted() {
            TickOutcome::Finished
        } else {
            TickOutcome::Advanced
        }
    }

    fn mark_tick(&mut self, now: Instant) {
        self.last_tick = now;
        self.last_tick_at = Utc::now();
    }

    /// A running timer with no time left under the STOP policy must not
    /// exist; collapse it to FINISHED at 00:00.
    fn finish_if_exhausted(&mut self) -> bool {
        if self.status == Status::Running
            && self.overtime_mode == OvertimeMode::Stop
            && self.remaining_seconds <= 0
        {
            self.remaining_seconds = 0;
            self.status = Status::Finished;
            return true;
        }
        false
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Round and clamp a manually entered number of seconds. Tick-driven
/// overtime is deliberately not clamped; only direct entry is bounded.
fn clamp_seconds(seconds: f64) -> i64 {
    seconds
        .round()
        .clamp(-(MAX_SET_SECONDS as f64), MAX_SET_SECONDS as f64) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Duration;

    #[test]
    fn set_time_rounds_and_clamps() {
        let mut timer = TimerState::new();

        timer.set_time(90.4);
        assert_eq!(timer.remaining_seconds(), 90);
        assert_eq!(timer.status(), Status::Idle);

        timer.set_time(90.6);
        assert_eq!(timer.remaining_seconds(), 91);

        timer.set_time(100_000.0);
        assert_eq!(timer.remaining_seconds(), MAX_SET_SECONDS);

        timer.set_time(-100_000.0);
        assert_eq!(timer.remaining_seconds(), -MAX_SET_SECONDS);
    }

    #[test]
    fn start_from_exhausted_idle_is_rejected() {
        let mut timer = TimerState::new();
        assert!(!timer.start(Instant::now()));
        assert_eq!(timer.status(), Status::Idle);
    }

    #[test]
    fn start_resumes_a_paused_timer_even_at_zero() {
        let mut timer = TimerState::new();
        timer.pause();
        assert!(timer.start(Instant::now()));
        assert_eq!(timer.status(), Status::Running);
    }

    #[test]
    fn start_while_running_is_rejected() {
        let mut timer = TimerState::new();
        timer.set_time(30.0);
        assert!(timer.start(Instant::now()));
        assert!(!timer.start(Instant::now()));
    }

    #[test]
    fn pause_is_idempotent() {
        let mut timer = TimerState::new();
        timer.set_time(30.0);
        timer.start(Instant::now());

        timer.pause();
        let first = timer.snapshot();
        timer.pause();
        let second = timer.snapshot();
        assert_eq!(first, second);
    }

    #[test]
    fn stop_resets_to_idle_zero() {
        let mut timer = TimerState::new();
        timer.set_time(125.0);
        timer.start(Instant::now());
        timer.stop();
        assert_eq!(timer.status(), Status::Idle);
        assert_eq!(timer.remaining_seconds(), 0);
    }

    #[test]
    fn tick_measures_elapsed_wall_time() {
        let mut timer = TimerState::new();
        let t0 = Instant::now();
        timer.set_time(10.0);
        timer.start(t0);

        assert_eq!(
            timer.tick(t0 + Duration::from_millis(400)),
            TickOutcome::Unchanged
        );
        assert_eq!(timer.remaining_seconds(), 10);

        // A 2.6s gap deducts two whole seconds and re-anchors.
        assert_eq!(
            timer.tick(t0 + Duration::from_millis(2600)),
            TickOutcome::Advanced
        );
        assert_eq!(timer.remaining_seconds(), 8);
    }

    #[test]
    fn sub_second_polls_accumulate_against_the_anchor() {
        let mut timer = TimerState::new();
        let t0 = Instant::now();
        timer.set_time(10.0);
        timer.start(t0);

        assert_eq!(
            timer.tick(t0 + Duration::from_millis(400)),
            TickOutcome::Unchanged
        );
        assert_eq!(
            timer.tick(t0 + Duration::from_millis(800)),
            TickOutcome::Unchanged
        );
        assert_eq!(
            timer.tick(t0 + Duration::from_millis(1200)),
            TickOutcome::Advanced
        );
        assert_eq!(timer.remaining_seconds(), 9);
    }

    #[test]
    fn stop_mode_finishes_and_clamps_to_zero() {
        let mut timer = TimerState::new();
        let t0 = Instant::now();
        timer.set_time(2.0);
        timer.set_mode(OvertimeMode::Stop);
        timer.start(t0);

        assert_eq!(timer.tick(t0 + Duration::from_secs(3)), TickOutcome::Finished);
        assert_eq!(timer.status(), Status::Finished);
        assert_eq!(timer.remaining_seconds(), 0);

        // A finished timer ignores further ticks.
        assert_eq!(timer.tick(t0 + Duration::from_secs(4)), TickOutcome::Skipped);
    }

    #[test]
    fn count_up_mode_runs_into_negative_overtime() {
        let mut timer = TimerState::new();
        let t0 = Instant::now();
        timer.set_time(1.0);
        timer.set_mode(OvertimeMode::CountUp);
        timer.start(t0);

        assert_eq!(timer.tick(t0 + Duration::from_secs(3)), TickOutcome::Advanced);
        assert_eq!(timer.remaining_seconds(), -2);
        assert_eq!(timer.status(), Status::Running);
    }

    #[test]
    fn switching_to_stop_mode_in_overtime_finishes() {
        let mut timer = TimerState::new();
        let t0 = Instant::now();
        timer.set_time(1.0);
        timer.start(t0);
        timer.tick(t0 + Duration::from_secs(4));
        assert_eq!(timer.remaining_seconds(), -3);

        timer.set_mode(OvertimeMode::Stop);
        assert_eq!(timer.status(), Status::Finished);
        assert_eq!(timer.remaining_seconds(), 0);
    }

    #[test]
    fn finished_timer_only_leaves_via_stop_or_set() {
        let mut timer = TimerState::new();
        let t0 = Instant::now();
        timer.set_time(1.0);
        timer.set_mode(OvertimeMode::Stop);
        timer.start(t0);
        timer.tick(t0 + Duration::from_secs(2));
        assert_eq!(timer.status(), Status::Finished);

        assert!(!timer.start(t0 + Duration::from_secs(3)));
        assert_eq!(timer.status(), Status::Finished);

        timer.set_time(30.0);
        assert_eq!(timer.status(), Status::Idle);
        assert_eq!(timer.remaining_seconds(), 30);
    }
}
