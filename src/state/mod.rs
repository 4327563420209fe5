//! State management module
//!
//! The authoritative timer state machine and the application state that
//! owns it.

pub mod app_state;
pub mod timer;

// Re-export main types
pub use app_state::AppState;
pub use timer::{OvertimeMode, Status, TickOutcome, TimerSnapshot, TimerState};
