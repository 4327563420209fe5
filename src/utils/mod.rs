//! Utility functions module
//!
//! This module contains utility functions used throughout the application.

pub mod net;
pub mod signals;

// Re-export main items
pub use net::ServerInfo;
pub use signals::shutdown_signal;
