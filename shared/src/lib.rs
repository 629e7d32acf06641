//! wolhub Shared Protocol Types
//!
//! This crate provides the wire types, line codec and liveness state machine
//! shared between wolhub relay nodes and anything that speaks their protocol.

pub mod codec;
pub mod state_machine;
pub mod wire;

use std::time::{SystemTime, UNIX_EPOCH};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Timing parameters for the node control loop
pub mod timing {
    /// Heartbeat emission interval in milliseconds
    pub const HEARTBEAT_INTERVAL_MS: u64 = 5000;

    /// Fast tier cadence - scans Booting targets
    pub const FAST_SCAN_MS: u64 = 500;

    /// Slow tier cadence - scans Running targets
    pub const SLOW_SCAN_MS: u64 = 20_000;

    /// Idle tier cadence - scans Offline targets
    pub const IDLE_SCAN_MS: u64 = 120_000;

    /// A Booting target with no successful probe within this window fails
    pub const BOOT_TIMEOUT_MS: u64 = 120_000;

    /// Absolute wall-clock budget for a single probe attempt
    pub const PROBE_BUDGET_MS: u64 = 1_500;

    /// Per-channel relay cooldown after a state change
    pub const RELAY_COOLDOWN_MS: u64 = 200;

    /// Window within which an identical relay command is dropped as a duplicate
    pub const DUPLICATE_WINDOW_MS: u64 = 300;
}

/// Capacity limits for the node
pub mod limits {
    /// Maximum wake targets held by the registry
    pub const MAX_WAKE_TARGETS: usize = 10;

    /// Maximum buffered relay tasks
    pub const MAX_TASK_QUEUE: usize = 10;

    /// Relay channel count when the config does not override it
    pub const DEFAULT_RELAY_COUNT: usize = 8;

    /// UDP port for the wake packet when a profile leaves it at zero
    pub const DEFAULT_WAKE_PORT: u16 = 9;
}
