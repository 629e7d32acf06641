//! Connection management for the persistent server link
//!
//! A single TCP connection carries newline-delimited frames in both
//! directions. The manager owns dialing, reconnection backoff, and framing;
//! the control loop consumes [`ConnectionEvent`]s and pushes reply lines.

mod manager;

pub use manager::{ConnectionConfig, ConnectionEvent, ConnectionManager};
