//! Reachability probe capability
//!
//! A probe attempt is bounded by an absolute wall-clock budget; exceeding the
//! budget is a failure, never a stall. The monitor runs inside the single
//! control loop, so a prober that blocked past its budget would delay relay
//! command handling.

use async_trait::async_trait;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use wolhub_shared::state_machine::ProbeOutcome;
use wolhub_shared::timing;

/// Bounded reachability check against a target address
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe `addr`, making at most `attempts` bounded attempts.
    async fn probe(&self, addr: Ipv4Addr, attempts: u32) -> ProbeOutcome;
}

/// TCP-connect prober.
///
/// ICMP echo needs raw sockets, so reachability is inferred from a TCP
/// connect instead: an accepted connection or an immediate refusal both mean
/// the host is up (refusal proves a live stack with the port closed). Only a
/// timeout or a network error counts as down.
pub struct TcpProber {
    port: u16,
    budget: Duration,
}

impl TcpProber {
    pub fn new(port: u16, budget: Duration) -> Self {
        Self { port, budget }
    }
}

impl Default for TcpProber {
    fn default() -> Self {
        Self::new(80, Duration::from_millis(timing::PROBE_BUDGET_MS))
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, addr: Ipv4Addr, attempts: u32) -> ProbeOutcome {
        let target = SocketAddr::from((addr, self.port));
        let mut outcome = ProbeOutcome::Unreachable;

        for _ in 0..attempts.max(1) {
            match timeout(self.budget, TcpStream::connect(target)).await {
                Ok(Ok(_)) => return ProbeOutcome::Reachable,
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                    return ProbeOutcome::Reachable;
                }
                Ok(Err(_)) => outcome = ProbeOutcome::Unreachable,
                Err(_) => outcome = ProbeOutcome::TimedOut,
            }
        }

        outcome
    }
}
