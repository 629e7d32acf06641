//! Tiered liveness monitor
//!
//! Three timers scan disjoint subsets of the registry (fast -> Booting,
//! slow -> Running, idle -> Offline) so the probe cost stays bounded by the
//! number of targets actually in each state. Every state change is emitted
//! as a `status:<name>:<STATE>` frame on the outbound channel.

use crate::probe::Prober;
use crate::wake::registry::{WakeRegistry, WakeTarget};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use wolhub_shared::state_machine::{next_state, Observation, ProbeOutcome, Tier};
use wolhub_shared::timing;
use wolhub_shared::wire::{self, WakeState};

pub struct LivenessMonitor {
    prober: Arc<dyn Prober>,
    outbound: mpsc::Sender<String>,
    attempts: u32,
    boot_timeout: Duration,
}

impl LivenessMonitor {
    pub fn new(prober: Arc<dyn Prober>, outbound: mpsc::Sender<String>) -> Self {
        Self {
            prober,
            outbound,
            attempts: 1,
            boot_timeout: Duration::from_millis(timing::BOOT_TIMEOUT_MS),
        }
    }

    #[cfg(test)]
    fn with_boot_timeout(mut self, boot_timeout: Duration) -> Self {
        self.boot_timeout = boot_timeout;
        self
    }

    /// Run one scan of the tier's state subset
    pub async fn scan(&self, tier: Tier, registry: &mut WakeRegistry, now: Instant) {
        for index in 0..registry.len() {
            let (state, addr, boot_started, name) = {
                let target = registry.get(index).expect("index in range");
                (
                    target.state,
                    target.addr,
                    target.boot_started,
                    target.name.clone(),
                )
            };

            if state != tier.scans() {
                continue;
            }

            let observation = self.observe(tier, &name, addr, boot_started, now).await;
            if let Some(next) = next_state(tier, state, observation) {
                let target = registry.get_mut(index).expect("index in range");
                apply_transition(target, next);
                self.emit_status(&name, next).await;
            }
        }
    }

    /// Observe one target: short-circuit unknown addresses, time out stale
    /// boots, otherwise run a bounded probe.
    async fn observe(
        &self,
        tier: Tier,
        name: &str,
        addr: Option<Ipv4Addr>,
        boot_started: Option<Instant>,
        now: Instant,
    ) -> Observation {
        let Some(addr) = addr else {
            return Observation::AddressUnknown;
        };

        if tier == Tier::Fast {
            if let Some(started) = boot_started {
                if now.duration_since(started) > self.boot_timeout {
                    return Observation::BootTimedOut;
                }
            }
        }

        let outcome = self.prober.probe(addr, self.attempts).await;
        if outcome == ProbeOutcome::TimedOut {
            // not the same as an ordinary failed probe: the target may be
            // reachable but too slow to answer within the budget
            warn!("probe of {} ({}) exceeded budget", name, addr);
        }
        Observation::Probed(outcome)
    }

    /// On-demand full snapshot: probe every non-Booting target immediately,
    /// then report every target's state unconditionally. A consumer asking
    /// for an explicit refresh needs the whole picture, not a diff.
    pub async fn full_snapshot(&self, registry: &mut WakeRegistry) {
        for index in 0..registry.len() {
            let (state, addr, name) = {
                let target = registry.get(index).expect("index in range");
                (target.state, target.addr, target.name.clone())
            };

            if state == WakeState::Booting {
                continue; // the fast tier owns the boot window
            }

            let next = match addr {
                None => match state {
                    WakeState::Running => Some(WakeState::Offline),
                    _ => None,
                },
                Some(addr) => {
                    let outcome = self.prober.probe(addr, self.attempts).await;
                    match (state, outcome.is_up()) {
                        (WakeState::Running, true) => None,
                        (WakeState::Running, false) => Some(WakeState::Offline),
                        (_, true) => Some(WakeState::Running),
                        (_, false) => None,
                    }
                }
            };

            if let Some(next) = next {
                let target = registry.get_mut(index).expect("index in range");
                apply_transition(target, next);
                if next == WakeState::Running && state == WakeState::Failed {
                    info!("target {} recovered after failed boot", name);
                }
            }
        }

        // unconditional report, changed or not
        for index in 0..registry.len() {
            let target = registry.get(index).expect("index in range");
            self.emit_status(&target.name, target.state).await;
        }
    }

    async fn emit_status(&self, name: &str, state: WakeState) {
        info!("target {} -> {}", name, state);
        if let Err(e) = self.outbound.send(wire::status_line(name, state)).await {
            error!("failed to emit status frame: {}", e);
        }
    }
}

/// Apply a state transition, keeping the boot timestamp invariant:
/// only a Booting target carries one.
fn apply_transition(target: &mut WakeTarget, next: WakeState) {
    target.state = next;
    if next != WakeState::Booting {
        target.boot_started = None;
    }
}
