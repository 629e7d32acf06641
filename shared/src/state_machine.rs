//! Wake-target liveness state machine
//!
//! Pure transition logic for the tiered polling monitor. The monitor owns the
//! timers and the probes; this module only decides, given what a scan
//! observed, which state a target moves to. Keeping it free of I/O makes the
//! tier semantics testable in isolation.

use crate::wire::WakeState;

/// What a single bounded probe attempt observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Target answered within the budget
    Reachable,
    /// Target did not answer
    Unreachable,
    /// The attempt exceeded the probe budget. Counts as a failure, but is
    /// reported separately so a reachable-but-slow target is visible in logs.
    TimedOut,
}

impl ProbeOutcome {
    /// Whether this outcome counts as a successful probe
    pub fn is_up(&self) -> bool {
        matches!(self, ProbeOutcome::Reachable)
    }
}

/// Polling tiers, partitioned by the state they scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Sub-second cadence over Booting targets
    Fast,
    /// Tens-of-seconds cadence over Running targets
    Slow,
    /// Minutes cadence over Offline targets
    Idle,
}

impl Tier {
    /// The state subset this tier scans
    pub fn scans(&self) -> WakeState {
        match self {
            Tier::Fast => WakeState::Booting,
            Tier::Slow => WakeState::Running,
            Tier::Idle => WakeState::Offline,
        }
    }
}

/// Observation made for one target during a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The target has no known address; probing was short-circuited
    AddressUnknown,
    /// A probe ran and produced this outcome
    Probed(ProbeOutcome),
    /// Fast tier only: boot has been pending longer than the boot timeout
    BootTimedOut,
}

/// Decide the next state for a target scanned by `tier`.
///
/// Returns `None` when the target stays in its current state; transitions are
/// only ever produced for targets in the tier's own subset.
pub fn next_state(tier: Tier, current: WakeState, observation: Observation) -> Option<WakeState> {
    if current != tier.scans() {
        return None;
    }

    let next = match (tier, observation) {
        // Booting: unknown address means we can never confirm the boot
        (Tier::Fast, Observation::AddressUnknown) => WakeState::Offline,
        (Tier::Fast, Observation::BootTimedOut) => WakeState::Failed,
        (Tier::Fast, Observation::Probed(outcome)) if outcome.is_up() => WakeState::Running,
        (Tier::Fast, Observation::Probed(_)) => return None, // keep waiting

        // Running: losing the address or the probe both mean offline
        (Tier::Slow, Observation::AddressUnknown) => WakeState::Offline,
        (Tier::Slow, Observation::Probed(outcome)) if outcome.is_up() => return None,
        (Tier::Slow, Observation::Probed(_)) => WakeState::Offline,

        // Offline: unknown address is skipped before probing
        (Tier::Idle, Observation::AddressUnknown) => return None,
        (Tier::Idle, Observation::Probed(outcome)) if outcome.is_up() => WakeState::Running,
        (Tier::Idle, Observation::Probed(_)) => return None,

        // BootTimedOut is only produced by the fast tier
        (_, Observation::BootTimedOut) => return None,
    };

    if next == current {
        None
    } else {
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_tier_boot_success() {
        let next = next_state(
            Tier::Fast,
            WakeState::Booting,
            Observation::Probed(ProbeOutcome::Reachable),
        );
        assert_eq!(next, Some(WakeState::Running));
    }

    #[test]
    fn test_fast_tier_keeps_waiting_on_failure() {
        for outcome in [ProbeOutcome::Unreachable, ProbeOutcome::TimedOut] {
            let next = next_state(Tier::Fast, WakeState::Booting, Observation::Probed(outcome));
            assert_eq!(next, None, "{outcome:?} should not end the boot window");
        }
    }

    #[test]
    fn test_fast_tier_boot_timeout_fails() {
        let next = next_state(Tier::Fast, WakeState::Booting, Observation::BootTimedOut);
        assert_eq!(next, Some(WakeState::Failed));
    }

    #[test]
    fn test_fast_tier_unknown_address_goes_offline() {
        let next = next_state(Tier::Fast, WakeState::Booting, Observation::AddressUnknown);
        assert_eq!(next, Some(WakeState::Offline));
    }

    #[test]
    fn test_slow_tier_drops_unreachable_target() {
        let next = next_state(
            Tier::Slow,
            WakeState::Running,
            Observation::Probed(ProbeOutcome::Unreachable),
        );
        assert_eq!(next, Some(WakeState::Offline));

        // probe timeout counts as failure, not success
        let next = next_state(
            Tier::Slow,
            WakeState::Running,
            Observation::Probed(ProbeOutcome::TimedOut),
        );
        assert_eq!(next, Some(WakeState::Offline));
    }

    #[test]
    fn test_slow_tier_healthy_target_unchanged() {
        let next = next_state(
            Tier::Slow,
            WakeState::Running,
            Observation::Probed(ProbeOutcome::Reachable),
        );
        assert_eq!(next, None);
    }

    #[test]
    fn test_idle_tier_discovers_running_target() {
        let next = next_state(
            Tier::Idle,
            WakeState::Offline,
            Observation::Probed(ProbeOutcome::Reachable),
        );
        assert_eq!(next, Some(WakeState::Running));
    }

    #[test]
    fn test_idle_tier_skips_unknown_address() {
        let next = next_state(Tier::Idle, WakeState::Offline, Observation::AddressUnknown);
        assert_eq!(next, None);
    }

    #[test]
    fn test_tiers_ignore_foreign_states() {
        // A Failed target is never advanced by any tier; only a new wake
        // trigger moves it back to Booting.
        for tier in [Tier::Fast, Tier::Slow, Tier::Idle] {
            let next = next_state(
                tier,
                WakeState::Failed,
                Observation::Probed(ProbeOutcome::Reachable),
            );
            assert_eq!(next, None);
        }
    }
}
