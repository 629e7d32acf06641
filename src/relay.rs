//! Relay channels and the debounce gate
//!
//! All relay mutation goes through [`RelayBank::set`]: redundant writes and
//! writes inside the per-channel cooldown window are suppressed before the
//! hardware is touched. Channels are not persisted; every channel is off
//! after a restart.

use crate::hardware::RelayDriver;
use anyhow::Result;
use std::time::{Duration, Instant};
use tracing::debug;
use wolhub_shared::timing;
use wolhub_shared::wire::RelayStateEntry;

/// One relay output channel
#[derive(Debug, Clone)]
pub struct RelayChannel {
    pub is_on: bool,
    pub last_changed: Option<Instant>,
    pub cooldown_until: Option<Instant>,
}

impl RelayChannel {
    fn new() -> Self {
        Self {
            is_on: false,
            last_changed: None,
            cooldown_until: None,
        }
    }
}

/// The relay channel array plus its debounce gate
pub struct RelayBank {
    channels: Vec<RelayChannel>,
    driver: Box<dyn RelayDriver>,
    cooldown: Duration,
}

impl RelayBank {
    pub fn new(count: usize, driver: Box<dyn RelayDriver>) -> Self {
        Self {
            channels: (0..count).map(|_| RelayChannel::new()).collect(),
            driver,
            cooldown: Duration::from_millis(timing::RELAY_COOLDOWN_MS),
        }
    }

    /// Number of channels on this board
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Current state of a channel, `None` for an out-of-range index
    pub fn is_on(&self, index: usize) -> Option<bool> {
        self.channels.get(index).map(|c| c.is_on)
    }

    /// Apply a desired state through the debounce gate.
    ///
    /// Returns `Ok(true)` when the hardware was actually driven. A redundant
    /// write, a write inside the cooldown window, or an out-of-range index
    /// all return `Ok(false)` without touching state or cooldown.
    pub fn set(&mut self, index: usize, desired: bool, now: Instant) -> Result<bool> {
        let Some(channel) = self.channels.get_mut(index) else {
            return Ok(false);
        };

        if channel.is_on == desired {
            debug!("relay {} already {}, ignoring", index, desired);
            return Ok(false);
        }

        if let Some(until) = channel.cooldown_until {
            if now < until {
                debug!("relay {} in cooldown, ignoring", index);
                return Ok(false);
            }
        }

        self.driver.set_pin(index, desired)?;

        let channel = &mut self.channels[index];
        channel.is_on = desired;
        channel.last_changed = Some(now);
        channel.cooldown_until = Some(now + self.cooldown);
        Ok(true)
    }

    /// `set(index, !current)`
    pub fn toggle(&mut self, index: usize, now: Instant) -> Result<bool> {
        let Some(current) = self.is_on(index) else {
            return Ok(false);
        };
        self.set(index, !current, now)
    }

    /// Channel states for heartbeat/status frames
    pub fn snapshot(&self) -> Vec<RelayStateEntry> {
        self.channels
            .iter()
            .enumerate()
            .map(|(id, c)| RelayStateEntry { id, state: c.is_on })
            .collect()
    }
}
