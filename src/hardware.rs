//! Hardware collaborator capabilities
//!
//! The GPIO layer is an external concern; the core only ever sets a pin,
//! beeps the buzzer or toggles the status LED through these traits. The
//! logging implementations stand in where no GPIO backend is wired up.

use anyhow::Result;
use tracing::info;

/// Drives the physical relay pins
pub trait RelayDriver: Send {
    fn set_pin(&mut self, index: usize, on: bool) -> Result<()>;
}

/// Audio/visual feedback collaborator (buzzer + status LED)
pub trait Annunciator: Send {
    fn beep(&mut self, pitch_hz: u32, duration_ms: u32, volume: f32);
    fn set_led(&mut self, on: bool);
}

/// Stand-in relay driver that only logs pin writes
#[derive(Default)]
pub struct LoggingRelayDriver;

impl RelayDriver for LoggingRelayDriver {
    fn set_pin(&mut self, index: usize, on: bool) -> Result<()> {
        info!("[GPIO] relay pin {} -> {}", index, if on { "HIGH" } else { "LOW" });
        Ok(())
    }
}

/// Stand-in annunciator that only logs
#[derive(Default)]
pub struct LoggingAnnunciator;

impl Annunciator for LoggingAnnunciator {
    fn beep(&mut self, pitch_hz: u32, duration_ms: u32, volume: f32) {
        info!("[GPIO] buzzer {}Hz for {}ms at {:.2}", pitch_hz, duration_ms, volume);
    }

    fn set_led(&mut self, on: bool) {
        info!("[GPIO] status LED -> {}", if on { "on" } else { "off" });
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records every pin write for assertions
    #[derive(Clone, Default)]
    pub struct MockRelayDriver {
        pub writes: Arc<Mutex<Vec<(usize, bool)>>>,
    }

    impl RelayDriver for MockRelayDriver {
        fn set_pin(&mut self, index: usize, on: bool) -> Result<()> {
            self.writes.lock().expect("mock lock poisoned").push((index, on));
            Ok(())
        }
    }

    /// Records beeps and LED writes
    #[derive(Clone, Default)]
    pub struct MockAnnunciator {
        pub beeps: Arc<Mutex<Vec<(u32, u32, f32)>>>,
        pub led: Arc<Mutex<Vec<bool>>>,
    }

    impl Annunciator for MockAnnunciator {
        fn beep(&mut self, pitch_hz: u32, duration_ms: u32, volume: f32) {
            self.beeps
                .lock()
                .expect("mock lock poisoned")
                .push((pitch_hz, duration_ms, volume));
        }

        fn set_led(&mut self, on: bool) {
            self.led.lock().expect("mock lock poisoned").push(on);
        }
    }
}
