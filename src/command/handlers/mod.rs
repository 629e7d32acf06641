//! Handlers for the individual command forms

mod config;
mod feedback;
mod identity;
mod relay;
mod status;
mod wake;

pub use config::handle_update_config;
pub use feedback::{handle_buzzer, handle_led};
pub use identity::{handle_identify_success, handle_pairing_required};
pub use relay::{handle_enqueue_task, handle_relay};
pub use status::{handle_capabilities, handle_relay_status, handle_wake_profiles};
pub use wake::{handle_wake, handle_wake_status};

use crate::config::NodeConfig;
use crate::hardware::Annunciator;
use crate::identity::DeviceIdentity;
use crate::relay::RelayBank;
use crate::store::ProfileStore;
use crate::tasks::TaskQueue;
use crate::wake::{LivenessMonitor, WakeRegistry, WakeSender};
use tokio::sync::mpsc;
use tracing::error;

/// Everything a handler may touch. Handlers run one at a time on the control
/// loop, so plain mutable borrows are enough; there is no shared state.
pub struct HandlerContext<'a> {
    pub config: &'a mut NodeConfig,
    pub identity: &'a mut DeviceIdentity,
    pub registry: &'a mut WakeRegistry,
    pub relays: &'a mut RelayBank,
    pub tasks: &'a mut TaskQueue,
    pub store: &'a dyn ProfileStore,
    pub monitor: &'a LivenessMonitor,
    pub wake_sender: &'a dyn WakeSender,
    pub annunciator: &'a mut dyn Annunciator,
    pub outbound: &'a mpsc::Sender<String>,
}

impl HandlerContext<'_> {
    /// Queue a reply frame for the server
    pub async fn send(&self, line: String) {
        if let Err(e) = self.outbound.send(line).await {
            error!("failed to queue reply frame: {}", e);
        }
    }
}
