//! Wake-target management: registry, liveness monitor, wake packets

pub mod monitor;
pub mod registry;
pub mod wol;

pub use monitor::LivenessMonitor;
pub use registry::{RegistryError, WakeRegistry, WakeTarget};
pub use wol::{magic_packet, UdpWakeSender, WakeSender};
