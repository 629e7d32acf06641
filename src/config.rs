//! Node configuration
//!
//! Built-in defaults describe the device the firmware was flashed for; an
//! optional JSON config file overrides them in the field. Missing fields fall
//! back to the compiled defaults so a partial file is always usable.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use wolhub_shared::wire::WakeProfile;
use wolhub_shared::{limits, timing};

/// Policy for `update_config` frames arriving without a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPolicy {
    /// Accept and warn. Compatibility with controllers that predate tokens.
    #[default]
    AllowMissing,
    /// Reject with an auth error.
    Require,
}

/// Configuration for a wolhub node
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Stable device identifier, unique per node
    pub device_id: String,
    /// Human-readable device name
    pub device_name: String,
    /// Firmware version reported in capability frames
    pub version: String,
    /// Control server address
    pub server_addr: String,
    /// Number of relay channels on this board
    pub relay_count: usize,
    /// Directory for the profile store
    pub data_dir: PathBuf,
    /// Token policy for `update_config`
    pub token_policy: TokenPolicy,
    /// Heartbeat emission interval in milliseconds, runtime-adjustable via
    /// `update_config`
    pub heartbeat_interval_ms: u64,
    /// Broadcast address used when a wake profile does not carry one
    pub default_broadcast: Ipv4Addr,
    /// Compiled-in wake targets, merged with persisted profiles at startup
    pub default_wake_targets: Vec<WakeProfile>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            device_id: "wolhub-01".into(),
            device_name: "WOLHUB".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            server_addr: "127.0.0.1:5131".into(),
            relay_count: limits::DEFAULT_RELAY_COUNT,
            data_dir: PathBuf::from("data"),
            token_policy: TokenPolicy::default(),
            heartbeat_interval_ms: timing::HEARTBEAT_INTERVAL_MS,
            default_broadcast: Ipv4Addr::new(192, 168, 1, 255),
            default_wake_targets: default_wake_targets(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from a JSON file, if it exists
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: NodeConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }
}

/// Wake targets baked into the firmware image
fn default_wake_targets() -> Vec<WakeProfile> {
    let broadcast = Some(Ipv4Addr::new(192, 168, 1, 255));
    vec![
        WakeProfile {
            name: "Server".into(),
            mac: "94:C6:91:9C:49:A1".parse().expect("bad built-in mac"),
            ip: Some(Ipv4Addr::new(192, 168, 1, 37)),
            broadcast_ip: broadcast,
            port: 9,
        },
        WakeProfile {
            name: "B350".into(),
            mac: "30:9C:23:03:DE:E5".parse().expect("bad built-in mac"),
            ip: Some(Ipv4Addr::new(192, 168, 1, 38)),
            broadcast_ip: broadcast,
            port: 9,
        },
        WakeProfile {
            name: "Main".into(),
            mac: "E8:9C:25:C6:B8:26".parse().expect("bad built-in mac"),
            ip: Some(Ipv4Addr::new(192, 168, 1, 11)),
            broadcast_ip: broadcast,
            port: 9,
        },
    ]
}
