//! Wire types for the node protocol
//!
//! Inbound frames are either a line-oriented text command, optionally
//! annotated with a trailing `id:<device>` targeting clause, or a JSON object
//! carrying a `"type"` discriminator. There is exactly one parser for both
//! forms; handlers never look at raw frame text.
//!
//! Outbound frames are the `status:`/`relay:` lines and the JSON messages
//! tagged `heartbeat`, `status`, `capabilities`, `wol_profiles`, `identify`
//! and `config_applied`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::json;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

use crate::limits;

/// Errors produced by the frame parser
#[derive(Error, Debug)]
pub enum WireError {
    #[error("Empty frame")]
    EmptyFrame,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Bad index in command: {0}")]
    BadIndex(String),

    #[error("Malformed JSON frame: {0}")]
    BadJson(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Bad hardware address: {0}")]
    BadMacAddr(String),
}

// ---------------- hardware address ----------------

/// A 6-byte link-layer address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddr {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut count = 0;

        for part in s.split([':', '-']) {
            if count == 6 || part.len() != 2 {
                return Err(WireError::BadMacAddr(s.into()));
            }
            octets[count] = u8::from_str_radix(part, 16)
                .map_err(|_| WireError::BadMacAddr(s.into()))?;
            count += 1;
        }

        if count != 6 {
            return Err(WireError::BadMacAddr(s.into()));
        }
        Ok(MacAddr(octets))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(D::Error::custom)
    }
}

// ---------------- wake target state ----------------

/// Status of a wake target as reported on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeState {
    Offline,
    Booting,
    Running,
    Failed,
}

impl WakeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WakeState::Offline => "OFFLINE",
            WakeState::Booting => "BOOTING",
            WakeState::Running => "RUNNING",
            WakeState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for WakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------- persisted profiles ----------------

/// One wake-target profile as persisted and as carried in `update_config`
///
/// `ip` of `0.0.0.0` (or absent) means the target address is unknown;
/// `port` of zero means the default wake port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeProfile {
    pub name: String,
    pub mac: MacAddr,
    #[serde(default)]
    pub ip: Option<Ipv4Addr>,
    #[serde(default)]
    pub broadcast_ip: Option<Ipv4Addr>,
    #[serde(default)]
    pub port: u16,
}

impl WakeProfile {
    /// Target address with the all-zero sentinel collapsed to None
    pub fn known_addr(&self) -> Option<Ipv4Addr> {
        self.ip.filter(|ip| !ip.is_unspecified())
    }

    /// Wake port with the zero sentinel replaced by the default
    pub fn effective_port(&self) -> u16 {
        if self.port == 0 {
            limits::DEFAULT_WAKE_PORT
        } else {
            self.port
        }
    }
}

// ---------------- inbound frames ----------------

/// Which relay channels a command addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaySelector {
    One(usize),
    All,
}

/// What to do with the addressed channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayAction {
    On,
    Off,
    Toggle,
}

/// A fully parsed inbound command
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Relay {
        selector: RelaySelector,
        action: RelayAction,
    },
    RelayStatus,
    Wake {
        index: usize,
    },
    WakeStatus,
    Capabilities,
    WakeProfiles,
    Led {
        on: bool,
    },
    Buzzer {
        pitch: Option<u32>,
        duration_ms: Option<u32>,
        volume: Option<f32>,
    },
    UpdateConfig {
        token: Option<String>,
        config: serde_json::Value,
    },
    PairingRequired {
        token: String,
    },
    IdentifySuccess {
        persistent_token: Option<String>,
    },
    /// Buffered relay task (JSON `type=command`)
    EnqueueRelayTask {
        task_id: String,
        channel: usize,
        on: bool,
    },
}

/// An inbound frame: the command plus its optional targeting clause
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub command: Inbound,
    /// Device id the frame was addressed to, if any
    pub target: Option<String>,
}

impl Frame {
    /// Parse a raw line into a frame
    pub fn parse(raw: &str) -> Result<Frame, WireError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(WireError::EmptyFrame);
        }

        if raw.starts_with('{') {
            return parse_json_frame(raw);
        }

        let (body, target) = split_target_clause(raw);
        let command = parse_line_command(body)?;
        Ok(Frame { command, target })
    }
}

/// Extract just the targeting clause of a raw frame, if any.
///
/// Works even when the command itself does not parse, so the targeting
/// filter can run before any error reply is produced.
pub fn frame_target(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.starts_with('{') {
        serde_json::from_str::<serde_json::Value>(raw)
            .ok()?
            .get("deviceId")?
            .as_str()
            .map(str::to_owned)
    } else {
        split_target_clause(raw).1
    }
}

/// Split a trailing ` id:<value>` clause off a line command
fn split_target_clause(raw: &str) -> (&str, Option<String>) {
    if let Some(pos) = raw.rfind(" id:") {
        let value = &raw[pos + 4..];
        if !value.is_empty() && !value.contains(' ') {
            return (raw[..pos].trim_end(), Some(value.to_owned()));
        }
    }
    (raw, None)
}

/// Parse the line-oriented command forms
///
/// More specific prefixes are matched before generic ones: `relay:all` must
/// be recognized before `relay:<idx>` parsing sees "all" as an index.
fn parse_line_command(body: &str) -> Result<Inbound, WireError> {
    if let Some(rest) = body.strip_prefix("relay:") {
        let (selector, action) = match rest.split_once(':') {
            Some(("all", suffix)) => (RelaySelector::All, parse_relay_action(suffix, body)?),
            Some((idx, suffix)) => (
                RelaySelector::One(parse_index(idx, body)?),
                parse_relay_action(suffix, body)?,
            ),
            None if rest == "all" => (RelaySelector::All, RelayAction::Toggle),
            None => (RelaySelector::One(parse_index(rest, body)?), RelayAction::Toggle),
        };
        return Ok(Inbound::Relay { selector, action });
    }

    if let Some(rest) = body.strip_prefix("wol:") {
        return Ok(Inbound::Wake {
            index: parse_index(rest, body)?,
        });
    }

    match body {
        "getRelayStatus" => Ok(Inbound::RelayStatus),
        "getWolStatus" => Ok(Inbound::WakeStatus),
        "getCapabilities" => Ok(Inbound::Capabilities),
        "getWOLProfiles" => Ok(Inbound::WakeProfiles),
        "led:on" => Ok(Inbound::Led { on: true }),
        "led:off" => Ok(Inbound::Led { on: false }),
        other => Err(WireError::UnknownCommand(other.to_owned())),
    }
}

fn parse_relay_action(suffix: &str, body: &str) -> Result<RelayAction, WireError> {
    match suffix {
        "on" => Ok(RelayAction::On),
        "off" => Ok(RelayAction::Off),
        "" => Ok(RelayAction::Toggle),
        _ => Err(WireError::UnknownCommand(body.to_owned())),
    }
}

fn parse_index(text: &str, body: &str) -> Result<usize, WireError> {
    text.parse()
        .map_err(|_| WireError::BadIndex(body.to_owned()))
}

/// JSON frame forms, discriminated by `"type"`
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum JsonFrame {
    #[serde(rename = "buzzer")]
    Buzzer {
        #[serde(default)]
        pitch: Option<u32>,
        #[serde(default)]
        duration: Option<u32>,
        #[serde(default)]
        volume: Option<f32>,
    },
    #[serde(rename = "update_config")]
    UpdateConfig {
        #[serde(default)]
        token: Option<String>,
        #[serde(default)]
        config: Option<serde_json::Value>,
    },
    #[serde(rename = "pairing_required")]
    PairingRequired { token: String },
    #[serde(rename = "identify_success")]
    IdentifySuccess {
        #[serde(default)]
        persistent_token: Option<String>,
    },
    #[serde(rename = "request_wol_profiles")]
    RequestWolProfiles {},
    #[serde(rename = "pull_wol_profiles")]
    PullWolProfiles {},
    #[serde(rename = "command")]
    Command {
        #[serde(rename = "taskId", default)]
        task_id: Option<String>,
        action: String,
        #[serde(rename = "relayId")]
        relay_id: usize,
        state: String,
    },
}

fn parse_json_frame(raw: &str) -> Result<Frame, WireError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;

    let target = value
        .get("deviceId")
        .and_then(|v| v.as_str())
        .map(str::to_owned);

    let command = match serde_json::from_value::<JsonFrame>(value)? {
        JsonFrame::Buzzer {
            pitch,
            duration,
            volume,
        } => Inbound::Buzzer {
            pitch,
            duration_ms: duration,
            volume,
        },
        JsonFrame::UpdateConfig { token, config } => Inbound::UpdateConfig {
            token: token.filter(|t| !t.is_empty()),
            config: config.ok_or(WireError::MissingField("config"))?,
        },
        JsonFrame::PairingRequired { token } => Inbound::PairingRequired { token },
        JsonFrame::IdentifySuccess { persistent_token } => Inbound::IdentifySuccess {
            persistent_token: persistent_token.filter(|t| !t.is_empty()),
        },
        JsonFrame::RequestWolProfiles {} | JsonFrame::PullWolProfiles {} => Inbound::WakeProfiles,
        JsonFrame::Command {
            task_id,
            action,
            relay_id,
            state,
        } => {
            if action != "relay" {
                return Err(WireError::UnknownCommand(format!("command action {action}")));
            }
            Inbound::EnqueueRelayTask {
                task_id: task_id.unwrap_or_default(),
                channel: relay_id,
                on: state == "on" || state == "true",
            }
        }
    };

    Ok(Frame { command, target })
}

// ---------------- outbound frames ----------------

/// Relay channel state as carried in heartbeat/status messages
#[derive(Debug, Clone, Serialize)]
pub struct RelayStateEntry {
    pub id: usize,
    pub state: bool,
}

/// A wake profile plus its live status, for `wol_profiles` replies
#[derive(Debug, Clone, Serialize)]
pub struct ProfileReport {
    pub name: String,
    pub mac: MacAddr,
    pub ip: Option<Ipv4Addr>,
    pub broadcast_ip: Ipv4Addr,
    pub port: u16,
    pub status: &'static str,
}

/// `status:<name>:<STATE>` line
pub fn status_line(name: &str, state: WakeState) -> String {
    format!("status:{name}:{state}")
}

/// `relay:<idx>:<on|off> id:<deviceId>` line
pub fn relay_reply(index: usize, on: bool, device_id: &str) -> String {
    let action = if on { "on" } else { "off" };
    format!("relay:{index}:{action} id:{device_id}")
}

/// Heartbeat JSON frame with the current relay states
pub fn heartbeat(
    device_id: &str,
    device_name: &str,
    uptime_ms: u64,
    relays: &[RelayStateEntry],
) -> String {
    json!({
        "type": "heartbeat",
        "deviceId": device_id,
        "deviceName": device_name,
        "status": "online",
        "uptime": uptime_ms,
        "relayStates": relays,
    })
    .to_string()
}

/// Full relay status JSON frame
pub fn relay_status(device_id: &str, relays: &[RelayStateEntry]) -> String {
    json!({
        "type": "status",
        "deviceId": device_id,
        "relayStates": relays,
    })
    .to_string()
}

/// Capability announcement: identity, firmware version, channel count,
/// wake-target names
pub fn capabilities(
    device_id: &str,
    version: &str,
    relay_count: usize,
    target_names: &[String],
) -> String {
    json!({
        "type": "capabilities",
        "deviceId": device_id,
        "version": version,
        "relayCount": relay_count,
        "wolDevices": target_names,
    })
    .to_string()
}

/// Full profile list including live status
pub fn wol_profiles(device_id: &str, profiles: &[ProfileReport]) -> String {
    json!({
        "type": "wol_profiles",
        "deviceId": device_id,
        "profiles": profiles,
    })
    .to_string()
}

/// Identity handshake, carrying a token once one is known
pub fn identify(device_id: &str, token: Option<&str>) -> String {
    match token {
        Some(token) => json!({
            "type": "identify",
            "deviceId": device_id,
            "token": token,
        }),
        None => json!({
            "type": "identify",
            "deviceId": device_id,
        }),
    }
    .to_string()
}

/// Acknowledgment for `update_config`
pub fn config_applied(device_id: &str, ok: bool, message: &str) -> String {
    json!({
        "type": "config_applied",
        "deviceId": device_id,
        "status": if ok { "ok" } else { "error" },
        "message": message,
    })
    .to_string()
}

/// Error acknowledgment for a frame that could not be parsed
pub fn error_ack(device_id: &str, message: &str) -> String {
    json!({
        "type": "ack",
        "deviceId": device_id,
        "status": "error",
        "message": message,
    })
    .to_string()
}
