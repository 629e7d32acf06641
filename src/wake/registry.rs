//! Wake-target registry and profile reconciliation
//!
//! The registry merges two sources of truth: wake targets compiled into the
//! firmware and the persisted profile list edited at runtime. The merge is a
//! pure function; the registry itself only holds the merged result and swaps
//! it wholesale when a new profile list is accepted.

use crate::store::ProfileStore;
use serde::de::Error as _;
use std::net::Ipv4Addr;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};
use wolhub_shared::wire::{MacAddr, ProfileReport, WakeProfile, WakeState};

/// Store location of the persisted profile blob
pub const STORE_NAMESPACE: &str = "wol";
pub const STORE_KEY: &str = "profiles";

/// Errors from `replace_all`
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("profiles payload is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("profiles payload is not a JSON array")]
    NotAnArray,

    #[error("profile store write failed: {0}")]
    Store(#[source] anyhow::Error),
}

/// A configured wake-target peer
#[derive(Debug, Clone)]
pub struct WakeTarget {
    pub name: String,
    pub mac: MacAddr,
    /// `None` means the address is unknown; probing is short-circuited
    pub addr: Option<Ipv4Addr>,
    pub broadcast: Ipv4Addr,
    pub port: u16,
    pub state: WakeState,
    /// Set when a wake is triggered, cleared when the target reaches Running
    pub boot_started: Option<Instant>,
}

impl WakeTarget {
    fn from_profile(profile: &WakeProfile, default_broadcast: Ipv4Addr) -> Self {
        Self {
            name: profile.name.clone(),
            mac: profile.mac,
            addr: profile.known_addr(),
            broadcast: profile
                .broadcast_ip
                .filter(|ip| !ip.is_unspecified())
                .unwrap_or(default_broadcast),
            port: profile.effective_port(),
            state: WakeState::Offline,
            boot_started: None,
        }
    }

    /// Profile plus live status, for `wol_profiles` replies
    pub fn report(&self) -> ProfileReport {
        ProfileReport {
            name: self.name.clone(),
            mac: self.mac,
            ip: self.addr,
            broadcast_ip: self.broadcast,
            port: self.port,
            status: self.state.as_str(),
        }
    }
}

/// Merge compiled-in defaults with the persisted profile list.
///
/// Persisted entries win on everything except an unknown target address: a
/// default sharing the hardware address donates its known address, so the
/// compiled-in address keeps working after the user edits names or ports.
/// Defaults whose hardware address is absent from the persisted set are
/// prepended in their compiled order. The result is truncated to `capacity`.
pub fn reconcile(
    defaults: &[WakeProfile],
    persisted: Option<&[WakeProfile]>,
    capacity: usize,
) -> Vec<WakeProfile> {
    let mut merged: Vec<WakeProfile> = Vec::new();

    match persisted {
        None => merged.extend_from_slice(defaults),
        Some(persisted) => {
            for default in defaults {
                if !persisted.iter().any(|p| p.mac == default.mac) {
                    merged.push(default.clone());
                }
            }
            for profile in persisted {
                let mut profile = profile.clone();
                if profile.known_addr().is_none() {
                    if let Some(donor) = defaults
                        .iter()
                        .find(|d| d.mac == profile.mac && d.known_addr().is_some())
                    {
                        profile.ip = donor.known_addr();
                    }
                }
                merged.push(profile);
            }
        }
    }

    merged.retain(|p| {
        if p.name.is_empty() {
            warn!("dropping wake profile with empty name ({})", p.mac);
            false
        } else {
            true
        }
    });

    if merged.len() > capacity {
        warn!(
            "wake registry capacity exceeded: keeping {} of {} profiles",
            capacity,
            merged.len()
        );
        merged.truncate(capacity);
    }

    merged
}

/// Owns the merged set of wake targets
pub struct WakeRegistry {
    targets: Vec<WakeTarget>,
    capacity: usize,
    default_broadcast: Ipv4Addr,
}

impl WakeRegistry {
    pub fn new(capacity: usize, default_broadcast: Ipv4Addr) -> Self {
        Self {
            targets: Vec::new(),
            capacity,
            default_broadcast,
        }
    }

    /// Build the registry at startup from defaults plus the persisted blob.
    ///
    /// When nothing usable is persisted, the compiled defaults become the new
    /// baseline and are written back, so later partial edits merge against
    /// something authoritative. A store failure here only loses the
    /// write-back; the in-memory registry is still populated.
    pub fn load(&mut self, defaults: &[WakeProfile], store: &dyn ProfileStore) {
        let persisted = match store.get(STORE_NAMESPACE, STORE_KEY) {
            Ok(Some(blob)) => match parse_profiles(&blob) {
                Ok(profiles) => Some(profiles),
                Err(e) => {
                    warn!("persisted wake profiles unreadable, using defaults: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("profile store unavailable, using defaults: {}", e);
                None
            }
        };

        let had_persisted = persisted.is_some();
        let merged = reconcile(defaults, persisted.as_deref(), self.capacity);

        if !had_persisted {
            match serde_json::to_string(&merged) {
                Ok(blob) => {
                    if let Err(e) = store.put(STORE_NAMESPACE, STORE_KEY, &blob) {
                        warn!("failed to write default wake profiles back: {}", e);
                    } else {
                        info!("persisted compiled-in wake profiles as baseline");
                    }
                }
                Err(e) => warn!("failed to serialize default wake profiles: {}", e),
            }
        }

        self.targets = merged
            .iter()
            .map(|p| WakeTarget::from_profile(p, self.default_broadcast))
            .collect();
        info!("wake registry loaded: {} targets", self.targets.len());
    }

    /// Replace the whole profile list from an inbound JSON payload.
    ///
    /// The payload must be a JSON array; anything else fails the call
    /// atomically with no store write. Individual entries that do not parse
    /// are skipped. On success the store is overwritten and the registry
    /// rebuilt via [`reconcile`]; the returned count is the number of
    /// accepted entries that survived into the registry (so capacity
    /// truncation is observable).
    pub fn replace_all(
        &mut self,
        json: &str,
        defaults: &[WakeProfile],
        store: &dyn ProfileStore,
    ) -> Result<usize, RegistryError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let entries = value.as_array().ok_or(RegistryError::NotAnArray)?;

        let mut accepted: Vec<WakeProfile> = Vec::new();
        for entry in entries {
            match serde_json::from_value::<WakeProfile>(entry.clone()) {
                Ok(profile) if profile.name.is_empty() => {
                    warn!("skipping wake profile with empty name");
                }
                Ok(profile) => accepted.push(profile),
                Err(e) => warn!("skipping malformed wake profile: {}", e),
            }
        }

        let blob = serde_json::to_string(&accepted)?;
        store
            .put(STORE_NAMESPACE, STORE_KEY, &blob)
            .map_err(RegistryError::Store)?;

        // Build the new list fully before swapping it in
        let merged = reconcile(defaults, Some(&accepted), self.capacity);
        let kept = accepted
            .iter()
            .filter(|a| merged.iter().any(|m| m.mac == a.mac))
            .count();

        self.targets = merged
            .iter()
            .map(|p| WakeTarget::from_profile(p, self.default_broadcast))
            .collect();

        info!(
            "wake profiles replaced: {} accepted, {} targets in registry",
            kept,
            self.targets.len()
        );
        Ok(kept)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&WakeTarget> {
        self.targets.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut WakeTarget> {
        self.targets.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WakeTarget> {
        self.targets.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut WakeTarget> {
        self.targets.iter_mut()
    }

    /// Target names for capability frames
    pub fn names(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.name.clone()).collect()
    }

    /// Profiles plus live status for `wol_profiles` replies
    pub fn reports(&self) -> Vec<ProfileReport> {
        self.targets.iter().map(WakeTarget::report).collect()
    }
}

/// Parse a persisted blob leniently: the array must parse, bad entries are
/// dropped (the blob was written by us, so this only fires after corruption
/// or a schema change).
fn parse_profiles(blob: &str) -> Result<Vec<WakeProfile>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(blob)?;
    let entries = value
        .as_array()
        .ok_or_else(|| serde_json::Error::custom("not an array"))?;

    Ok(entries
        .iter()
        .filter_map(|entry| match serde_json::from_value(entry.clone()) {
            Ok(profile) => Some(profile),
            Err(e) => {
                debug!("dropping persisted wake profile: {}", e);
                None
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BrokenStore, MemoryStore};

    fn default_profiles() -> Vec<WakeProfile> {
        vec![
            WakeProfile {
                name: "Server".into(),
                mac: "94:C6:91:9C:49:A1".parse().unwrap(),
                ip: Some(Ipv4Addr::new(192, 168, 1, 37)),
                broadcast_ip: None,
                port: 9,
            },
            WakeProfile {
                name: "Main".into(),
                mac: "E8:9C:25:C6:B8:26".parse().unwrap(),
                ip: Some(Ipv4Addr::new(192, 168, 1, 11)),
                broadcast_ip: None,
                port: 9,
            },
        ]
    }

    fn broadcast() -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 1, 255)
    }

    #[test]
    fn test_reconcile_no_persisted_uses_defaults() {
        let defaults = default_profiles();
        let merged = reconcile(&defaults, None, 10);
        assert_eq!(merged, defaults);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let defaults = default_profiles();
        let persisted = vec![WakeProfile {
            name: "Renamed".into(),
            mac: "E8:9C:25:C6:B8:26".parse().unwrap(),
            ip: None,
            broadcast_ip: None,
            port: 7,
        }];

        let once = reconcile(&defaults, Some(&persisted), 10);
        let twice = reconcile(&defaults, Some(&persisted), 10);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_reconcile_address_fallback() {
        // persisted entry lost its address; the default with the same MAC
        // donates 192.168.1.11
        let defaults = default_profiles();
        let persisted = vec![WakeProfile {
            name: "Main".into(),
            mac: "E8:9C:25:C6:B8:26".parse().unwrap(),
            ip: Some(Ipv4Addr::new(0, 0, 0, 0)),
            broadcast_ip: None,
            port: 9,
        }];

        let merged = reconcile(&defaults, Some(&persisted), 10);
        let main = merged.iter().find(|p| p.name == "Main").expect("Main missing");
        assert_eq!(main.ip, Some(Ipv4Addr::new(192, 168, 1, 11)));
    }

    #[test]
    fn test_reconcile_prepends_missing_defaults() {
        let defaults = default_profiles();
        let persisted = vec![WakeProfile {
            name: "NAS".into(),
            mac: "00:11:22:33:44:55".parse().unwrap(),
            ip: Some(Ipv4Addr::new(192, 168, 1, 50)),
            broadcast_ip: None,
            port: 9,
        }];

        let merged = reconcile(&defaults, Some(&persisted), 10);
        assert_eq!(merged.len(), 3);
        // defaults first, in compiled order, then the persisted entry
        assert_eq!(merged[0].name, "Server");
        assert_eq!(merged[1].name, "Main");
        assert_eq!(merged[2].name, "NAS");
    }

    #[test]
    fn test_reconcile_truncates_to_capacity() {
        let defaults = default_profiles();
        let merged = reconcile(&defaults, None, 1);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "Server");
    }

    #[test]
    fn test_load_writes_baseline_when_store_empty() {
        let store = MemoryStore::new();
        let mut registry = WakeRegistry::new(10, broadcast());
        registry.load(&default_profiles(), &store);

        assert_eq!(registry.len(), 2);
        let blob = store
            .get(STORE_NAMESPACE, STORE_KEY)
            .expect("get failed")
            .expect("baseline not written");
        let parsed = parse_profiles(&blob).expect("baseline unreadable");
        assert_eq!(parsed, default_profiles());
    }

    #[test]
    fn test_load_merges_persisted_overrides() {
        let store = MemoryStore::new();
        store
            .put(
                STORE_NAMESPACE,
                STORE_KEY,
                r#"[{"name":"Main renamed","mac":"E8:9C:25:C6:B8:26","ip":"0.0.0.0","port":7}]"#,
            )
            .expect("put failed");

        let mut registry = WakeRegistry::new(10, broadcast());
        registry.load(&default_profiles(), &store);

        assert_eq!(registry.len(), 2);
        let renamed = registry
            .iter()
            .find(|t| t.name == "Main renamed")
            .expect("override missing");
        assert_eq!(renamed.port, 7);
        // unknown address adopted from the default
        assert_eq!(renamed.addr, Some(Ipv4Addr::new(192, 168, 1, 11)));
        assert_eq!(renamed.state, WakeState::Offline);
        assert!(renamed.boot_started.is_none());
    }

    #[test]
    fn test_replace_all_rejects_non_array_atomically() {
        let store = MemoryStore::new();
        let defaults = default_profiles();
        let mut registry = WakeRegistry::new(10, broadcast());
        registry.load(&defaults, &store);
        let before = store.get(STORE_NAMESPACE, STORE_KEY).unwrap();

        let result = registry.replace_all("\"not-an-array\"", &defaults, &store);
        assert!(matches!(result, Err(RegistryError::NotAnArray)));

        // registry and store untouched
        assert_eq!(registry.len(), 2);
        assert_eq!(store.get(STORE_NAMESPACE, STORE_KEY).unwrap(), before);
    }

    #[test]
    fn test_replace_all_skips_bad_entries() {
        let store = MemoryStore::new();
        let defaults = default_profiles();
        let mut registry = WakeRegistry::new(10, broadcast());
        registry.load(&defaults, &store);

        let payload = r#"[
            {"name":"Good","mac":"AA:BB:CC:DD:EE:01","ip":"192.168.1.60"},
            {"name":"BadMac","mac":"zz:zz"},
            {"name":"","mac":"AA:BB:CC:DD:EE:02"}
        ]"#;
        let kept = registry
            .replace_all(payload, &defaults, &store)
            .expect("replace failed");
        assert_eq!(kept, 1);
        assert!(registry.iter().any(|t| t.name == "Good"));
    }

    #[test]
    fn test_replace_all_store_failure_leaves_registry() {
        let defaults = default_profiles();
        let mut registry = WakeRegistry::new(10, broadcast());
        registry.load(&defaults, &MemoryStore::new());

        let result = registry.replace_all(
            r#"[{"name":"New","mac":"AA:BB:CC:DD:EE:01"}]"#,
            &defaults,
            &BrokenStore,
        );
        assert!(matches!(result, Err(RegistryError::Store(_))));
        assert!(registry.iter().all(|t| t.name != "New"));
    }

    #[test]
    fn test_replace_all_count_reflects_truncation() {
        let store = MemoryStore::new();
        let defaults: Vec<WakeProfile> = Vec::new();
        let mut registry = WakeRegistry::new(2, broadcast());
        registry.load(&defaults, &store);

        let payload = r#"[
            {"name":"A","mac":"AA:BB:CC:DD:EE:01"},
            {"name":"B","mac":"AA:BB:CC:DD:EE:02"},
            {"name":"C","mac":"AA:BB:CC:DD:EE:03"}
        ]"#;
        let kept = registry
            .replace_all(payload, &defaults, &store)
            .expect("replace failed");
        assert_eq!(kept, 2);
        assert_eq!(registry.len(), 2);
    }
}
