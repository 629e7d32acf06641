//! Frame dispatcher: parse, filter, dedupe, route
//!
//! One entry point for every inbound frame. A frame that fails to parse gets
//! an error acknowledgment; a frame addressed to a different device is
//! dropped; a relay line identical to the previous one inside the duplicate
//! window is dropped (some controllers double-send on flaky links).

use super::handlers::{self, HandlerContext};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use wolhub_shared::timing;
use wolhub_shared::wire::{self, Frame, Inbound};

pub struct Dispatcher {
    device_id: String,
    last_relay: Option<(String, Instant)>,
    duplicate_window: Duration,
}

impl Dispatcher {
    pub fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            last_relay: None,
            duplicate_window: Duration::from_millis(timing::DUPLICATE_WINDOW_MS),
        }
    }

    /// Handle one raw inbound frame
    pub async fn dispatch(&mut self, raw: &str, ctx: &mut HandlerContext<'_>, now: Instant) {
        // targeting filter first: a frame for another node gets no reaction
        // from us, not even an error ack on a broadcast channel
        if let Some(target) = wire::frame_target(raw) {
            if target != self.device_id {
                debug!("frame for {} ignored (we are {})", target, self.device_id);
                return;
            }
        }

        let frame = match Frame::parse(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("unparseable frame {:?}: {}", raw, e);
                ctx.send(wire::error_ack(&self.device_id, &e.to_string()))
                    .await;
                return;
            }
        };

        if matches!(frame.command, Inbound::Relay { .. }) && self.is_duplicate(raw, now) {
            debug!("duplicate relay frame suppressed: {:?}", raw);
            return;
        }

        match frame.command {
            Inbound::Relay { selector, action } => {
                handlers::handle_relay(ctx, selector, action, now).await;
            }
            Inbound::RelayStatus => handlers::handle_relay_status(ctx).await,
            Inbound::Wake { index } => handlers::handle_wake(ctx, index, now).await,
            Inbound::WakeStatus => handlers::handle_wake_status(ctx).await,
            Inbound::Capabilities => handlers::handle_capabilities(ctx).await,
            Inbound::WakeProfiles => handlers::handle_wake_profiles(ctx).await,
            Inbound::Led { on } => handlers::handle_led(ctx, on).await,
            Inbound::Buzzer {
                pitch,
                duration_ms,
                volume,
            } => handlers::handle_buzzer(ctx, pitch, duration_ms, volume).await,
            Inbound::UpdateConfig { token, config } => {
                handlers::handle_update_config(ctx, token, config).await;
            }
            Inbound::PairingRequired { token } => {
                handlers::handle_pairing_required(ctx, token).await;
            }
            Inbound::IdentifySuccess { persistent_token } => {
                handlers::handle_identify_success(ctx, persistent_token).await;
            }
            Inbound::EnqueueRelayTask {
                task_id,
                channel,
                on,
            } => {
                handlers::handle_enqueue_task(ctx, task_id, channel, on, now).await;
            }
        }
    }

    /// A relay line is a duplicate when the exact raw text repeats within the
    /// duplicate window.
    fn is_duplicate(&mut self, raw: &str, now: Instant) -> bool {
        if let Some((last_raw, last_at)) = &self.last_relay {
            if last_raw == raw && now.duration_since(*last_at) < self.duplicate_window {
                return true;
            }
        }
        self.last_relay = Some((raw.to_string(), now));
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::hardware::mock::{MockAnnunciator, MockRelayDriver};
    use crate::identity::DeviceIdentity;
    use crate::probe::fake::FakeProber;
    use crate::relay::RelayBank;
    use crate::store::{MemoryStore, ProfileStore};
    use crate::tasks::TaskQueue;
    use crate::wake::wol::mock::MockWakeSender;
    use crate::wake::{LivenessMonitor, WakeRegistry};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use wolhub_shared::wire::WakeState;

    /// Owns every collaborator a dispatch test needs
    struct Fixture {
        config: NodeConfig,
        identity: DeviceIdentity,
        registry: WakeRegistry,
        relays: RelayBank,
        tasks: TaskQueue,
        store: MemoryStore,
        monitor: LivenessMonitor,
        wake_sender: MockWakeSender,
        annunciator: MockAnnunciator,
        outbound: mpsc::Sender<String>,
        rx: mpsc::Receiver<String>,
        driver: MockRelayDriver,
    }

    impl Fixture {
        fn new() -> Self {
            let config = NodeConfig::default();
            let store = MemoryStore::new();
            let identity = DeviceIdentity::load(&config.device_id, &store);
            let mut registry = WakeRegistry::new(10, config.default_broadcast);
            registry.load(&config.default_wake_targets, &store);
            let driver = MockRelayDriver::default();
            let relays = RelayBank::new(config.relay_count, Box::new(driver.clone()));
            let (outbound, rx) = mpsc::channel(64);
            let monitor = LivenessMonitor::new(Arc::new(FakeProber::new()), outbound.clone());

            Self {
                config,
                identity,
                registry,
                relays,
                tasks: TaskQueue::new(10),
                store,
                monitor,
                wake_sender: MockWakeSender::default(),
                annunciator: MockAnnunciator::default(),
                outbound,
                rx,
                driver,
            }
        }

        fn ctx(&mut self) -> HandlerContext<'_> {
            HandlerContext {
                config: &mut self.config,
                identity: &mut self.identity,
                registry: &mut self.registry,
                relays: &mut self.relays,
                tasks: &mut self.tasks,
                store: &self.store,
                monitor: &self.monitor,
                wake_sender: &self.wake_sender,
                annunciator: &mut self.annunciator,
                outbound: &self.outbound,
            }
        }

        fn drain(&mut self) -> Vec<String> {
            let mut frames = Vec::new();
            while let Ok(frame) = self.rx.try_recv() {
                frames.push(frame);
            }
            frames
        }
    }

    async fn dispatch(
        dispatcher: &mut Dispatcher,
        fixture: &mut Fixture,
        raw: &str,
        now: Instant,
    ) {
        let mut ctx = fixture.ctx();
        dispatcher.dispatch(raw, &mut ctx, now).await;
    }

    #[tokio::test]
    async fn test_relay_on_confirmed() {
        let mut fixture = Fixture::new();
        let mut dispatcher = Dispatcher::new("wolhub-01");

        dispatch(&mut dispatcher, &mut fixture, "relay:3:on", Instant::now()).await;

        assert_eq!(fixture.relays.is_on(3), Some(true));
        assert_eq!(fixture.drain(), vec!["relay:3:on id:wolhub-01"]);
    }

    #[tokio::test]
    async fn test_relay_all_off_stays_silent_when_nothing_changes() {
        let mut fixture = Fixture::new();
        let mut dispatcher = Dispatcher::new("wolhub-01");

        // all channels already off
        dispatch(&mut dispatcher, &mut fixture, "relay:all:off", Instant::now()).await;
        assert!(fixture.drain().is_empty());
        assert!(fixture.driver.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_frame_for_other_device_dropped() {
        let mut fixture = Fixture::new();
        let mut dispatcher = Dispatcher::new("wolhub-01");

        dispatch(
            &mut dispatcher,
            &mut fixture,
            "relay:3:on id:wolhub-99",
            Instant::now(),
        )
        .await;

        assert_eq!(fixture.relays.is_on(3), Some(false));
        assert!(fixture.drain().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_relay_line_suppressed() {
        let mut fixture = Fixture::new();
        let mut dispatcher = Dispatcher::new("wolhub-01");
        let t0 = Instant::now();

        dispatch(&mut dispatcher, &mut fixture, "relay:2", t0).await;
        assert_eq!(fixture.relays.is_on(2), Some(true));
        fixture.drain();

        // same raw line 100ms later: dropped before the toggle runs
        dispatch(
            &mut dispatcher,
            &mut fixture,
            "relay:2",
            t0 + Duration::from_millis(100),
        )
        .await;
        assert_eq!(fixture.relays.is_on(2), Some(true));
        assert!(fixture.drain().is_empty());

        // outside the window the toggle goes through
        dispatch(
            &mut dispatcher,
            &mut fixture,
            "relay:2",
            t0 + Duration::from_millis(400),
        )
        .await;
        assert_eq!(fixture.relays.is_on(2), Some(false));
    }

    #[tokio::test]
    async fn test_wake_sends_packet_and_sets_booting() {
        let mut fixture = Fixture::new();
        let mut dispatcher = Dispatcher::new("wolhub-01");

        dispatch(&mut dispatcher, &mut fixture, "wol:1", Instant::now()).await;

        let target = fixture.registry.get(1).unwrap();
        assert_eq!(target.state, WakeState::Booting);
        assert!(target.boot_started.is_some());

        let sent = fixture.wake_sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (packet, broadcast, port) = &sent[0];
        assert_eq!(packet.len(), 102);
        assert_eq!(broadcast.to_string(), "192.168.1.255");
        assert_eq!(*port, 9);
        drop(sent);

        assert_eq!(fixture.drain(), vec!["status:B350:BOOTING"]);
    }

    #[tokio::test]
    async fn test_wake_out_of_range_is_silent() {
        let mut fixture = Fixture::new();
        let mut dispatcher = Dispatcher::new("wolhub-01");

        dispatch(&mut dispatcher, &mut fixture, "wol:99", Instant::now()).await;
        assert!(fixture.drain().is_empty());
        assert!(fixture.wake_sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_frame_gets_error_ack() {
        let mut fixture = Fixture::new();
        let mut dispatcher = Dispatcher::new("wolhub-01");

        dispatch(&mut dispatcher, &mut fixture, "selfdestruct", Instant::now()).await;

        let frames = fixture.drain();
        assert_eq!(frames.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&frames[0]).expect("bad ack");
        assert_eq!(value["type"], "ack");
        assert_eq!(value["status"], "error");
    }

    #[tokio::test]
    async fn test_unparseable_frame_for_other_device_stays_silent() {
        let mut fixture = Fixture::new();
        let mut dispatcher = Dispatcher::new("wolhub-01");

        // on a broadcast channel only the addressed node may complain
        dispatch(
            &mut dispatcher,
            &mut fixture,
            "selfdestruct id:wolhub-99",
            Instant::now(),
        )
        .await;
        assert!(fixture.drain().is_empty());

        // addressed to us, the error ack still goes out
        dispatch(
            &mut dispatcher,
            &mut fixture,
            "selfdestruct id:wolhub-01",
            Instant::now(),
        )
        .await;
        let frames = fixture.drain();
        assert_eq!(frames.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&frames[0]).expect("bad ack");
        assert_eq!(value["status"], "error");
    }

    #[tokio::test]
    async fn test_capabilities_reply() {
        let mut fixture = Fixture::new();
        let mut dispatcher = Dispatcher::new("wolhub-01");

        dispatch(&mut dispatcher, &mut fixture, "getCapabilities", Instant::now()).await;

        let frames = fixture.drain();
        let value: serde_json::Value = serde_json::from_str(&frames[0]).expect("bad frame");
        assert_eq!(value["type"], "capabilities");
        assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(value["relayCount"], 8);
        assert_eq!(value["wolDevices"][0], "Server");
    }

    #[tokio::test]
    async fn test_update_config_replaces_profiles() {
        let mut fixture = Fixture::new();
        let mut dispatcher = Dispatcher::new("wolhub-01");

        let raw = r#"{"type":"update_config","config":{"wol_profiles":[
            {"name":"NAS","mac":"00:11:22:33:44:55","ip":"192.168.1.50"}
        ]}}"#;
        dispatch(&mut dispatcher, &mut fixture, raw, Instant::now()).await;

        assert!(fixture.registry.iter().any(|t| t.name == "NAS"));
        let frames = fixture.drain();
        let value: serde_json::Value = serde_json::from_str(&frames[0]).expect("bad ack");
        assert_eq!(value["type"], "config_applied");
        assert_eq!(value["status"], "ok");
    }

    #[tokio::test]
    async fn test_update_config_applies_name_and_heartbeat() {
        let mut fixture = Fixture::new();
        let mut dispatcher = Dispatcher::new("wolhub-01");

        let raw = r#"{"type":"update_config","config":{"deviceName":"Rack A","heartbeatInterval":250}}"#;
        dispatch(&mut dispatcher, &mut fixture, raw, Instant::now()).await;

        assert_eq!(fixture.config.device_name, "Rack A");
        // sub-second intervals are raised to the floor
        assert_eq!(fixture.config.heartbeat_interval_ms, 1_000);
    }

    #[tokio::test]
    async fn test_update_config_token_required_policy() {
        let mut fixture = Fixture::new();
        fixture.config.token_policy = crate::config::TokenPolicy::Require;
        let mut dispatcher = Dispatcher::new("wolhub-01");

        let before = fixture.registry.len();
        let raw = r#"{"type":"update_config","config":{"wol_profiles":[]}}"#;
        dispatch(&mut dispatcher, &mut fixture, raw, Instant::now()).await;

        // rejected, registry untouched
        assert_eq!(fixture.registry.len(), before);
        let frames = fixture.drain();
        let value: serde_json::Value = serde_json::from_str(&frames[0]).expect("bad ack");
        assert_eq!(value["status"], "error");
    }

    #[tokio::test]
    async fn test_pairing_flow() {
        let mut fixture = Fixture::new();
        let mut dispatcher = Dispatcher::new("wolhub-01");

        dispatch(
            &mut dispatcher,
            &mut fixture,
            r#"{"type":"pairing_required","token":"session-t"}"#,
            Instant::now(),
        )
        .await;

        // re-identifies with the session token
        let frames = fixture.drain();
        let value: serde_json::Value = serde_json::from_str(&frames[0]).expect("bad frame");
        assert_eq!(value["type"], "identify");
        assert_eq!(value["token"], "session-t");

        dispatch(
            &mut dispatcher,
            &mut fixture,
            r#"{"type":"identify_success","persistent_token":"durable-t"}"#,
            Instant::now(),
        )
        .await;
        assert_eq!(fixture.identity.token(), Some("durable-t"));
        assert_eq!(
            fixture
                .store
                .get(crate::identity::STORE_NAMESPACE, crate::identity::STORE_KEY)
                .unwrap()
                .as_deref(),
            Some("durable-t")
        );
    }

    #[tokio::test]
    async fn test_buzzer_clamped_and_forwarded() {
        let mut fixture = Fixture::new();
        let mut dispatcher = Dispatcher::new("wolhub-01");

        let raw = r#"{"type":"buzzer","pitch":99999,"duration":60000,"volume":2.5}"#;
        dispatch(&mut dispatcher, &mut fixture, raw, Instant::now()).await;

        let beeps = fixture.annunciator.beeps.lock().unwrap();
        assert_eq!(beeps.as_slice(), &[(10_000, 5_000, 1.0)]);
    }

    #[tokio::test]
    async fn test_task_enqueued_not_applied() {
        let mut fixture = Fixture::new();
        let mut dispatcher = Dispatcher::new("wolhub-01");

        let raw = r#"{"type":"command","taskId":"t-1","action":"relay","relayId":4,"state":"on"}"#;
        dispatch(&mut dispatcher, &mut fixture, raw, Instant::now()).await;

        assert_eq!(fixture.tasks.len(), 1);
        assert_eq!(fixture.relays.is_on(4), Some(false));
    }
}
