mod command;
mod config;
mod connection;
mod hardware;
mod identity;
mod probe;
mod relay;
mod store;
mod tasks;
mod wake;

use command::{Dispatcher, HandlerContext};
use config::NodeConfig;
use connection::{ConnectionConfig, ConnectionEvent, ConnectionManager};
use hardware::{LoggingAnnunciator, LoggingRelayDriver};
use identity::DeviceIdentity;
use probe::TcpProber;
use relay::RelayBank;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use store::FileStore;
use tasks::TaskQueue;
use wake::{LivenessMonitor, UdpWakeSender, WakeRegistry};

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wolhub_shared::state_machine::Tier;
use wolhub_shared::{limits, timing, wire};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("wolhub.json"));
    let mut config = NodeConfig::load(&config_path)?;

    info!("wolhub node starting: {}", config.device_id);
    info!("  server: {}", config.server_addr);
    info!("  relays: {}", config.relay_count);

    let store = FileStore::new(&config.data_dir);
    let mut identity = DeviceIdentity::load(&config.device_id, &store);

    let mut registry = WakeRegistry::new(limits::MAX_WAKE_TARGETS, config.default_broadcast);
    registry.load(&config.default_wake_targets, &store);

    let mut relays = RelayBank::new(config.relay_count, Box::new(LoggingRelayDriver));
    let mut tasks = TaskQueue::new(limits::MAX_TASK_QUEUE);
    let mut annunciator = LoggingAnnunciator;
    let wake_sender = UdpWakeSender;

    let mut conn = ConnectionManager::new(ConnectionConfig {
        server_addr: config.server_addr.clone(),
        ..Default::default()
    });
    let outbound = conn.sender();

    let monitor = LivenessMonitor::new(Arc::new(TcpProber::default()), outbound.clone());
    let mut dispatcher = Dispatcher::new(&config.device_id);

    let start = Instant::now();
    let mut fast_scan = tokio::time::interval(Duration::from_millis(timing::FAST_SCAN_MS));
    let mut slow_scan = tokio::time::interval(Duration::from_millis(timing::SLOW_SCAN_MS));
    let mut idle_scan = tokio::time::interval(Duration::from_millis(timing::IDLE_SCAN_MS));
    let mut heartbeat_period = Duration::from_millis(config.heartbeat_interval_ms);
    let mut heartbeat = tokio::time::interval(heartbeat_period);

    // Single control loop: inbound frames, monitor tiers and the heartbeat
    // all run here, so handlers and scans never observe each other mid-step.
    loop {
        tokio::select! {
            event = conn.recv() => match event {
                Some(ConnectionEvent::Connected) => {
                    info!("connected, identifying (paired: {})", identity.is_paired());
                    if let Err(e) = conn.send(identity.identify_frame()).await {
                        error!("failed to send identify: {}", e);
                    }
                }
                Some(ConnectionEvent::Received(line)) => {
                    let mut ctx = HandlerContext {
                        config: &mut config,
                        identity: &mut identity,
                        registry: &mut registry,
                        relays: &mut relays,
                        tasks: &mut tasks,
                        store: &store,
                        monitor: &monitor,
                        wake_sender: &wake_sender,
                        annunciator: &mut annunciator,
                        outbound: &outbound,
                    };
                    dispatcher.dispatch(&line, &mut ctx, Instant::now()).await;

                    // update_config may have changed the heartbeat cadence
                    let configured = Duration::from_millis(config.heartbeat_interval_ms);
                    if configured != heartbeat_period {
                        info!("heartbeat interval now {:?}", configured);
                        heartbeat_period = configured;
                        heartbeat = tokio::time::interval(configured);
                        heartbeat.reset();
                    }
                }
                Some(ConnectionEvent::Disconnected { reason }) => {
                    warn!("disconnected: {}", reason);
                }
                Some(ConnectionEvent::ConnectionFailed { reason }) => {
                    warn!("connection failed: {}", reason);
                }
                None => {
                    error!("connection manager closed");
                    break;
                }
            },

            _ = fast_scan.tick() => {
                monitor.scan(Tier::Fast, &mut registry, Instant::now()).await;
            }

            _ = slow_scan.tick() => {
                monitor.scan(Tier::Slow, &mut registry, Instant::now()).await;
            }

            _ = idle_scan.tick() => {
                monitor.scan(Tier::Idle, &mut registry, Instant::now()).await;
            }

            _ = heartbeat.tick() => {
                let now = Instant::now();

                // drain buffered relay tasks on the heartbeat cadence
                for (channel, on) in tasks.process(&mut relays, now) {
                    let reply = wire::relay_reply(channel, on, identity.device_id());
                    if let Err(e) = outbound.send(reply).await {
                        error!("failed to queue task confirmation: {}", e);
                    }
                }

                let frame = wire::heartbeat(
                    identity.device_id(),
                    &config.device_name,
                    start.elapsed().as_millis() as u64,
                    &relays.snapshot(),
                );
                if let Err(e) = outbound.send(frame).await {
                    error!("failed to queue heartbeat: {}", e);
                }
            }
        }
    }

    Ok(())
}
