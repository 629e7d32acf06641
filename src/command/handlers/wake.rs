//! Wake-on-LAN command handlers

use super::HandlerContext;
use crate::wake::wol::magic_packet;
use std::time::Instant;
use tracing::{info, warn};
use wolhub_shared::wire::{self, WakeState};

/// Trigger a wake for the target at `index`.
///
/// Sends the magic packet, moves the target to Booting and stamps the boot
/// start; the fast monitor tier takes it from there. A wake may be triggered
/// from any state, so a Failed target gets a fresh boot window.
pub async fn handle_wake(ctx: &mut HandlerContext<'_>, index: usize, now: Instant) {
    let Some(target) = ctx.registry.get(index) else {
        warn!("wake index {} out of range, ignoring", index);
        return;
    };

    let packet = magic_packet(&target.mac);
    let (name, broadcast, port) = (target.name.clone(), target.broadcast, target.port);

    if let Err(e) = ctx.wake_sender.send_magic(&packet, broadcast, port).await {
        warn!("wake packet for {} failed: {}", name, e);
        return;
    }

    info!("wake packet sent to {} via {}:{}", name, broadcast, port);

    let target = ctx.registry.get_mut(index).expect("index checked above");
    target.state = WakeState::Booting;
    target.boot_started = Some(now);

    ctx.send(wire::status_line(&name, WakeState::Booting)).await;
}

/// Immediate full status refresh for every target
pub async fn handle_wake_status(ctx: &mut HandlerContext<'_>) {
    ctx.monitor.full_snapshot(ctx.registry).await;
}
