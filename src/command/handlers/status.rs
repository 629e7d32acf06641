//! Query command handlers

use super::HandlerContext;
use wolhub_shared::wire;

pub async fn handle_capabilities(ctx: &mut HandlerContext<'_>) {
    let frame = wire::capabilities(
        ctx.identity.device_id(),
        &ctx.config.version,
        ctx.relays.len(),
        &ctx.registry.names(),
    );
    ctx.send(frame).await;
}

pub async fn handle_relay_status(ctx: &mut HandlerContext<'_>) {
    let frame = wire::relay_status(ctx.identity.device_id(), &ctx.relays.snapshot());
    ctx.send(frame).await;
}

pub async fn handle_wake_profiles(ctx: &mut HandlerContext<'_>) {
    let frame = wire::wol_profiles(ctx.identity.device_id(), &ctx.registry.reports());
    ctx.send(frame).await;
}
