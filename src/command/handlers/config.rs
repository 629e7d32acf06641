//! `update_config` handler

use super::HandlerContext;
use tracing::{info, warn};
use wolhub_shared::wire;

/// Apply a config mutation and acknowledge it with `config_applied`.
///
/// The token check runs first; a rejected frame changes nothing. Profile
/// replacement is atomic per payload: a malformed list leaves both the
/// registry and the store as they were.
pub async fn handle_update_config(
    ctx: &mut HandlerContext<'_>,
    token: Option<String>,
    config: serde_json::Value,
) {
    let device_id = ctx.identity.device_id().to_string();

    if let Err(e) = ctx
        .identity
        .authorize(token.as_deref(), ctx.config.token_policy)
    {
        warn!("update_config rejected: {}", e);
        ctx.send(wire::config_applied(&device_id, false, &e.to_string()))
            .await;
        return;
    }

    let mut applied = Vec::new();

    if let Some(profiles) = config.get("wol_profiles") {
        let payload = profiles.to_string();
        match ctx
            .registry
            .replace_all(&payload, &ctx.config.default_wake_targets, ctx.store)
        {
            Ok(count) => applied.push(format!("{count} wake profiles")),
            Err(e) => {
                warn!("wake profile replacement rejected: {}", e);
                ctx.send(wire::config_applied(&device_id, false, &e.to_string()))
                    .await;
                return;
            }
        }
    }

    if let Some(name) = config.get("deviceName").and_then(|v| v.as_str()) {
        if !name.is_empty() {
            ctx.config.device_name = name.to_string();
            applied.push("device name".into());
        }
    }

    if let Some(interval) = config.get("heartbeatInterval").and_then(|v| v.as_u64()) {
        // anything below a second would flood the link
        ctx.config.heartbeat_interval_ms = interval.max(1_000);
        applied.push("heartbeat interval".into());
    }

    let message = if applied.is_empty() {
        "no recognized settings".to_string()
    } else {
        format!("applied {}", applied.join(", "))
    };
    info!("update_config: {}", message);
    ctx.send(wire::config_applied(&device_id, true, &message))
        .await;
}
