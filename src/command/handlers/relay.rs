//! Relay command handlers

use super::HandlerContext;
use std::time::Instant;
use tracing::warn;
use wolhub_shared::wire::{self, RelayAction, RelaySelector};

/// Apply a relay command through the debounce gate.
///
/// Every channel that actually changed is confirmed with a
/// `relay:<idx>:<state> id:<deviceId>` line. Suppressed writes stay silent;
/// the server's view is only updated when the hardware moved.
pub async fn handle_relay(
    ctx: &mut HandlerContext<'_>,
    selector: RelaySelector,
    action: RelayAction,
    now: Instant,
) {
    let indices: Vec<usize> = match selector {
        RelaySelector::One(index) => {
            if index >= ctx.relays.len() {
                warn!("relay index {} out of range, ignoring", index);
                return;
            }
            vec![index]
        }
        RelaySelector::All => (0..ctx.relays.len()).collect(),
    };

    for index in indices {
        let result = match action {
            RelayAction::On => ctx.relays.set(index, true, now),
            RelayAction::Off => ctx.relays.set(index, false, now),
            RelayAction::Toggle => ctx.relays.toggle(index, now),
        };

        match result {
            Ok(true) => {
                let on = ctx.relays.is_on(index).unwrap_or(false);
                ctx.send(wire::relay_reply(index, on, ctx.identity.device_id()))
                    .await;
            }
            Ok(false) => {} // debounced
            Err(e) => warn!("relay {} drive failed: {}", index, e),
        }
    }
}

/// Buffer a relay task from a JSON `type=command` frame. Tasks are drained on
/// the heartbeat cadence, not here.
pub async fn handle_enqueue_task(
    ctx: &mut HandlerContext<'_>,
    task_id: String,
    channel: usize,
    on: bool,
    now: Instant,
) {
    ctx.tasks.push(task_id, channel, on, now);
}
