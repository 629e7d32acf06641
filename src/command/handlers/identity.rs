//! Pairing handshake handlers

use super::HandlerContext;

/// The server wants this node paired: adopt the session token and identify
/// again so the server can match the pairing attempt.
pub async fn handle_pairing_required(ctx: &mut HandlerContext<'_>, token: String) {
    ctx.identity.set_pairing_token(token);
    ctx.send(ctx.identity.identify_frame()).await;
}

pub async fn handle_identify_success(
    ctx: &mut HandlerContext<'_>,
    persistent_token: Option<String>,
) {
    ctx.identity.complete_pairing(persistent_token, ctx.store);
}
