//! Audio/visual feedback handlers
//!
//! The buzzer and status LED are pass-through collaborators; the only logic
//! here is clamping buzzer parameters to safe ranges before forwarding.

use super::HandlerContext;

const DEFAULT_PITCH_HZ: u32 = 2_000;
const DEFAULT_DURATION_MS: u32 = 500;
const MIN_PITCH_HZ: u32 = 100;
const MAX_PITCH_HZ: u32 = 10_000;
const MAX_DURATION_MS: u32 = 5_000;

pub async fn handle_buzzer(
    ctx: &mut HandlerContext<'_>,
    pitch: Option<u32>,
    duration_ms: Option<u32>,
    volume: Option<f32>,
) {
    let pitch = pitch
        .unwrap_or(DEFAULT_PITCH_HZ)
        .clamp(MIN_PITCH_HZ, MAX_PITCH_HZ);
    let duration = duration_ms
        .unwrap_or(DEFAULT_DURATION_MS)
        .min(MAX_DURATION_MS);
    let volume = volume.unwrap_or(1.0).clamp(0.0, 1.0);

    ctx.annunciator.beep(pitch, duration, volume);
}

pub async fn handle_led(ctx: &mut HandlerContext<'_>, on: bool) {
    ctx.annunciator.set_led(on);
}
