//! Fader and pan laws

use std::f32::consts::FRAC_PI_4;

/// Fader height that maps to unity gain
pub const UNITY_HEIGHT: f32 = 0.75;
/// Gain at the top of the fader (+6 dB)
pub const MAX_FADER_GAIN: f32 = 2.0;

/// Fader height (0-1) to linear gain: quadratic up to unity, linear above
pub fn height_to_gain(height: f32) -> f32 {
    let h = height.clamp(0.0, 1.0);
    if h <= UNITY_HEIGHT {
        let x = h / UNITY_HEIGHT;
        x * x
    } else {
        1.0 + (h - UNITY_HEIGHT) / (1.0 - UNITY_HEIGHT) * (MAX_FADER_GAIN - 1.0)
    }
}

/// Inverse of `height_to_gain`
pub fn gain_to_height(gain: f32) -> f32 {
    let g = gain.clamp(0.0, MAX_FADER_GAIN);
    if g <= 1.0 {
        UNITY_HEIGHT * g.sqrt()
    } else {
        UNITY_HEIGHT + (g - 1.0) / (MAX_FADER_GAIN - 1.0) * (1.0 - UNITY_HEIGHT)
    }
}

/// Equal-power pan (-1 left .. 1 right) to (left, right) gains
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * FRAC_PI_4;
    (angle.cos(), angle.sin())
}
