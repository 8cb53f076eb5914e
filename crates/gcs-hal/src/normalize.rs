//! Axis normalisation.

/// Collapse `|value| < deadzone` to zero and rescale the rest so the
/// deadzone edge maps to `0.0` and full deflection to `±1.0`.
pub fn apply_deadzone(value: f64, deadzone: f64) -> f64 {
    let magnitude = value.abs();
    if magnitude < deadzone {
        return 0.0;
    }
    if deadzone >= 1.0 {
        return value.signum();
    }
    value.signum() * (magnitude - deadzone) / (1.0 - deadzone)
}
