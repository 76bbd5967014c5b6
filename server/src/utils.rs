use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock milliseconds since the Unix epoch, as carried by `MoveIntent`
/// and `MatchState::last_update`.
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Formats a float for a validation report, spelling out non-finite values.
pub fn describe(value: f32) -> String {
    if value.is_finite() {
        format!("{:.2}", value)
    } else {
        value.to_string()
    }
}
