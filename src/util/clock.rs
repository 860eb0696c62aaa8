//! Wall-clock helpers.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch. Returns 0 if the clock is before it.
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

/// Milliseconds in a duration, for comparing against [`now_ms`] values.
pub const fn duration_ms(duration: Duration) -> u128 {
    duration.as_millis()
}
