//! Debounce timing
//!
//! Pure functions over an injected clock so they can be tested without
//! sleeping.

use std::time::{Duration, Instant};

/// Check if a debounce window opened at `since` has run out at `now`.
///
/// # Arguments
/// * `since` - When the window opened (None if nothing is scheduled)
/// * `delay` - Length of the window
/// * `now` - Current instant
///
/// # Returns
/// `true` if a window is open and at least `delay` has passed
pub fn delay_elapsed(since: Option<Instant>, delay: Duration, now: Instant) -> bool {
    match since {
        Some(start) => now.saturating_duration_since(start) >= delay,
        None => false, // Nothing scheduled, nothing to fire
    }
}
