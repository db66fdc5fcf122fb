use crate::constants::MAX_VERIFICATION_DURATION_SECONDS;
use crate::types::Timestamp;

/// Bound a requested verification window to the system maximum.
///
/// Applied on every verification regardless of what the stored campaign
/// configuration asks for.
pub fn clamp(duration_secs: u64) -> u64 {
    duration_secs.min(MAX_VERIFICATION_DURATION_SECONDS)
}

/// Result of placing an observed on-chain timestamp against a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowCheck {
    Within,
    /// Timestamp `0` (or negative): nothing was observed.
    NoActivity,
    Exceeded { observed: Timestamp, window_secs: u64 },
}

/// Inclusive at the bound: `now - observed == window_secs` is still within.
///
/// A block timestamp slightly ahead of `now` (server clock behind the chain)
/// counts as age zero.
pub fn check_window(now: Timestamp, observed: Timestamp, window_secs: u64) -> WindowCheck {
    if observed <= 0 {
        return WindowCheck::NoActivity;
    }
    let age = now.saturating_sub(observed).max(0) as u64;
    if age <= window_secs {
        WindowCheck::Within
    } else {
        WindowCheck::Exceeded { observed, window_secs }
    }
}

pub fn is_within(now: Timestamp, observed: Timestamp, window_secs: u64) -> bool {
    check_window(now, observed, window_secs) == WindowCheck::Within
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_caps_long_windows() {
        assert_eq!(clamp(7_200), 3_600);
        assert_eq!(clamp(60), 60);
        assert_eq!(clamp(3_600), 3_600);
        assert_eq!(clamp(0), 0);
    }

    #[test]
    fn boundary_is_inclusive() {
        let now = 1_700_000_000;
        assert_eq!(check_window(now, now - 600, 600), WindowCheck::Within);
        assert!(is_within(now, now - 600, 600));
        assert!(!is_within(now, now - 601, 600));
        assert_eq!(
            check_window(now, now - 601, 600),
            WindowCheck::Exceeded { observed: now - 601, window_secs: 600 }
        );
    }

    #[test]
    fn zero_timestamp_is_never_activity() {
        assert_eq!(check_window(1_700_000_000, 0, 3_600), WindowCheck::NoActivity);
        // Even with a window large enough to reach 1970.
        assert_eq!(check_window(100, 0, u64::MAX), WindowCheck::NoActivity);
    }

    #[test]
    fn future_block_timestamp_counts_as_fresh() {
        let now = 1_700_000_000;
        assert_eq!(check_window(now, now + 5, 0), WindowCheck::Within);
    }
}
