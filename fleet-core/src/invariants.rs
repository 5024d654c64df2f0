//! Unmet-streak bookkeeping and the terminal mission-failure condition.

use std::fmt;

/// Terminal condition: the unresolved coverage gap exceeded the configured grace window.
///
/// Modeled as its own error type (not `anyhow::Error`) so driver code can pattern-match on it
/// and decide, per `strict_mission_failure`, whether to propagate or log-and-continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionFailure {
    pub tick: u64,
    pub domain: String,
    pub streak: u32,
    pub max_gap_ticks: u64,
}

impl fmt::Display for MissionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mission failure at tick {}: domain '{}' unmet streak {} exceeds max_gap_ticks {}",
            self.tick, self.domain, self.streak, self.max_gap_ticks
        )
    }
}

impl std::error::Error for MissionFailure {}

/// A single streak spanning all non-rest domains: increments when any domain is unmet
/// this tick, resets only when every domain is met this tick.
#[derive(Debug, Clone, Default)]
pub struct UnmetStreak {
    pub count: u32,
}

impl UnmetStreak {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record this tick's outcome. `any_unmet` is true if at least one non-rest domain
    /// failed to meet its requirement this tick.
    pub fn record(&mut self, any_unmet: bool) {
        if any_unmet {
            self.count += 1;
        } else {
            self.count = 0;
        }
    }

    pub fn exceeds(&self, max_gap_ticks: u64) -> bool {
        u64::from(self.count) > max_gap_ticks
    }
}

/// Per-domain fast-path gap check: `tick - last_service_tick > max_gap_ticks`.
/// Reconciled with [`UnmetStreak`] as the same failure class (SPEC_FULL.md §11): if this fires
/// it is folded into the same `MissionFailure`, never raised as a second error kind.
pub fn gap_exceeded(current_tick: u64, last_service_tick: u64, max_gap_ticks: u64) -> bool {
    current_tick.saturating_sub(last_service_tick) > max_gap_ticks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streak_increments_on_unmet_resets_on_met() {
        let mut s = UnmetStreak::new();
        s.record(true);
        s.record(true);
        assert_eq!(s.count, 2);
        s.record(false);
        assert_eq!(s.count, 0);
    }

    #[test]
    fn streak_exceeds_only_past_max_gap() {
        let mut s = UnmetStreak::new();
        for _ in 0..10 {
            s.record(true);
        }
        assert!(!s.exceeds(10));
        s.record(true);
        assert!(s.exceeds(10));
    }

    #[test]
    fn gap_exceeded_fast_path() {
        assert!(!gap_exceeded(15, 5, 10));
        assert!(gap_exceeded(16, 5, 10));
    }

    #[test]
    fn mission_failure_displays_context() {
        let e = MissionFailure { tick: 16, domain: "radar".into(), streak: 11, max_gap_ticks: 10 };
        let s = e.to_string();
        assert!(s.contains("radar"));
        assert!(s.contains("16"));
    }
}
