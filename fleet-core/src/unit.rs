//! Unit model: a long-lived fielded actor with finite battery.

use serde::{Deserialize, Serialize};

/// Observable lifecycle state of a unit at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    Active,
    Rest,
    Down,
    Dead,
}

/// A single fielded unit (drone/device) tracked by the scheduler.
///
/// Units are created once from the mission manifest and never destroyed;
/// `is_dead` is the only monotonic one-way transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,

    /// Percent, clamped to [0.0, 100.0].
    pub battery_pct: f64,

    pub is_dead: bool,

    /// Tick at which battery hit zero, if it has.
    pub dead_at_tick: Option<u64>,

    /// Tick this unit was last part of any domain's assignment list.
    pub last_assigned_tick: Option<u64>,

    /// Tick this unit became active in its current (possibly multi-domain) stint, if active.
    pub active_since_tick: Option<u64>,

    /// Tick this unit began resting in its current stint, if resting.
    pub resting_since_tick: Option<u64>,

    /// Tick a low-battery warning was last emitted for this unit, for throttling.
    pub last_low_battery_warn_tick: Option<u64>,
}

impl Unit {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            battery_pct: 100.0,
            is_dead: false,
            dead_at_tick: None,
            last_assigned_tick: None,
            active_since_tick: None,
            resting_since_tick: None,
            last_low_battery_warn_tick: None,
        }
    }

    /// Dwell ticks: how long this unit has been continuously active, if it is.
    pub fn dwell_ticks(&self, now: u64) -> Option<u64> {
        self.active_since_tick.map(|since| now.saturating_sub(since))
    }

    /// Ticks since this unit began resting, if it is currently resting.
    pub fn rest_ticks(&self, now: u64) -> Option<u64> {
        self.resting_since_tick.map(|since| now.saturating_sub(since))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_unit_starts_full_and_alive() {
        let u = Unit::new("u1");
        assert_eq!(u.battery_pct, 100.0);
        assert!(!u.is_dead);
        assert!(u.dead_at_tick.is_none());
    }

    #[test]
    fn dwell_ticks_tracks_since_active() {
        let mut u = Unit::new("u1");
        u.active_since_tick = Some(10);
        assert_eq!(u.dwell_ticks(15), Some(5));
        assert_eq!(u.rest_ticks(15), None);
    }
}
