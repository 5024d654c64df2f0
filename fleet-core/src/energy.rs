//! Energy model: weighted linear drain while active, recharge while resting.

/// Base drain, in percentage points, delivered by one role-assignment for one tick.
pub fn base_drain_pct(tick_ms: f64, battery_life_ms: f64) -> f64 {
    100.0 * tick_ms / battery_life_ms
}

/// Apply one tick's drain for a unit assigned to the given per-domain weights.
/// Returns the post-clamp battery percent and whether this crossed into death.
pub fn apply_drain(battery_pct: f64, base: f64, domain_weights: &[f64]) -> (f64, bool) {
    let drain: f64 = domain_weights.iter().map(|w| base * w).sum();
    let next = battery_pct - drain;
    if next <= 0.0 {
        (0.0, true)
    } else {
        (next.min(100.0), false)
    }
}

/// Apply one tick's recharge for a resting, alive, non-dead unit.
pub fn apply_recharge(battery_pct: f64, base: f64, rest_weight: f64) -> f64 {
    (battery_pct + 0.5 * base * rest_weight).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_drain_matches_spec_default() {
        // tick_ms=1.0, battery_life_ms=420_000 -> tiny per-tick drain.
        let base = base_drain_pct(1.0, 420_000.0);
        assert!((base - (100.0 / 420_000.0)).abs() < 1e-12);
    }

    #[test]
    fn drain_is_sum_of_weighted_domains() {
        let base = 1.0;
        let (next, dead) = apply_drain(50.0, base, &[1.0, 2.0]);
        assert_eq!(next, 47.0);
        assert!(!dead);
    }

    #[test]
    fn drain_clamps_to_zero_and_marks_dead() {
        let (next, dead) = apply_drain(1.0, 1.0, &[5.0]);
        assert_eq!(next, 0.0);
        assert!(dead);
    }

    #[test]
    fn recharge_is_half_base_at_weight_one() {
        let base = 2.0;
        let next = apply_recharge(50.0, base, 1.0);
        assert_eq!(next, 51.0);
    }

    #[test]
    fn recharge_clamps_to_hundred() {
        let next = apply_recharge(99.9, 1.0, 10.0);
        assert_eq!(next, 100.0);
    }

    #[test]
    fn recharge_weight_amplifies_globally() {
        let base = 1.0;
        let slow = apply_recharge(50.0, base, 1.0);
        let fast = apply_recharge(50.0, base, 3.0);
        assert!(fast > slow);
    }
}
