//! Candidate-set construction and deterministic scoring for the assignment loop.

/// Per-unit facts needed to classify it into `strict`/`override`/`keep` for one domain.
#[derive(Debug, Clone, Copy)]
pub struct CandidateFacts {
    pub alive: bool,
    pub is_dead: bool,
    pub battery_pct: f64,
    /// Whether the unit is currently resting (not assigned to any domain yet this tick's
    /// prior-tick snapshot).
    pub resting: bool,
    pub faulted: bool,
    pub pool_eligible: bool,
}

/// `strict(d)` membership: wake-gated.
pub fn is_strict_candidate(facts: CandidateFacts, wake_threshold_pct: f64) -> bool {
    base_eligible(facts) && (!facts.resting || facts.battery_pct >= wake_threshold_pct)
}

/// `override(d)` membership: same as strict but ignoring the wake-hysteresis gate.
pub fn is_override_candidate(facts: CandidateFacts) -> bool {
    base_eligible(facts)
}

fn base_eligible(facts: CandidateFacts) -> bool {
    facts.alive && !facts.is_dead && facts.battery_pct > 0.0 && !facts.faulted && facts.pool_eligible
}

/// Inputs to `score(u)` for one unit, for one domain, this tick.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs {
    pub battery_pct: f64,
    pub cooldown_age_norm: f64,
    pub recent_active_flag: bool,
    /// Whether this unit is a keep-candidate incumbent and the current tick is not a rotation tick.
    pub keep_bonus_eligible: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub cooldown_weight: f64,
    pub rotation_weight: f64,
    pub keep_bonus: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            cooldown_weight: 0.1,
            rotation_weight: 0.05,
            keep_bonus: 0.2,
        }
    }
}

pub fn score(inputs: ScoreInputs, weights: ScoreWeights) -> f64 {
    let mut s = inputs.battery_pct / 100.0 + weights.cooldown_weight * inputs.cooldown_age_norm;
    if inputs.recent_active_flag {
        s -= weights.rotation_weight;
    }
    if inputs.keep_bonus_eligible {
        s += weights.keep_bonus;
    }
    s
}

/// Normalised, capped cooldown age: ticks since last assigned over the rotation period in ticks.
pub fn cooldown_age_norm(ticks_since_last_assigned: u64, rotation_period_ticks: u64) -> f64 {
    if rotation_period_ticks == 0 {
        return 1.0;
    }
    (ticks_since_last_assigned as f64 / rotation_period_ticks as f64).min(1.0)
}

/// Deterministic tie-break sort: descending score, ascending unit id.
pub fn sort_by_score_then_id(candidates: &mut [(String, f64)]) {
    candidates.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(alive: bool, dead: bool, battery: f64, resting: bool, faulted: bool, pool: bool) -> CandidateFacts {
        CandidateFacts {
            alive,
            is_dead: dead,
            battery_pct: battery,
            resting,
            faulted,
            pool_eligible: pool,
        }
    }

    #[test]
    fn strict_excludes_low_battery_resting_unit() {
        let f = facts(true, false, 10.0, true, false, true);
        assert!(!is_strict_candidate(f, 23.0));
        assert!(is_override_candidate(f));
    }

    #[test]
    fn strict_includes_already_active_unit_regardless_of_wake_threshold() {
        let f = facts(true, false, 10.0, false, false, true);
        assert!(is_strict_candidate(f, 23.0));
    }

    #[test]
    fn dead_faulted_or_ineligible_units_excluded_from_both() {
        assert!(!is_override_candidate(facts(true, true, 50.0, false, false, true)));
        assert!(!is_override_candidate(facts(true, false, 50.0, false, true, true)));
        assert!(!is_override_candidate(facts(true, false, 50.0, false, false, false)));
        assert!(!is_override_candidate(facts(false, false, 50.0, false, false, true)));
    }

    #[test]
    fn scoring_rewards_battery_and_keep_bonus_penalizes_recent_active() {
        let base = ScoreInputs {
            battery_pct: 80.0,
            cooldown_age_norm: 0.0,
            recent_active_flag: false,
            keep_bonus_eligible: false,
        };
        let with_keep = ScoreInputs { keep_bonus_eligible: true, ..base };
        let with_penalty = ScoreInputs { recent_active_flag: true, ..base };

        let w = ScoreWeights::default();
        assert!(score(with_keep, w) > score(base, w));
        assert!(score(with_penalty, w) < score(base, w));
    }

    #[test]
    fn cooldown_age_norm_caps_at_one() {
        assert_eq!(cooldown_age_norm(0, 10), 0.0);
        assert_eq!(cooldown_age_norm(5, 10), 0.5);
        assert_eq!(cooldown_age_norm(100, 10), 1.0);
        assert_eq!(cooldown_age_norm(5, 0), 1.0);
    }

    #[test]
    fn sort_breaks_ties_by_unit_id() {
        let mut v = vec![
            ("u3".to_string(), 0.5),
            ("u1".to_string(), 0.9),
            ("u2".to_string(), 0.5),
        ];
        sort_by_score_then_id(&mut v);
        assert_eq!(v, vec![
            ("u1".to_string(), 0.9),
            ("u2".to_string(), 0.5),
            ("u3".to_string(), 0.5),
        ]);
    }
}
