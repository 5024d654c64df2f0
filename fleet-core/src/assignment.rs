//! The five-tier (A-E) per-domain assignment fill loop.

use std::collections::{HashMap, HashSet};

use crate::candidates::{
    cooldown_age_norm, is_override_candidate, is_strict_candidate, score, sort_by_score_then_id,
    CandidateFacts, ScoreInputs, ScoreWeights,
};
use crate::domain::{Domain, REST_DOMAIN};
use crate::faults::FaultTable;
use crate::rotation::{forced_dwell_keep, RotationConfig};
use crate::unit::Unit;

/// Result of running the five-tier fill across every non-rest domain for one tick,
/// plus the reporting-only `rest` entry.
#[derive(Debug, Clone, Default)]
pub struct AssignmentOutcome {
    pub assign_map: HashMap<String, Vec<String>>,
    pub unmet_domains: Vec<String>,
    /// Units pulled in via tier C: an additional resting unit woken to meet the distinctness target.
    pub distinctness_wakes: Vec<String>,
    /// Units pulled in via tier E: used-this-tick, override, last resort.
    pub override_last_resort: Vec<String>,
    pub multi_role_tick: bool,
    pub distinct_used: usize,
    pub desired_distinct: usize,
}

struct UnitFacts {
    alive: bool,
    is_dead: bool,
    battery_pct: f64,
    /// Resting as of the *start* of this tick (prior-tick state), used for the wake gate.
    resting_before_tick: bool,
    dwell_ticks: u64,
    ticks_since_last_assigned: u64,
}

fn facts_for(unit: &Unit, alive: bool, tick: u64, rotation_period_ticks: u64) -> UnitFacts {
    let resting_before_tick = unit.active_since_tick.is_none();
    let dwell_ticks = unit.dwell_ticks(tick).unwrap_or(0);
    let ticks_since_last_assigned = unit
        .last_assigned_tick
        .map(|t| tick.saturating_sub(t))
        .unwrap_or(rotation_period_ticks.max(1));
    UnitFacts {
        alive,
        is_dead: unit.is_dead,
        battery_pct: unit.battery_pct,
        resting_before_tick,
        dwell_ticks,
        ticks_since_last_assigned,
    }
}

#[allow(clippy::too_many_arguments)]
pub fn run_tick(
    tick: u64,
    ordered_domains: &[&Domain],
    units: &mut HashMap<String, Unit>,
    alive: &HashMap<String, bool>,
    faults: &FaultTable,
    prev_assign: &HashMap<String, Vec<String>>,
    is_rotation_tick: bool,
    rotation_cfg: RotationConfig,
    rotation_period_ticks: u64,
    capacity_per_unit: u32,
    score_weights: ScoreWeights,
) -> AssignmentOutcome {
    let total_required_roles: u64 = ordered_domains.iter().map(|d| d.required_active as u64).sum();
    let assignable_units: usize = units
        .values()
        .filter(|u| alive.get(&u.id).copied().unwrap_or(false) && !u.is_dead && u.battery_pct > 0.0)
        .count();
    let desired_distinct = total_required_roles.min(assignable_units as u64) as usize;

    let mut used_count: HashMap<String, u32> = HashMap::new();
    let mut assign_map: HashMap<String, Vec<String>> = HashMap::new();
    let mut unmet_domains = Vec::new();
    let mut distinctness_wakes = Vec::new();
    let mut override_last_resort = Vec::new();

    for domain in ordered_domains {
        let mut need = domain.required_active;
        let mut taken: Vec<String> = Vec::new();

        if need == 0 {
            assign_map.insert(domain.name.clone(), taken);
            continue;
        }

        let prev_here: HashSet<&String> = prev_assign.get(&domain.name).map(|v| v.iter().collect()).unwrap_or_default();

        // Tier A: unused-this-tick, strict, keep-candidate incumbents.
        fill_tier(
            &mut need,
            &mut taken,
            &mut used_count,
            units,
            alive,
            faults,
            domain,
            tick,
            rotation_period_ticks,
            rotation_cfg,
            score_weights,
            capacity_per_unit,
            is_rotation_tick,
            TierKind::Keep { prev_here: &prev_here },
        );

        // Tier B: unused-this-tick, strict, fresh distinct assignments.
        fill_tier(
            &mut need,
            &mut taken,
            &mut used_count,
            units,
            alive,
            faults,
            domain,
            tick,
            rotation_period_ticks,
            rotation_cfg,
            score_weights,
            capacity_per_unit,
            is_rotation_tick,
            TierKind::UnusedStrict,
        );

        // Tier C: unused-this-tick, override, gated by the global distinctness target.
        let distinct_used_so_far = used_count.values().filter(|&&c| c > 0).count();
        if need > 0 && distinct_used_so_far < desired_distinct {
            let woken = fill_tier(
                &mut need,
                &mut taken,
                &mut used_count,
                units,
                alive,
                faults,
                domain,
                tick,
                rotation_period_ticks,
                rotation_cfg,
                score_weights,
                capacity_per_unit,
                is_rotation_tick,
                TierKind::UnusedOverride { budget: desired_distinct.saturating_sub(distinct_used_so_far) },
            );
            distinctness_wakes.extend(woken);
        }

        // Tier D: used-this-tick, strict (multi-role, no unused distinct unit remains).
        fill_tier(
            &mut need,
            &mut taken,
            &mut used_count,
            units,
            alive,
            faults,
            domain,
            tick,
            rotation_period_ticks,
            rotation_cfg,
            score_weights,
            capacity_per_unit,
            is_rotation_tick,
            TierKind::UsedStrict,
        );

        // Tier E: used-this-tick, override (last resort).
        let woken = fill_tier(
            &mut need,
            &mut taken,
            &mut used_count,
            units,
            alive,
            faults,
            domain,
            tick,
            rotation_period_ticks,
            rotation_cfg,
            score_weights,
            capacity_per_unit,
            is_rotation_tick,
            TierKind::UsedOverride,
        );
        override_last_resort.extend(woken);

        if need > 0 {
            unmet_domains.push(domain.name.clone());
        }

        assign_map.insert(domain.name.clone(), taken);
    }

    // Finalize bookkeeping transitions (active_since_tick / resting_since_tick) now that every
    // domain's picks for this tick are known.
    for (id, unit) in units.iter_mut() {
        let was_used = used_count.get(id).copied().unwrap_or(0) > 0;
        let unit_alive = alive.get(id).copied().unwrap_or(false);
        if !unit_alive || unit.is_dead {
            continue;
        }
        if was_used {
            if unit.active_since_tick.is_none() {
                unit.active_since_tick = Some(tick);
            }
            unit.resting_since_tick = None;
            unit.last_assigned_tick = Some(tick);
        } else {
            if unit.resting_since_tick.is_none() {
                unit.resting_since_tick = Some(tick);
            }
            unit.active_since_tick = None;
        }
    }

    let rest_units: Vec<String> = units
        .values()
        .filter(|u| alive.get(&u.id).copied().unwrap_or(false) && !u.is_dead && used_count.get(&u.id).copied().unwrap_or(0) == 0)
        .map(|u| u.id.clone())
        .collect();
    let mut rest_sorted = rest_units;
    rest_sorted.sort();
    assign_map.insert(REST_DOMAIN.to_string(), rest_sorted);

    let distinct_used = used_count.values().filter(|&&c| c > 0).count();
    let multi_role_tick = used_count.values().any(|&c| c > 1);

    AssignmentOutcome {
        assign_map,
        unmet_domains,
        distinctness_wakes,
        override_last_resort,
        multi_role_tick,
        distinct_used,
        desired_distinct,
    }
}

enum TierKind<'a> {
    Keep { prev_here: &'a HashSet<&'a String> },
    UnusedStrict,
    UnusedOverride { budget: usize },
    UsedStrict,
    UsedOverride,
}

#[allow(clippy::too_many_arguments)]
fn fill_tier(
    need: &mut u32,
    taken: &mut Vec<String>,
    used_count: &mut HashMap<String, u32>,
    units: &HashMap<String, Unit>,
    alive: &HashMap<String, bool>,
    faults: &FaultTable,
    domain: &Domain,
    tick: u64,
    rotation_period_ticks: u64,
    rotation_cfg: RotationConfig,
    score_weights: ScoreWeights,
    capacity_per_unit: u32,
    is_rotation_tick: bool,
    kind: TierKind,
) -> Vec<String> {
    if *need == 0 {
        return Vec::new();
    }

    let mut budget = match &kind {
        TierKind::UnusedOverride { budget } => Some(*budget),
        _ => None,
    };

    let mut pool: Vec<(String, f64)> = Vec::new();

    for unit_id in &domain.pool {
        if taken.iter().any(|t| t == unit_id) {
            continue;
        }
        let Some(unit) = units.get(unit_id) else { continue };
        let is_alive = alive.get(unit_id).copied().unwrap_or(false);
        let used_so_far = used_count.get(unit_id).copied().unwrap_or(0);
        let is_unused = used_so_far == 0;
        let has_capacity = used_so_far < capacity_per_unit;
        if !has_capacity {
            continue;
        }

        let facts = facts_for(unit, is_alive, tick, rotation_period_ticks);
        let candidate_facts = CandidateFacts {
            alive: facts.alive,
            is_dead: facts.is_dead,
            battery_pct: facts.battery_pct,
            resting: facts.resting_before_tick,
            faulted: faults.is_faulted(unit_id, &domain.name),
            pool_eligible: true,
        };

        let eligible = match &kind {
            TierKind::Keep { prev_here } => {
                is_unused
                    && is_strict_candidate(candidate_facts, rotation_cfg.wake_threshold_pct)
                    && !is_rotation_tick
                    && prev_here.contains(unit_id)
                    && (forced_dwell_keep(facts.dwell_ticks, rotation_cfg.min_dwell_ticks, facts.battery_pct, rotation_cfg.swap_threshold_pct)
                        || facts.battery_pct > rotation_cfg.swap_threshold_pct)
            }
            TierKind::UnusedStrict => {
                is_unused && is_strict_candidate(candidate_facts, rotation_cfg.wake_threshold_pct)
            }
            TierKind::UnusedOverride { .. } => is_unused && is_override_candidate(candidate_facts),
            TierKind::UsedStrict => {
                !is_unused && is_strict_candidate(candidate_facts, rotation_cfg.wake_threshold_pct)
            }
            TierKind::UsedOverride => !is_unused && is_override_candidate(candidate_facts),
        };

        if !eligible {
            continue;
        }

        let keep_bonus_eligible = matches!(kind, TierKind::Keep { .. }) && !is_rotation_tick;
        let recent_active_flag = is_rotation_tick && unit.last_assigned_tick == tick.checked_sub(1);
        let s = score(
            ScoreInputs {
                battery_pct: facts.battery_pct,
                cooldown_age_norm: cooldown_age_norm(facts.ticks_since_last_assigned, rotation_period_ticks),
                recent_active_flag,
                keep_bonus_eligible,
            },
            score_weights,
        );
        pool.push((unit_id.clone(), s));
    }

    sort_by_score_then_id(&mut pool);

    let mut woken = Vec::new();
    for (unit_id, _) in pool {
        if *need == 0 {
            break;
        }
        if let Some(b) = budget {
            if b == 0 {
                break;
            }
        }
        taken.push(unit_id.clone());
        *used_count.entry(unit_id.clone()).or_insert(0) += 1;
        *need -= 1;
        if let Some(b) = budget.as_mut() {
            *b -= 1;
        }
        if matches!(kind, TierKind::UnusedOverride { .. } | TierKind::UsedOverride) {
            woken.push(unit_id);
        }
    }

    woken
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_units(ids: &[&str]) -> HashMap<String, Unit> {
        ids.iter().map(|id| (id.to_string(), Unit::new(*id))).collect()
    }

    fn all_alive(ids: &[&str]) -> HashMap<String, bool> {
        ids.iter().map(|id| (id.to_string(), true)).collect()
    }

    fn universal_domain(name: &str, required: u32, units: &[&str]) -> Domain {
        let mut d = Domain::new(name, required, 1.0);
        d.pool = units.iter().map(|s| s.to_string()).collect();
        d
    }

    #[test]
    fn single_domain_picks_one_distinct_unit_tier_b() {
        let ids = ["u1", "u2"];
        let mut units = mk_units(&ids);
        let alive = all_alive(&ids);
        let faults = FaultTable::new();
        let radar = universal_domain("radar", 1, &ids);
        let domains = vec![&radar];
        let prev = HashMap::new();

        let out = run_tick(
            0,
            &domains,
            &mut units,
            &alive,
            &faults,
            &prev,
            false,
            RotationConfig::default(),
            100,
            1,
            ScoreWeights::default(),
        );

        assert_eq!(out.assign_map["radar"].len(), 1);
        assert!(out.unmet_domains.is_empty());
        assert_eq!(out.assign_map[REST_DOMAIN].len(), 1);
    }

    #[test]
    fn insufficient_capacity_marks_domain_unmet() {
        let ids = ["u1"];
        let mut units = mk_units(&ids);
        let alive = all_alive(&ids);
        let faults = FaultTable::new();
        let radar = universal_domain("radar", 2, &ids);
        let domains = vec![&radar];
        let prev = HashMap::new();

        let out = run_tick(
            0,
            &domains,
            &mut units,
            &alive,
            &faults,
            &prev,
            false,
            RotationConfig::default(),
            100,
            1,
            ScoreWeights::default(),
        );

        assert_eq!(out.assign_map["radar"].len(), 1);
        assert_eq!(out.unmet_domains, vec!["radar".to_string()]);
    }

    #[test]
    fn distinctness_preferred_over_multi_role_when_enough_units() {
        let ids = ["u1", "u2", "u3"];
        let mut units = mk_units(&ids);
        let alive = all_alive(&ids);
        let faults = FaultTable::new();
        let a = universal_domain("a", 1, &ids);
        let b = universal_domain("b", 1, &ids);
        let domains = vec![&a, &b];
        let prev = HashMap::new();

        let out = run_tick(
            0,
            &domains,
            &mut units,
            &alive,
            &faults,
            &prev,
            false,
            RotationConfig::default(),
            100,
            2,
            ScoreWeights::default(),
        );

        assert!(!out.multi_role_tick);
        assert_eq!(out.distinct_used, 2);
    }

    #[test]
    fn contingency_doubling_when_only_one_unit_left() {
        let ids = ["u1"];
        let mut units = mk_units(&ids);
        let alive = all_alive(&ids);
        let faults = FaultTable::new();
        let a = universal_domain("a", 1, &ids);
        let b = universal_domain("b", 1, &ids);
        let domains = vec![&a, &b];
        let prev = HashMap::new();

        let out = run_tick(
            0,
            &domains,
            &mut units,
            &alive,
            &faults,
            &prev,
            false,
            RotationConfig::default(),
            100,
            2,
            ScoreWeights::default(),
        );

        assert!(out.multi_role_tick);
        assert_eq!(out.assign_map["a"], vec!["u1".to_string()]);
        assert_eq!(out.assign_map["b"], vec!["u1".to_string()]);
        assert!(out.unmet_domains.is_empty());
    }

    #[test]
    fn dead_or_down_units_never_assigned() {
        let ids = ["u1", "u2"];
        let mut units = mk_units(&ids);
        units.get_mut("u1").unwrap().is_dead = true;
        let mut alive = all_alive(&ids);
        alive.insert("u2".to_string(), false);
        let faults = FaultTable::new();
        let radar = universal_domain("radar", 1, &ids);
        let domains = vec![&radar];
        let prev = HashMap::new();

        let out = run_tick(
            0,
            &domains,
            &mut units,
            &alive,
            &faults,
            &prev,
            false,
            RotationConfig::default(),
            100,
            1,
            ScoreWeights::default(),
        );

        assert!(out.assign_map["radar"].is_empty());
        assert_eq!(out.unmet_domains, vec!["radar".to_string()]);
    }
}
