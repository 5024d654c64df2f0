//! Checks the configuration-error invariants from SPEC_FULL.md §7 and resolves a
//! parsed [`Mission`] into the [`SchedulerConfig`] the core accepts.

use std::collections::HashSet;

use anyhow::{bail, Result};

use fleet_core::{candidates::ScoreWeights, domain::is_rest_domain, rotation::RotationConfig, Domain, SchedulerConfig};
use fleet_ingest::{Mission, RequiredActive};

fn required_for(mission: &Mission, domain: &str) -> u32 {
    if is_rest_domain(domain) {
        return 0;
    }
    match &mission.required_active_per_domain {
        RequiredActive::Uniform(v) => *v,
        RequiredActive::PerDomain(map) => map.get(domain).copied().unwrap_or(0),
    }
}

fn validate(mission: &Mission) -> Result<()> {
    if mission.tick_ms <= 0.0 {
        bail!("tick_ms must be > 0");
    }
    if mission.constraints.max_gap_ms == 0 {
        bail!("constraints.max_gap_ms must be > 0");
    }
    if mission.domains.is_empty() || mission.domains.iter().any(|d| d.is_empty()) {
        bail!("domains must be a non-empty list of non-empty strings");
    }
    if !mission.domains.iter().any(|d| is_rest_domain(d)) {
        bail!("domains must include 'rest' (reporting-only domain required by the scheduler)");
    }
    if mission.units.is_empty() || mission.units.iter().any(|u| u.is_empty()) {
        bail!("units must be a non-empty list of non-empty strings");
    }

    let unit_set: HashSet<&str> = mission.units.iter().map(|u| u.as_str()).collect();

    if !mission.universal_roles {
        for domain in &mission.domains {
            if is_rest_domain(domain) {
                continue;
            }
            if required_for(mission, domain) == 0 {
                continue;
            }
            match mission.domain_pools.get(domain) {
                None => bail!("missing domain_pools['{}'] (or set universal_roles=true)", domain),
                Some(pool) if pool.is_empty() => {
                    bail!("domain_pools['{}'] must be a non-empty list (or set universal_roles=true)", domain)
                }
                Some(_) => {}
            }
        }
    }

    for (domain, pool) in &mission.domain_pools {
        let unknown: Vec<&String> = pool.iter().filter(|u| !unit_set.contains(u.as_str())).collect();
        if !unknown.is_empty() {
            bail!("domain_pools['{}'] contains unknown units: {:?}", domain, unknown);
        }
    }

    for injection in &mission.failure_injections {
        if !unit_set.contains(injection.unit.as_str()) {
            bail!("failure injection references unknown unit: {}", injection.unit);
        }
    }

    for (domain, weight) in &mission.domain_weights {
        if *weight <= 0.0 {
            bail!("domain_weights['{}'] must be > 0", domain);
        }
    }

    if let Some(rest_duration_ms) = mission.rotation.rest_duration_ms {
        if rest_duration_ms <= 0.0 {
            bail!("rotation.rest_duration_ms must be > 0");
        }
    }
    if let Some(min_dwell_ms) = mission.rotation.min_dwell_ms {
        if min_dwell_ms < 0.0 {
            bail!("rotation.min_dwell_ms must be >= 0");
        }
    }
    if !(0.0..1.0).contains(&mission.battery_reserve_pct) {
        bail!("battery_reserve_pct must be in [0.0, 1.0)");
    }
    if mission.low_battery_event_every_ms < 0.0 {
        bail!("low_battery_event_every_ms must be >= 0");
    }

    Ok(())
}

/// Validate `mission` and resolve it into a fully derived `SchedulerConfig`.
pub fn resolve(mission: &Mission) -> Result<SchedulerConfig> {
    validate(mission)?;

    let max_gap_ticks = (mission.constraints.max_gap_ms as f64 / mission.tick_ms).ceil() as u64;

    let spares: Vec<String> = mission.domain_pools.get("spares").cloned().unwrap_or_default();
    let all_units: HashSet<String> = mission.units.iter().cloned().collect();

    let domains: Vec<Domain> = mission
        .domains
        .iter()
        .map(|name| {
            let required_active = required_for(mission, name);
            let weight = mission.domain_weights.get(name).copied().unwrap_or(1.0);
            let mut domain = Domain::new(name.clone(), required_active, weight);
            domain.pool = if is_rest_domain(name) {
                HashSet::new()
            } else if mission.universal_roles {
                all_units.clone()
            } else {
                let mut pool: HashSet<String> = mission.domain_pools.get(name).cloned().unwrap_or_default().into_iter().collect();
                pool.extend(spares.iter().cloned());
                pool
            };
            domain
        })
        .collect();

    let wake_threshold_pct = mission
        .wake_threshold_pct
        .unwrap_or((mission.battery_reserve_pct + mission.hysteresis_pct) * 100.0);
    let rotation_period_ms = mission.rotation.rest_duration_ms.unwrap_or(f64::INFINITY);
    let min_dwell_ticks = mission
        .rotation
        .min_dwell_ms
        .map(|ms| (ms / mission.tick_ms).round() as u64)
        .unwrap_or(0);
    let rotation_period_ticks = if rotation_period_ms.is_finite() {
        (rotation_period_ms / mission.tick_ms).round() as u64
    } else {
        0
    };

    let rotation = RotationConfig {
        rotation_period_ms,
        min_dwell_ticks,
        swap_threshold_pct: mission.swap_threshold_pct,
        wake_threshold_pct,
    };

    Ok(SchedulerConfig {
        tick_ms: mission.tick_ms,
        max_gap_ticks,
        battery_life_ms: mission.battery_life_ms,
        capacity_per_unit: mission.capacity_per_unit,
        domains,
        units: mission.units.clone(),
        rotation,
        rotation_period_ticks,
        sample_every_ticks: mission.sample_every_ticks,
        strict_mission_failure: mission.strict_mission_failure,
        score_weights: ScoreWeights::default(),
        battery_reserve_pct: mission.battery_reserve_pct,
        low_battery_event_every_ms: mission.low_battery_event_every_ms,
    })
}
