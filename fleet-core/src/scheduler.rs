//! Tick Scheduler — orchestrates the six fixed per-tick responsibilities (§2):
//! clock & fault intake, candidate selection, domain ordering & assignment,
//! invariant enforcement, energy update, observability emission.

use std::collections::HashMap;

use anyhow::{bail, Result as AnyResult};

use crate::assignment::{self, AssignmentOutcome};
use crate::candidates::ScoreWeights;
use crate::domain::Domain;
use crate::energy;
use crate::faults::{FaultExpiry, FaultTable};
use crate::invariants::{gap_exceeded, MissionFailure, UnmetStreak};
use crate::observability::{Sinks, Summary};
use crate::ordering;
use crate::rotation::{RotationClock, RotationConfig};
use crate::unit::{Unit, UnitState};

/// Fully resolved, validated configuration the core accepts. Produced by a validating
/// stage that sits in front of this crate (mission manifest -> `SchedulerConfig`).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_ms: f64,
    pub max_gap_ticks: u64,
    pub battery_life_ms: f64,
    pub capacity_per_unit: u32,
    /// Includes the `rest` domain.
    pub domains: Vec<Domain>,
    pub units: Vec<String>,
    pub rotation: RotationConfig,
    pub rotation_period_ticks: u64,
    pub sample_every_ticks: u64,
    pub strict_mission_failure: bool,
    pub score_weights: ScoreWeights,
    /// Fraction of battery (0.0-1.0) at or below which an active unit is considered
    /// critically low and eligible for a `low_battery_active` event.
    pub battery_reserve_pct: f64,
    /// Minimum spacing between `low_battery_active` events for the same unit. `0.0` means
    /// emit on every tick the unit remains low.
    pub low_battery_event_every_ms: f64,
}

impl SchedulerConfig {
    fn validate(&self) -> AnyResult<()> {
        if self.units.is_empty() {
            bail!("configuration error: units list is empty");
        }
        if !self.domains.iter().any(|d| d.is_rest()) {
            bail!("configuration error: domains must include a member named 'rest'");
        }
        if self.tick_ms <= 0.0 {
            bail!("configuration error: tick_ms must be positive");
        }
        if self.domains.iter().any(|d| !d.is_rest() && d.weight <= 0.0) {
            bail!("configuration error: domain weight must be strictly positive");
        }
        Ok(())
    }
}

pub struct TickScheduler {
    config: SchedulerConfig,
    domains: Vec<Domain>,
    units: HashMap<String, Unit>,
    fault_table: FaultTable,
    rotation_clock: RotationClock,
    prev_assign: HashMap<String, Vec<String>>,
    unmet_streak: UnmetStreak,
    tick: u64,
    sinks: Sinks,
    summary: Summary,
    closed: bool,
}

impl TickScheduler {
    pub fn new(config: SchedulerConfig, logs_dir: impl AsRef<std::path::Path>) -> AnyResult<Self> {
        config.validate()?;

        let units = config
            .units
            .iter()
            .map(|id| (id.clone(), Unit::new(id.clone())))
            .collect();

        let domain_weights: HashMap<String, f64> = config
            .domains
            .iter()
            .filter(|d| !d.is_rest())
            .map(|d| (d.name.clone(), d.weight))
            .collect();

        let sample_domains: Vec<String> = config.domains.iter().filter(|d| !d.is_rest()).map(|d| d.name.clone()).collect();
        let total_required_roles: u64 = config.domains.iter().filter(|d| !d.is_rest()).map(|d| d.required_active as u64).sum();

        let sinks = Sinks::open(logs_dir, &sample_domains)?;
        let summary = Summary::new(
            config.sample_every_ticks,
            config.tick_ms,
            config.rotation.rotation_period_ms,
            domain_weights,
            total_required_roles,
        );

        Ok(Self {
            domains: config.domains.clone(),
            config,
            units,
            fault_table: FaultTable::new(),
            rotation_clock: RotationClock::new(),
            prev_assign: HashMap::new(),
            unmet_streak: UnmetStreak::new(),
            tick: 0,
            sinks,
            summary,
            closed: false,
        })
    }

    pub fn set_domain_fault(&mut self, unit: impl Into<String>, domain: impl Into<String>, duration_ms: Option<f64>) {
        let expiry = match duration_ms {
            None => FaultExpiry::Permanent,
            Some(ms) => FaultExpiry::RecoverAtMs(self.tick as f64 * self.config.tick_ms + ms),
        };
        self.fault_table.set(unit, domain, expiry);
    }

    pub fn clear_all_domain_faults(&mut self) {
        self.fault_table.clear_all();
    }

    /// Advance one tick. Returns the flat `(domain, unit)` assignment list, or `Err(MissionFailure)`
    /// when `strict_mission_failure` is on and the unresolved coverage gap exceeds its grace window.
    pub fn schedule_tick(&mut self, alive: &HashMap<String, bool>) -> Result<Vec<(String, String)>, MissionFailure> {
        let time_ms = self.tick as f64 * self.config.tick_ms;

        // 1. Clock & fault intake.
        self.fault_table.expire(time_ms);
        let is_rotation_tick = self.rotation_clock.tick(time_ms, self.config.rotation.rotation_period_ms);
        for (id, unit) in self.units.iter_mut() {
            let is_alive = alive.get(id).copied().unwrap_or(false);
            if !is_alive && !unit.is_dead {
                unit.active_since_tick = None;
                unit.resting_since_tick = None;
            }
        }

        // 2 & 3. Candidate selection, domain ordering, five-tier assignment.
        let ordered = ordering::order_domains(&self.domains, self.tick, self.config.max_gap_ticks);
        let outcome: AssignmentOutcome = assignment::run_tick(
            self.tick,
            &ordered,
            &mut self.units,
            alive,
            &self.fault_table,
            &self.prev_assign,
            is_rotation_tick,
            self.config.rotation,
            self.config.rotation_period_ticks,
            self.config.capacity_per_unit,
            self.config.score_weights,
        );

        // 4. Invariant enforcement.
        let any_unmet = !outcome.unmet_domains.is_empty();
        for domain in self.domains.iter_mut() {
            if domain.is_rest() {
                continue;
            }
            if !outcome.unmet_domains.contains(&domain.name) {
                domain.last_service_tick = self.tick;
            }
        }
        self.unmet_streak.record(any_unmet);
        let gap_fail = self
            .domains
            .iter()
            .filter(|d| !d.is_rest())
            .any(|d| gap_exceeded(self.tick, d.last_service_tick, self.config.max_gap_ticks));
        let mission_failed = self.config.strict_mission_failure
            && (self.unmet_streak.exceeds(self.config.max_gap_ticks) || gap_fail);

        for domain_name in &outcome.unmet_domains {
            let need = self
                .domains
                .iter()
                .find(|d| &d.name == domain_name)
                .map(|d| d.required_active)
                .unwrap_or(0);
            let got = outcome.assign_map.get(domain_name).map(|v| v.len() as u32).unwrap_or(0);
            self.sinks.emit_event(
                self.tick,
                time_ms,
                "unmet_requirements",
                &format!("domain={} need={} got={}", domain_name, need, got),
            );
        }
        if is_rotation_tick {
            self.sinks.emit_event(self.tick, time_ms, "rotation", "rotation period elapsed");
        }
        // `wake_override` marks every use of the override (ignore-hysteresis) eligibility;
        // `distinctness_wake` and `wake_override_used` are its tier-C and tier-E specializations.
        for unit_id in &outcome.distinctness_wakes {
            self.sinks.emit_event(self.tick, time_ms, "wake_override", unit_id);
            self.sinks.emit_event(self.tick, time_ms, "distinctness_wake", unit_id);
        }
        for unit_id in &outcome.override_last_resort {
            self.sinks.emit_event(self.tick, time_ms, "wake_override", unit_id);
            self.sinks.emit_event(self.tick, time_ms, "wake_override_used", unit_id);
        }
        let any_global_unmet_streak_exceeds = self.unmet_streak.exceeds(self.config.max_gap_ticks) || gap_fail;
        if any_global_unmet_streak_exceeds {
            self.sinks.emit_event(
                self.tick,
                time_ms,
                "mission_failure",
                &format!("streak={} max_gap_ticks={}", self.unmet_streak.count, self.config.max_gap_ticks),
            );
        }

        // 5. Energy update: drain active units, recharge resting units, mark deaths.
        let base = energy::base_drain_pct(self.config.tick_ms, self.config.battery_life_ms);
        let rest_weight = self
            .domains
            .iter()
            .find(|d| d.is_rest())
            .map(|d| d.weight)
            .unwrap_or(1.0);
        let low_battery_threshold_pct = self.config.battery_reserve_pct * 100.0;
        let mut newly_dead = Vec::new();
        let mut newly_low_battery = Vec::new();
        for (unit_id, unit) in self.units.iter_mut() {
            if unit.is_dead {
                continue;
            }
            let is_alive = alive.get(unit_id).copied().unwrap_or(false);
            if !is_alive {
                continue;
            }
            let weights: Vec<f64> = outcome
                .assign_map
                .iter()
                .filter(|(d, units)| !crate::domain::is_rest_domain(d) && units.contains(unit_id))
                .map(|(d, _)| self.domains.iter().find(|dom| &dom.name == d).map(|dom| dom.weight).unwrap_or(1.0))
                .collect();

            let is_active = !weights.is_empty();
            if !is_active {
                unit.battery_pct = energy::apply_recharge(unit.battery_pct, base, rest_weight);
            } else {
                let (next, died) = energy::apply_drain(unit.battery_pct, base, &weights);
                unit.battery_pct = next;
                if died {
                    unit.is_dead = true;
                    unit.dead_at_tick = Some(self.tick);
                    newly_dead.push(unit_id.clone());
                }
            }

            if is_active && !unit.is_dead && unit.battery_pct <= low_battery_threshold_pct {
                let due = match unit.last_low_battery_warn_tick {
                    None => true,
                    Some(last) => {
                        self.config.low_battery_event_every_ms <= 0.0
                            || (self.tick.saturating_sub(last)) as f64 * self.config.tick_ms >= self.config.low_battery_event_every_ms
                    }
                };
                if due {
                    unit.last_low_battery_warn_tick = Some(self.tick);
                    newly_low_battery.push(unit_id.clone());
                }
            }
        }
        for unit_id in &newly_dead {
            self.summary.record_death(self.tick);
            self.sinks.emit_event(self.tick, time_ms, "battery_dead", unit_id);
        }
        for unit_id in &newly_low_battery {
            self.sinks.emit_event(self.tick, time_ms, "low_battery_active", unit_id);
        }

        // 6. Observability emission.
        for (domain_name, units) in &outcome.assign_map {
            let changed = self.prev_assign.get(domain_name) != Some(units);
            if changed {
                self.sinks.emit_timeline_row(self.tick, time_ms, domain_name, units, "assignment_changed");
            }
        }
        if self.config.sample_every_ticks > 0 && self.tick % self.config.sample_every_ticks == 0 {
            for (unit_id, unit) in &self.units {
                let state = if unit.is_dead {
                    UnitState::Dead
                } else if !alive.get(unit_id).copied().unwrap_or(false) {
                    UnitState::Down
                } else if unit.active_since_tick.is_some() {
                    UnitState::Active
                } else {
                    UnitState::Rest
                };
                self.sinks.emit_battery_sample(self.tick, time_ms, unit_id, unit.battery_pct, state);
            }
            self.sinks.emit_assignment_sample(
                self.tick,
                time_ms,
                outcome.desired_distinct,
                outcome.distinct_used,
                &outcome.assign_map,
            );
        }

        let distinct_ok = outcome.distinct_used == outcome.desired_distinct;
        let assignments_this_tick: u64 = outcome
            .assign_map
            .iter()
            .filter(|(d, _)| !crate::domain::is_rest_domain(d))
            .map(|(_, v)| v.len() as u64)
            .sum();
        self.summary.record_tick(distinct_ok, outcome.multi_role_tick, assignments_this_tick);

        let flat: Vec<(String, String)> = outcome
            .assign_map
            .iter()
            .filter(|(d, _)| !crate::domain::is_rest_domain(d))
            .flat_map(|(d, units)| units.iter().map(move |u| (d.clone(), u.clone())))
            .collect();

        self.prev_assign = outcome.assign_map;
        self.tick += 1;

        if mission_failed {
            return Err(MissionFailure {
                tick: self.tick - 1,
                domain: self
                    .domains
                    .iter()
                    .filter(|d| !d.is_rest())
                    .find(|d| gap_exceeded(self.tick - 1, d.last_service_tick, self.config.max_gap_ticks))
                    .map(|d| d.name.clone())
                    .unwrap_or_default(),
                streak: self.unmet_streak.count,
                max_gap_ticks: self.config.max_gap_ticks,
            });
        }

        Ok(flat)
    }

    pub fn close(&mut self) -> AnyResult<()> {
        if self.closed {
            return Ok(());
        }
        self.sinks.close(&self.summary)?;
        self.closed = true;
        Ok(())
    }

    pub fn summary_snapshot(&self) -> &Summary {
        &self.summary
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
