//! Append-only CSV sinks (timeline, battery samples, assignment samples, events)
//! and the final `summary.json` snapshot.

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::unit::UnitState;

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub ticks_total: u64,
    pub time_ms_total: f64,
    pub sample_every_ticks: u64,
    pub total_required_roles: u64,
    pub distinct_ok_ticks: u64,
    pub distinct_ok_pct: f64,
    pub multi_role_ticks: u64,
    pub multi_role_pct: f64,
    pub total_assignments: u64,
    pub battery_dead_units: u64,
    pub battery_dead_first_tick: Option<u64>,
    pub domain_weights: HashMap<String, f64>,
    pub tick_ms: f64,
    pub rotation_period_ms: f64,
}

impl Summary {
    pub fn new(
        sample_every_ticks: u64,
        tick_ms: f64,
        rotation_period_ms: f64,
        domain_weights: HashMap<String, f64>,
        total_required_roles: u64,
    ) -> Self {
        Self {
            ticks_total: 0,
            time_ms_total: 0.0,
            sample_every_ticks,
            total_required_roles,
            distinct_ok_ticks: 0,
            distinct_ok_pct: 0.0,
            multi_role_ticks: 0,
            multi_role_pct: 0.0,
            total_assignments: 0,
            battery_dead_units: 0,
            battery_dead_first_tick: None,
            domain_weights,
            tick_ms,
            rotation_period_ms,
        }
    }

    pub fn record_tick(&mut self, distinct_ok: bool, multi_role: bool, assignments_this_tick: u64) {
        self.ticks_total += 1;
        self.time_ms_total += self.tick_ms;
        if distinct_ok {
            self.distinct_ok_ticks += 1;
        }
        if multi_role {
            self.multi_role_ticks += 1;
        }
        self.total_assignments += assignments_this_tick;
        if self.ticks_total > 0 {
            self.distinct_ok_pct = 100.0 * self.distinct_ok_ticks as f64 / self.ticks_total as f64;
            self.multi_role_pct = 100.0 * self.multi_role_ticks as f64 / self.ticks_total as f64;
        }
    }

    pub fn record_death(&mut self, tick: u64) {
        self.battery_dead_units += 1;
        if self.battery_dead_first_tick.is_none() {
            self.battery_dead_first_tick = Some(tick);
        }
    }
}

/// The four append-only CSV sinks plus the summary, owned exclusively by one scheduler instance.
pub struct Sinks {
    logs_dir: PathBuf,
    timeline: csv::Writer<File>,
    battery_samples: csv::Writer<File>,
    assignment_samples: csv::Writer<File>,
    events: csv::Writer<File>,
    /// Non-rest domain names, in the fixed order used for `assignment_samples.csv`'s
    /// `domain_<d>_devices` columns.
    sample_domains: Vec<String>,
    closed: bool,
}

impl Sinks {
    /// `domain_names` lists the non-rest domains whose coverage is sampled, in column order.
    pub fn open(logs_dir: impl AsRef<Path>, domain_names: &[String]) -> Result<Self> {
        let logs_dir = logs_dir.as_ref().to_path_buf();
        fs::create_dir_all(&logs_dir).with_context(|| format!("create {}", logs_dir.display()))?;

        let mut timeline = csv::Writer::from_path(logs_dir.join("timeline.csv"))
            .with_context(|| "opening timeline.csv")?;
        timeline.write_record(["time_ticks", "time_ms", "domain", "active_devices", "reason"])?;

        let mut battery_samples = csv::Writer::from_path(logs_dir.join("battery_samples.csv"))
            .with_context(|| "opening battery_samples.csv")?;
        battery_samples.write_record(["sample_tick", "time_ms", "unit", "battery_pct", "state"])?;

        let mut assignment_samples = csv::Writer::from_path(logs_dir.join("assignment_samples.csv"))
            .with_context(|| "opening assignment_samples.csv")?;
        let mut assignment_header = vec!["sample_tick".to_string(), "time_ms".to_string(), "desired_distinct".to_string(), "actual_distinct".to_string()];
        assignment_header.extend(domain_names.iter().map(|d| format!("domain_{d}_devices")));
        assignment_samples.write_record(&assignment_header)?;

        let mut events = csv::Writer::from_path(logs_dir.join("events.csv"))
            .with_context(|| "opening events.csv")?;
        events.write_record(["time_ticks", "time_ms", "kind", "detail"])?;

        Ok(Self {
            logs_dir,
            timeline,
            battery_samples,
            assignment_samples,
            events,
            sample_domains: domain_names.to_vec(),
            closed: false,
        })
    }

    /// One row per domain whose assignment list changed since the previous tick.
    pub fn emit_timeline_row(&mut self, tick: u64, time_ms: f64, domain: &str, active_devices: &[String], reason: &str) {
        if self.closed {
            return;
        }
        let joined = active_devices.join(";");
        let _ = self.timeline.write_record([
            tick.to_string(),
            time_ms.to_string(),
            domain.to_string(),
            joined,
            reason.to_string(),
        ]);
    }

    pub fn emit_battery_sample(&mut self, tick: u64, time_ms: f64, unit: &str, battery_pct: f64, state: UnitState) {
        if self.closed {
            return;
        }
        let state_str = match state {
            UnitState::Active => "active",
            UnitState::Rest => "rest",
            UnitState::Down => "down",
            UnitState::Dead => "dead",
        };
        let _ = self.battery_samples.write_record([
            tick.to_string(),
            time_ms.to_string(),
            unit.to_string(),
            format!("{:.3}", battery_pct),
            state_str.to_string(),
        ]);
    }

    /// One wide row per sample tick: `desired_distinct`, `actual_distinct`, then one
    /// `domain_<d>_devices` column per non-rest domain in the order passed to `open()`.
    pub fn emit_assignment_sample(
        &mut self,
        tick: u64,
        time_ms: f64,
        desired_distinct: usize,
        actual_distinct: usize,
        devices_by_domain: &HashMap<String, Vec<String>>,
    ) {
        if self.closed {
            return;
        }
        let mut row = vec![tick.to_string(), time_ms.to_string(), desired_distinct.to_string(), actual_distinct.to_string()];
        for domain in &self.sample_domains {
            let joined = devices_by_domain.get(domain).map(|v| v.join(";")).unwrap_or_default();
            row.push(joined);
        }
        let _ = self.assignment_samples.write_record(&row);
    }

    pub fn emit_event(&mut self, tick: u64, time_ms: f64, kind: &str, detail: &str) {
        if self.closed {
            return;
        }
        let _ = self.events.write_record([tick.to_string(), time_ms.to_string(), kind.to_string(), detail.to_string()]);
        if matches!(kind, "mission_failure" | "battery_dead") {
            self.flush();
        }
    }

    pub fn flush(&mut self) {
        let _ = self.timeline.flush();
        let _ = self.battery_samples.flush();
        let _ = self.assignment_samples.flush();
        let _ = self.events.flush();
    }

    pub fn write_summary(&self, summary: &Summary) -> Result<()> {
        let path = self.logs_dir.join("summary.json");
        let json = serde_json::to_string_pretty(summary)?;
        fs::write(&path, json).with_context(|| format!("write {}", path.display()))
    }

    pub fn close(&mut self, summary: &Summary) -> Result<()> {
        self.flush();
        self.write_summary(summary)?;
        self.closed = true;
        Ok(())
    }
}
