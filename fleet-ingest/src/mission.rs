//! Raw, typed-but-unvalidated mirror of the mission manifest JSON (SPEC_FULL.md §6).
//!
//! This stage only deserializes and fills documented defaults; it never checks
//! cross-field invariants (missing `rest` domain, unknown unit references, ...) —
//! that is `fleet-validate`'s job.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// `required_active_per_domain`: either one integer applied to every non-rest domain,
/// or an explicit per-domain mapping with missing keys defaulting to 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequiredActive {
    Uniform(u32),
    PerDomain(HashMap<String, u32>),
}

impl Default for RequiredActive {
    fn default() -> Self {
        RequiredActive::Uniform(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MissionConstraints {
    pub max_gap_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MissionRotation {
    #[serde(default)]
    pub rest_duration_ms: Option<f64>,
    #[serde(default)]
    pub min_dwell_ms: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureInjection {
    #[serde(rename = "type")]
    pub kind: String,
    pub unit: String,
    pub at_ms: f64,
    #[serde(default)]
    pub duration_ms: Option<f64>,
    #[serde(default)]
    pub permanent: bool,
}

fn default_swap_threshold_pct() -> f64 {
    10.0
}

fn default_battery_reserve_pct() -> f64 {
    0.15
}

fn default_hysteresis_pct() -> f64 {
    0.08
}

fn default_battery_life_ms() -> f64 {
    420_000.0
}

fn default_sample_every_ticks() -> u64 {
    50
}

fn default_strict_mission_failure() -> bool {
    true
}

fn default_capacity_per_unit() -> u32 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub tick_ms: f64,
    pub constraints: MissionConstraints,
    pub domains: Vec<String>,
    pub units: Vec<String>,
    #[serde(default)]
    pub required_active_per_domain: RequiredActive,
    #[serde(default)]
    pub domain_pools: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub universal_roles: bool,
    #[serde(default)]
    pub domain_weights: HashMap<String, f64>,
    #[serde(default)]
    pub rotation: MissionRotation,
    #[serde(default)]
    pub failure_injections: Vec<FailureInjection>,

    #[serde(default = "default_swap_threshold_pct")]
    pub swap_threshold_pct: f64,
    #[serde(default = "default_battery_reserve_pct")]
    pub battery_reserve_pct: f64,
    #[serde(default = "default_hysteresis_pct")]
    pub hysteresis_pct: f64,
    #[serde(default)]
    pub wake_threshold_pct: Option<f64>,
    #[serde(default = "default_battery_life_ms")]
    pub battery_life_ms: f64,
    #[serde(default = "default_sample_every_ticks")]
    pub sample_every_ticks: u64,
    #[serde(default)]
    pub low_battery_event_every_ms: f64,
    #[serde(default = "default_strict_mission_failure")]
    pub strict_mission_failure: bool,
    #[serde(default = "default_capacity_per_unit")]
    pub capacity_per_unit: u32,
}

pub fn parse_mission_str(raw: &str) -> Result<Mission> {
    serde_json::from_str(raw).context("parsing mission manifest JSON")
}

pub fn parse_mission_file(path: impl AsRef<Path>) -> Result<Mission> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).with_context(|| format!("reading mission manifest {}", path.display()))?;
    parse_mission_str(&raw).with_context(|| format!("parsing mission manifest {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_manifest_fills_documented_defaults() {
        let raw = r#"{
            "tick_ms": 1.0,
            "constraints": {"max_gap_ms": 10},
            "domains": ["radar", "rest"],
            "units": ["u1", "u2"]
        }"#;
        let m = parse_mission_str(raw).unwrap();
        assert_eq!(m.capacity_per_unit, 2);
        assert_eq!(m.battery_life_ms, 420_000.0);
        assert!(m.strict_mission_failure);
        assert_eq!(m.sample_every_ticks, 50);
        assert!(matches!(m.required_active_per_domain, RequiredActive::Uniform(0)));
    }

    #[test]
    fn required_active_accepts_uniform_or_per_domain() {
        let uniform = r#"{"tick_ms":1.0,"constraints":{"max_gap_ms":10},"domains":["rest"],"units":["u1"],"required_active_per_domain":1}"#;
        let m = parse_mission_str(uniform).unwrap();
        assert!(matches!(m.required_active_per_domain, RequiredActive::Uniform(1)));

        let per_domain = r#"{"tick_ms":1.0,"constraints":{"max_gap_ms":10},"domains":["rest"],"units":["u1"],"required_active_per_domain":{"radar":1,"comm":2}}"#;
        let m = parse_mission_str(per_domain).unwrap();
        match m.required_active_per_domain {
            RequiredActive::PerDomain(map) => {
                assert_eq!(map["radar"], 1);
                assert_eq!(map["comm"], 2);
            }
            _ => panic!("expected PerDomain"),
        }
    }

    #[test]
    fn failure_injection_parses_type_as_kind() {
        let raw = r#"{
            "tick_ms": 1.0,
            "constraints": {"max_gap_ms": 10},
            "domains": ["rest"],
            "units": ["u1"],
            "failure_injections": [{"type": "unit_crash", "unit": "u1", "at_ms": 5.0, "permanent": true}]
        }"#;
        let m = parse_mission_str(raw).unwrap();
        assert_eq!(m.failure_injections.len(), 1);
        assert_eq!(m.failure_injections[0].kind, "unit_crash");
        assert!(m.failure_injections[0].permanent);
    }
}
