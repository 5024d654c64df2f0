use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fleet_ingest::{FailureInjection, Mission};

#[derive(Parser, Debug)]
#[command(name = "fleet", version, about = "Headless driver for the fleet coverage scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a mission manifest and drive the scheduler for a fixed number of ticks.
    Run {
        /// Path to the mission manifest JSON.
        manifest: PathBuf,

        /// Number of ticks to run.
        #[arg(long, default_value_t = 200)]
        ticks: u64,

        /// Directory to write the four CSV sinks and summary.json into.
        #[arg(long, default_value = "./fleet-logs")]
        logs_dir: PathBuf,

        /// Suppress the one-line-per-tick-transition narration.
        #[arg(long)]
        quiet: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run { manifest, ticks, logs_dir, quiet } => run(manifest, ticks, logs_dir, quiet),
    }
}

/// Whether `unit` is down at `time_ms` per the manifest's `failure_injections`
/// (§10.4): down from `at_ms` onward if `permanent`, for `[at_ms, at_ms+duration_ms)`
/// if a duration is given, or for exactly one tick at `at_ms` otherwise.
fn unit_is_down(injections: &[FailureInjection], unit: &str, time_ms: f64, tick_ms: f64) -> bool {
    injections.iter().any(|inj| {
        if inj.kind != "unit_crash" || inj.unit != unit || time_ms < inj.at_ms {
            return false;
        }
        if inj.permanent {
            return true;
        }
        match inj.duration_ms {
            Some(d) => time_ms < inj.at_ms + d,
            None => time_ms < inj.at_ms + tick_ms,
        }
    })
}

fn alive_map_for_tick(mission: &Mission, time_ms: f64) -> HashMap<String, bool> {
    mission
        .units
        .iter()
        .map(|u| (u.clone(), !unit_is_down(&mission.failure_injections, u, time_ms, mission.tick_ms)))
        .collect()
}

fn run(manifest_path: PathBuf, ticks: u64, logs_dir: PathBuf, quiet: bool) -> Result<()> {
    let mission = fleet_ingest::parse_mission_file(&manifest_path)
        .with_context(|| format!("loading mission manifest {}", manifest_path.display()))?;
    if !quiet {
        println!("loaded mission {} ({} units, {} domains)", manifest_path.display(), mission.units.len(), mission.domains.len());
    }

    let config = fleet_validate::resolve(&mission).context("validating mission manifest")?;
    let mut scheduler = fleet_core::TickScheduler::new(config, &logs_dir)
        .with_context(|| format!("constructing scheduler (logs dir {})", logs_dir.display()))?;

    if !mission.failure_injections.is_empty() && !quiet {
        println!("{} fault injection(s) registered from manifest", mission.failure_injections.len());
    }

    for tick in 0..ticks {
        let time_ms = tick as f64 * mission.tick_ms;
        let alive = alive_map_for_tick(&mission, time_ms);

        if let Err(failure) = scheduler.schedule_tick(&alive) {
            scheduler.close()?;
            return Err(failure.into());
        }
    }

    if !quiet {
        let summary = scheduler.summary_snapshot();
        println!(
            "ran {} ticks: distinct_ok_pct={:.1} multi_role_pct={:.1} battery_dead_units={}",
            summary.ticks_total, summary.distinct_ok_pct, summary.multi_role_pct, summary.battery_dead_units
        );
    }
    scheduler.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_ingest::FailureInjection;

    fn injection(unit: &str, at_ms: f64, duration_ms: Option<f64>, permanent: bool) -> FailureInjection {
        FailureInjection {
            kind: "unit_crash".to_string(),
            unit: unit.to_string(),
            at_ms,
            duration_ms,
            permanent,
        }
    }

    #[test]
    fn permanent_injection_stays_down_forever() {
        let injs = vec![injection("u1", 10.0, None, true)];
        assert!(!unit_is_down(&injs, "u1", 5.0, 1.0));
        assert!(unit_is_down(&injs, "u1", 10.0, 1.0));
        assert!(unit_is_down(&injs, "u1", 1000.0, 1.0));
    }

    #[test]
    fn timed_injection_recovers_after_duration() {
        let injs = vec![injection("u1", 10.0, Some(5.0), false)];
        assert!(!unit_is_down(&injs, "u1", 9.0, 1.0));
        assert!(unit_is_down(&injs, "u1", 10.0, 1.0));
        assert!(unit_is_down(&injs, "u1", 14.0, 1.0));
        assert!(!unit_is_down(&injs, "u1", 15.0, 1.0));
    }

    #[test]
    fn momentary_injection_covers_one_tick() {
        let injs = vec![injection("u1", 10.0, None, false)];
        assert!(unit_is_down(&injs, "u1", 10.0, 2.0));
        assert!(!unit_is_down(&injs, "u1", 12.0, 2.0));
    }
}
