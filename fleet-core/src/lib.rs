//! fleet-core: the deadline-driven fleet coverage scheduler's decision engine.

pub mod assignment;
pub mod candidates;
pub mod domain;
pub mod energy;
pub mod faults;
pub mod invariants;
pub mod observability;
pub mod ordering;
pub mod rotation;
pub mod scheduler;
pub mod unit;

pub use assignment::{AssignmentOutcome, run_tick as run_assignment_tick};
pub use candidates::{CandidateFacts, ScoreInputs, ScoreWeights};
pub use domain::{Domain, REST_DOMAIN, is_rest_domain};
pub use energy::{apply_drain, apply_recharge, base_drain_pct};
pub use faults::{FaultExpiry, FaultTable};
pub use invariants::{MissionFailure, UnmetStreak, gap_exceeded};
pub use observability::{Sinks, Summary};
pub use ordering::order_domains;
pub use rotation::{RotationClock, RotationConfig};
pub use scheduler::{SchedulerConfig, TickScheduler};
pub use unit::{Unit, UnitState};
