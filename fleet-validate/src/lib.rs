//! fleet-validate: configuration-invariant checks and manifest -> `SchedulerConfig` resolution.

pub mod validate;

pub use validate::resolve;
