//! Per-(unit, domain) fault table: externally injected outages.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Either the fault never clears on its own, or it clears once current time
/// reaches the recorded millisecond deadline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FaultExpiry {
    Permanent,
    RecoverAtMs(f64),
}

/// Keyed by `(unit, domain)`. Faults are injected by an external collaborator
/// (a CI fault-injection driver, a test harness) and expired lazily as ticks pass.
#[derive(Debug, Clone, Default)]
pub struct FaultTable {
    faults: HashMap<(String, String), FaultExpiry>,
}

impl FaultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, unit: impl Into<String>, domain: impl Into<String>, expiry: FaultExpiry) {
        self.faults.insert((unit.into(), domain.into()), expiry);
    }

    pub fn clear_all(&mut self) {
        self.faults.clear();
    }

    /// Expire any faults whose recovery deadline has passed as of `current_time_ms`.
    pub fn expire(&mut self, current_time_ms: f64) {
        self.faults.retain(|_, expiry| match expiry {
            FaultExpiry::Permanent => true,
            FaultExpiry::RecoverAtMs(at) => current_time_ms < *at,
        });
    }

    pub fn is_faulted(&self, unit: &str, domain: &str) -> bool {
        self.faults.contains_key(&(unit.to_string(), domain.to_string()))
    }
}
