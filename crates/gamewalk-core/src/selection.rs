//! Sensor source selection.
//!
//! Decided once, at subscription time, from the device's capabilities:
//!
//! 1. Step pulse, when present.
//! 2. Step counter, when present. Under [`SelectionPolicy::Observed`] it is
//!    subscribed alongside the step pulse sensor; under
//!    [`SelectionPolicy::Exclusive`] only when the pulse sensor is absent.
//! 3. Accelerometer, only when neither step sensor exists.
//!
//! No sources at all yields an empty plan, which is not an error.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{SensorCapabilities, SourceKind};

/// How to treat a device that has both step sensors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Subscribe both step pulse and step counter. The counter acts as a
    /// backup and may occasionally double count a step.
    #[default]
    Observed,
    /// Subscribe exactly one source: the most precise one available.
    Exclusive,
}

impl FromStr for SelectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "observed" | "both" => Ok(SelectionPolicy::Observed),
            "exclusive" | "single" => Ok(SelectionPolicy::Exclusive),
            other => Err(format!(
                "unknown selection policy {other:?} (expected \"observed\" or \"exclusive\")"
            )),
        }
    }
}

/// The set of sources a classifier subscribes to, in priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePlan {
    kinds: Vec<SourceKind>,
}

impl SourcePlan {
    pub fn kinds(&self) -> &[SourceKind] {
        &self.kinds
    }

    pub fn contains(&self, kind: SourceKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Highest-priority subscribed source, if any.
    pub fn primary(&self) -> Option<SourceKind> {
        self.kinds.first().copied()
    }
}

/// Pick the sources to subscribe for the given capabilities.
pub fn select_sources(caps: &SensorCapabilities, policy: SelectionPolicy) -> SourcePlan {
    let mut kinds = Vec::with_capacity(2);

    if caps.step_pulse {
        kinds.push(SourceKind::StepPulse);
    }

    if caps.step_count && (kinds.is_empty() || policy == SelectionPolicy::Observed) {
        kinds.push(SourceKind::StepCount);
    }

    // Accelerometer is a fallback only.
    if kinds.is_empty() && caps.accelerometer {
        kinds.push(SourceKind::Accelerometer);
    }

    SourcePlan { kinds }
}
