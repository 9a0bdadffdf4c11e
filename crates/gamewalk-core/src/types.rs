//! Sensor sample and step event types.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── Source kinds ────────────────────────────────────────────────

/// Kind of motion source a sample comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// OS step detector: one pulse per physical step.
    StepPulse,
    /// OS step counter: cumulative lifetime count.
    StepCount,
    /// Raw tri-axis accelerometer.
    Accelerometer,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [
        SourceKind::StepPulse,
        SourceKind::StepCount,
        SourceKind::Accelerometer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::StepPulse => "step_pulse",
            SourceKind::StepCount => "step_count",
            SourceKind::Accelerometer => "accelerometer",
        }
    }

    /// Parse the names accepted on the command line and in replay files.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "step_pulse" | "pulse" | "detector" => Some(SourceKind::StepPulse),
            "step_count" | "count" | "counter" => Some(SourceKind::StepCount),
            "accelerometer" | "accel" | "acceleration" => Some(SourceKind::Accelerometer),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Samples ─────────────────────────────────────────────────────

/// A single raw sample as delivered by the sensor subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorSample {
    StepPulse,
    StepCount { count: u64 },
    Acceleration { x: f32, y: f32, z: f32 },
}

impl SensorSample {
    pub fn source_kind(&self) -> SourceKind {
        match self {
            SensorSample::StepPulse => SourceKind::StepPulse,
            SensorSample::StepCount { .. } => SourceKind::StepCount,
            SensorSample::Acceleration { .. } => SourceKind::Accelerometer,
        }
    }
}

/// A sample stamped with its monotonic arrival time.
///
/// `at_ms` is milliseconds on a monotonic clock owned by whoever delivers the
/// reading; only differences between readings are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub at_ms: u64,
    #[serde(flatten)]
    pub sample: SensorSample,
}

impl SensorReading {
    pub fn new(at_ms: u64, sample: SensorSample) -> Self {
        Self { at_ms, sample }
    }
}

/// "A step occurred, now."
///
/// Carries the source and arrival time for logging only; the wire payload
/// is always the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepEvent {
    pub source: SourceKind,
    pub at_ms: u64,
}

// ─── Capabilities ────────────────────────────────────────────────

/// Which motion sources the device offers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorCapabilities {
    pub step_pulse: bool,
    pub step_count: bool,
    pub accelerometer: bool,
}

impl SensorCapabilities {
    pub fn from_kinds(kinds: impl IntoIterator<Item = SourceKind>) -> Self {
        let mut caps = Self::default();
        for kind in kinds {
            match kind {
                SourceKind::StepPulse => caps.step_pulse = true,
                SourceKind::StepCount => caps.step_count = true,
                SourceKind::Accelerometer => caps.accelerometer = true,
            }
        }
        caps
    }

    pub fn has(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::StepPulse => self.step_pulse,
            SourceKind::StepCount => self.step_count,
            SourceKind::Accelerometer => self.accelerometer,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.step_pulse || self.step_count || self.accelerometer)
    }
}
