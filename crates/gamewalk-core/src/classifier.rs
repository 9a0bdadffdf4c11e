//! Motion classifier: sensor readings in, step events out.
//!
//! One classifier per subscription. It only reacts to readings whose source
//! is in its [`SourcePlan`]; anything else is ignored.
//!
//! - **Step pulse**: every pulse is a step.
//! - **Step counter**: the first reading sets the baseline and emits nothing.
//!   Any later increase emits exactly one step, however large the jump. A
//!   reading at or below the last count re-baselines silently (counter reset,
//!   e.g. after a device reboot).
//! - **Accelerometer**: emits when the change in magnitude between two
//!   consecutive readings exceeds [`STEP_THRESHOLD`] and at least
//!   [`DEBOUNCE_MS`] have passed since the previous accelerometer step.
//!
//! `on_reading` runs on the sensor-callback thread: it never blocks, never
//! allocates, and never reads a clock (time comes from `SensorReading::at_ms`).

use crate::selection::SourcePlan;
use crate::types::{SensorReading, SensorSample, SourceKind, StepEvent};

/// Magnitude change (in the sensor's native acceleration units) that must be
/// strictly exceeded to count as a step.
pub const STEP_THRESHOLD: f32 = 12.0;

/// Minimum spacing between two accelerometer steps.
pub const DEBOUNCE_MS: u64 = 500;

/// Mutable filter state. Owned by exactly one [`MotionClassifier`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifierState {
    /// First count seen since the last reset. `None` until a counter reading arrives.
    pub baseline_count: Option<u64>,
    /// Most recent counter value.
    pub last_count: u64,
    pub previous_magnitude: f32,
    pub current_magnitude: f32,
    /// Arrival time of the last accelerometer step.
    pub last_event_at_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct MotionClassifier {
    plan: SourcePlan,
    state: ClassifierState,
}

impl MotionClassifier {
    pub fn new(plan: SourcePlan) -> Self {
        Self {
            plan,
            state: ClassifierState::default(),
        }
    }

    pub fn plan(&self) -> &SourcePlan {
        &self.plan
    }

    pub fn state(&self) -> &ClassifierState {
        &self.state
    }

    /// Feed one reading. Returns the step it completes, if any.
    pub fn on_reading(&mut self, reading: &SensorReading) -> Option<StepEvent> {
        let source = reading.sample.source_kind();
        if !self.plan.contains(source) {
            return None;
        }

        let stepped = match reading.sample {
            SensorSample::StepPulse => true,
            SensorSample::StepCount { count } => self.on_step_count(count),
            SensorSample::Acceleration { x, y, z } => self.on_acceleration(x, y, z, reading.at_ms),
        };

        stepped.then_some(StepEvent {
            source,
            at_ms: reading.at_ms,
        })
    }

    fn on_step_count(&mut self, count: u64) -> bool {
        let st = &mut self.state;

        if st.baseline_count.is_none() {
            st.baseline_count = Some(count);
            st.last_count = count;
            return false;
        }

        if count > st.last_count {
            st.last_count = count;
            return true;
        }

        // Equal or lower: treat as a fresh baseline.
        st.baseline_count = Some(count);
        st.last_count = count;
        false
    }

    fn on_acceleration(&mut self, x: f32, y: f32, z: f32, at_ms: u64) -> bool {
        let st = &mut self.state;

        st.previous_magnitude = st.current_magnitude;
        st.current_magnitude = magnitude(x, y, z);

        let delta = st.current_magnitude - st.previous_magnitude;
        if delta.abs() <= STEP_THRESHOLD {
            return false;
        }

        let debounced = st
            .last_event_at_ms
            .is_some_and(|last| at_ms.saturating_sub(last) < DEBOUNCE_MS);
        if debounced {
            return false;
        }

        st.last_event_at_ms = Some(at_ms);
        true
    }
}

fn magnitude(x: f32, y: f32, z: f32) -> f32 {
    (x * x + y * y + z * z).sqrt()
}

// ─── Tests ───────────────────────────────────────────────────────────
