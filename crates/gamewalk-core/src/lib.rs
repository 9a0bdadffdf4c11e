//! gamewalk-core: step classification for the gamewalk pipeline.
//! Turns motion-sensor readings into discrete step events and decides which
//! sensor sources to subscribe to. Pure state machines, no IO, no clock.

pub mod classifier;
pub mod keep_alive;
pub mod selection;
pub mod types;

pub use classifier::{ClassifierState, DEBOUNCE_MS, MotionClassifier, STEP_THRESHOLD};
pub use keep_alive::{KeepAlive, NoopKeepAlive};
pub use selection::{SelectionPolicy, SourcePlan, select_sources};
pub use types::{SensorCapabilities, SensorReading, SensorSample, SourceKind, StepEvent};
