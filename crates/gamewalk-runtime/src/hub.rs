//! Sensor hub: the boundary between the platform's sensor subsystem and the
//! classifier.
//!
//! A hub reports what sensors exist and, once subscribed, calls the sink for
//! every reading of a subscribed kind, in arrival order, on one dedicated
//! callback thread.

use gamewalk_core::{SensorCapabilities, SensorReading, SourcePlan};
use thiserror::Error;

/// Called once per reading on the hub's callback thread. Must not block.
pub type ReadingSink = Box<dyn FnMut(SensorReading) + Send + 'static>;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("sensor hub already has a subscriber")]
    AlreadySubscribed,

    #[error("cannot start sensor callback thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub trait SensorHub: Send {
    fn capabilities(&self) -> SensorCapabilities;

    /// Start delivering readings whose kind is in `plan`.
    fn subscribe(&mut self, plan: &SourcePlan, sink: ReadingSink) -> Result<(), HubError>;

    /// Stop delivery. Once this returns the sink is never called again.
    /// Idempotent. May block while the callback thread winds down, so async
    /// callers run it on the blocking pool.
    fn unsubscribe(&mut self);
}
