//! gamewalk-transmitter: UDP boundary of the step pipeline.
//! Sends one `STEP` datagram per step event without blocking the caller,
//! and provides the receiving-side listener used on the game host.

pub mod error;
pub mod listener;
pub mod transmitter;
pub mod wire;

pub use error::{ListenerError, TransmitError};
pub use listener::{ConnectionStatus, ListenerStatus, ReceivedStep, StepListener};
pub use transmitter::{StatsSnapshot, Transmitter, TransmitterConfig, TransmitterState};
pub use wire::{Datagram, STEP_PAYLOAD, decode};
