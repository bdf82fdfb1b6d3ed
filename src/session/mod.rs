//! The recording session: state machine, timers, and the
//! capture -> transcribe -> analyze -> persist pipeline.

mod controller;
mod stats;

pub use controller::{RecordingSessionController, SessionDeps, SourceFactory, StopReason};
pub use stats::{SessionPhase, SessionStats};
