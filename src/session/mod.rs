// src/session/mod.rs
pub mod orchestrator;
pub mod state;

pub use orchestrator::Orchestrator;
pub use state::{CaptureKind, Event, Phase, SessionState};
