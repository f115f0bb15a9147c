mod engine;
mod phase;

pub use engine::{ActiveSession, TimerEngine};
pub use phase::{PhaseMachine, Transition};
