//! The practice session engine.
//!
//! A `QuestionPool` is sampled into a fixed question list, which a
//! `SessionStateMachine` walks one question at a time under a per-question
//! `SessionClock`. `SessionLoopService` wires the engine to storage.

mod countdown;
mod machine;
mod pool;
mod progress;
mod sampler;
mod selection;
mod workflow;

pub use countdown::{ClockState, SessionClock, Tick};
pub use machine::{Advance, Commit, QuestionPhase, SessionState, SessionStateMachine};
pub use pool::QuestionPool;
pub use progress::SessionProgress;
pub use sampler::SessionSampler;
pub use selection::{PassThrough, ProgressStrategy, SelectionStrategy};
pub use workflow::{CompletedSession, SelectionPolicy, SessionLoopService};
