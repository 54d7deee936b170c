mod engine;
mod session;
mod ticker;

pub use engine::{EngineSnapshot, IntervalEngine, DEFAULT_LONG_BREAK_EVERY};
pub use session::{
    format_clock, Durations, Session, SessionKind, MAX_DURATION_MIN, MIN_DURATION_MIN,
};
pub use ticker::TickSource;
