//! Wall-clock to engine-tick conversion.
//!
//! A host timer firing "every second" drifts, coalesces and stalls while the
//! machine sleeps. `TickSource` measures real elapsed time through a
//! [`Clock`] and hands the engine whole seconds, carrying the sub-second
//! remainder to the next call.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::clock::Clock;

pub struct TickSource {
    clock: Arc<dyn Clock>,
    last: DateTime<Utc>,
    carry_ms: i64,
}

impl TickSource {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let last = clock.now();
        Self {
            clock,
            last,
            carry_ms: 0,
        }
    }

    /// Whole seconds elapsed since the previous call.
    pub fn elapsed_ticks(&mut self) -> u64 {
        let now = self.clock.now();
        // Clock went backwards: treat as no time passed.
        let delta_ms = (now - self.last).num_milliseconds().max(0);
        self.last = now;
        let total = self.carry_ms + delta_ms;
        self.carry_ms = total % 1000;
        (total / 1000) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Duration;

    #[test]
    fn carries_fractional_seconds() {
        let clock = Arc::new(ManualClock::default());
        let mut ticks = TickSource::new(clock.clone());

        clock.advance(Duration::milliseconds(1500));
        assert_eq!(ticks.elapsed_ticks(), 1);
        clock.advance(Duration::milliseconds(600));
        assert_eq!(ticks.elapsed_ticks(), 2);
        assert_eq!(ticks.elapsed_ticks(), 0);
    }

    #[test]
    fn backwards_clock_yields_nothing() {
        let clock = Arc::new(ManualClock::default());
        let mut ticks = TickSource::new(clock.clone());
        clock.advance(Duration::seconds(-5));
        assert_eq!(ticks.elapsed_ticks(), 0);
    }
}
