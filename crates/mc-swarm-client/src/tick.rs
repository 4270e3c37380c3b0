//! Wall clock to logical tick conversion.

use std::time::{Duration, Instant};

use tracing::warn;

/// One logical tick at 20 TPS.
pub const TICK_LENGTH: Duration = Duration::from_millis(50);

/// Ticks run per worker iteration before the rest is deferred.
pub const MAX_TICKS_PER_ITERATION: u32 = 10;

/// Deferred ticks kept beyond the per-iteration cap (five seconds).
pub const MAX_TICK_BACKLOG: u32 = 100;

/// Converts elapsed time into whole ticks, carrying the fractional
/// remainder and any ticks above the per-iteration cap forward.
#[derive(Debug, Clone)]
pub struct TickTimer {
    tick_length: Duration,
    last: Instant,
    carry: Duration,
    backlog: u32,
}

impl TickTimer {
    pub fn new(now: Instant) -> Self {
        Self::with_tick_length(TICK_LENGTH, now)
    }

    pub fn with_tick_length(tick_length: Duration, now: Instant) -> Self {
        Self {
            tick_length,
            last: now,
            carry: Duration::ZERO,
            backlog: 0,
        }
    }

    /// Number of ticks to run now.
    pub fn advance(&mut self, now: Instant) -> u32 {
        let elapsed = now.saturating_duration_since(self.last);
        self.last = now;

        let carried = (self.carry + elapsed).as_nanos();
        let tick = self.tick_length.as_nanos().max(1);
        let whole = u64::try_from(carried / tick).unwrap_or(u64::MAX);
        self.carry = Duration::from_nanos((carried % tick) as u64);

        let mut pending = u64::from(self.backlog).saturating_add(whole);
        let limit = u64::from(MAX_TICKS_PER_ITERATION + MAX_TICK_BACKLOG);
        if pending > limit {
            warn!("Worker is {} ticks behind, dropping {}", pending, pending - limit);
            pending = limit;
        }

        let run = pending.min(u64::from(MAX_TICKS_PER_ITERATION)) as u32;
        self.backlog = (pending - u64::from(run)) as u32;
        run
    }

    /// Ticks deferred to later iterations.
    pub fn backlog(&self) -> u32 {
        self.backlog
    }

    /// Fraction of the next tick already elapsed.
    pub fn partial_tick(&self) -> f64 {
        self.carry.as_secs_f64() / self.tick_length.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_fraction() {
        let start = Instant::now();
        let mut timer = TickTimer::new(start);
        assert_eq!(timer.advance(start + Duration::from_millis(75)), 1);
        assert!((timer.partial_tick() - 0.5).abs() < 1e-9);
        assert_eq!(timer.advance(start + Duration::from_millis(100)), 1);
        assert!(timer.partial_tick().abs() < 1e-9);
    }

    #[test]
    fn caps_ticks_per_iteration() {
        let start = Instant::now();
        let mut timer = TickTimer::new(start);
        let now = start + Duration::from_millis(750);
        assert_eq!(timer.advance(now), 10);
        assert_eq!(timer.backlog(), 5);
        assert_eq!(timer.advance(now), 5);
        assert_eq!(timer.backlog(), 0);
        assert_eq!(timer.advance(now), 0);
    }

    #[test]
    fn drops_ticks_beyond_backlog() {
        let start = Instant::now();
        let mut timer = TickTimer::new(start);
        assert_eq!(timer.advance(start + Duration::from_secs(60)), 10);
        assert_eq!(timer.backlog(), MAX_TICK_BACKLOG);
    }

    #[test]
    fn clock_going_backwards_is_zero() {
        let start = Instant::now() + Duration::from_secs(1);
        let mut timer = TickTimer::new(start);
        assert_eq!(timer.advance(start - Duration::from_millis(500)), 0);
    }
}
