//! Monotonic virtual simulation time.
//!
//! A process-wide singleton in the original design; here it is owned by
//! [`crate::context::SimulationContext`] and threaded through construction
//! instead, per Design Note §9 ("global mutable state"). `Clock` itself
//! stays a plain value type so it is trivially `reset`-able between batch
//! runs without reflection-style hook lists.

/// Scalar virtual time in seconds, double precision.
///
/// Monotone non-decreasing within a tick block, but `set` may move it
/// backward once during movement warm-up (see [`crate::world::World`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clock {
    now: f64,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub fn new() -> Self {
        Clock { now: 0.0 }
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    /// Advance time by a non-negative delta.
    ///
    /// # Panics
    /// If `dt` is negative — advancing time backward is never valid; use
    /// [`Clock::set`] during warm-up instead.
    pub fn advance(&mut self, dt: f64) {
        assert!(dt >= 0.0, "Clock::advance called with negative dt: {dt}");
        self.now += dt;
    }

    /// Set time directly. Intended for warm-up (which may move time
    /// backward into negative territory) and for jumping to an external
    /// event's timestamp (always forward in that case).
    pub fn set(&mut self, t: f64) {
        self.now = t;
    }

    pub fn reset(&mut self) {
        self.now = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_accumulates() {
        let mut c = Clock::new();
        c.advance(1.5);
        c.advance(2.5);
        assert_eq!(c.now(), 4.0);
    }

    #[test]
    #[should_panic]
    fn advance_rejects_negative_delta() {
        let mut c = Clock::new();
        c.advance(-1.0);
    }

    #[test]
    fn set_can_move_backward_for_warmup() {
        let mut c = Clock::new();
        c.set(-100.0);
        assert_eq!(c.now(), -100.0);
        c.set(0.0);
        assert_eq!(c.now(), 0.0);
    }

    #[test]
    fn reset_returns_to_zero() {
        let mut c = Clock::new();
        c.advance(10.0);
        c.reset();
        assert_eq!(c.now(), 0.0);
    }
}
