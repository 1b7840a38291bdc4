//! Per-game two-sided countdown clock.
//!
//! The clock is lazy: no timer task runs anywhere. Elapsed wall time is
//! folded into the active side's budget whenever state is read or
//! mutated, so timeout is observed at snapshots rather than triggered.

use super::board::Side;

/// Initial per-side budget: 3 minutes.
pub const INITIAL_BUDGET_MS: i64 = 180_000;

/// Two-sided countdown state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameClock {
    white_ms: i64,
    black_ms: i64,
    active_side: Option<Side>,
    last_tick_at: Option<i64>,
}

impl GameClock {
    /// Start a fresh clock with White to move.
    pub fn start(now: i64) -> Self {
        Self {
            white_ms: INITIAL_BUDGET_MS,
            black_ms: INITIAL_BUDGET_MS,
            active_side: Some(Side::White),
            last_tick_at: Some(now),
        }
    }

    /// Fold elapsed time into the active side's budget.
    ///
    /// Idempotent for repeated calls with non-decreasing `now`; a `now`
    /// earlier than the last tick contributes nothing.
    pub fn sample(&mut self, now: i64) {
        if let (Some(side), Some(last)) = (self.active_side, self.last_tick_at) {
            let elapsed = (now - last).max(0);
            let budget = match side {
                Side::White => &mut self.white_ms,
                Side::Black => &mut self.black_ms,
            };
            *budget = (*budget - elapsed).max(0);
            self.last_tick_at = Some(now);
        }
    }

    /// Fold elapsed time, then hand the clock to the other side.
    ///
    /// Applied atomically with a successful move.
    pub fn switch(&mut self, now: i64) {
        self.sample(now);
        self.active_side = self.active_side.map(Side::opposite);
    }

    /// Stop the clock permanently (terminal game).
    pub fn freeze(&mut self) {
        self.active_side = None;
        self.last_tick_at = None;
    }

    pub fn remaining(&self, side: Side) -> i64 {
        match side {
            Side::White => self.white_ms,
            Side::Black => self.black_ms,
        }
    }

    pub fn active_side(&self) -> Option<Side> {
        self.active_side
    }

    /// The side whose budget is exhausted, if any.
    ///
    /// White is checked first; the termination precedence depends on
    /// this order.
    pub fn expired(&self) -> Option<Side> {
        if self.white_ms <= 0 {
            Some(Side::White)
        } else if self.black_ms <= 0 {
            Some(Side::Black)
        } else {
            None
        }
    }
}
