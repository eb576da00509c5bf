//! Per-game dual clock with Fischer/Bronstein/Simple-delay semantics.
//!
//! Depends on an injected monotonic time source rather than calling
//! `Instant::now()` directly so the delay-discipline laws can be tested
//! deterministically with a fake clock that only advances when told to.

use std::time::{Duration, Instant};

use chess::PieceColor;

/// A monotonic source of instants. Production code uses [`SystemClock`];
/// tests use a step clock that advances only on command.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayMode {
    None,
    FischerOnly,
    Bronstein,
    Simple,
}

#[derive(Debug, Clone, Copy)]
pub struct TimeControl {
    pub initial_ms: u64,
    pub increment_ms: u64,
    pub delay_ms: u64,
    pub delay_mode: DelayMode,
}

impl TimeControl {
    /// Mode bounds: bullet 60-180s, blitz 180-600s, rapid 600-1800s,
    /// classical 1800-7200s, applied to `initial_ms`.
    pub fn validate(&self) -> Result<(), TimeControlError> {
        if self.initial_ms == 0 {
            return Err(TimeControlError::NonPositiveInitial);
        }
        let secs = self.initial_ms / 1000;
        if !(60..=7200).contains(&secs) {
            return Err(TimeControlError::OutOfBounds);
        }
        if self.delay_mode == DelayMode::FischerOnly && self.delay_ms != 0 {
            return Err(TimeControlError::FischerHasNoDelay);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TimeControlError {
    #[error("initial time must be positive")]
    NonPositiveInitial,
    #[error("initial time outside mode bounds")]
    OutOfBounds,
    #[error("fischer-only mode carries no delay")]
    FischerHasNoDelay,
}

/// Outcome of [`Clock::commit_move`].
#[derive(Debug, Clone, Copy)]
pub struct MoveCommit {
    pub deducted_ms: u64,
    pub new_active_side: PieceColor,
    /// True if the mover's remaining time hit zero before the increment
    /// was credited — a timeout, evaluated by the caller against §4.3
    /// precedence.
    pub timed_out: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ClockPeek {
    pub white_ms: u64,
    pub black_ms: u64,
    pub active_side: Option<PieceColor>,
}

/// One game's dual clock. Owned exclusively by the Session actor.
pub struct Clock {
    spec: TimeControl,
    white_remaining_ms: u64,
    black_remaining_ms: u64,
    active_side: Option<PieceColor>,
    active_since: Option<Instant>,
}

impl Clock {
    pub fn new(spec: TimeControl) -> Self {
        Self {
            white_remaining_ms: spec.initial_ms,
            black_remaining_ms: spec.initial_ms,
            active_side: None,
            active_since: None,
            spec,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.active_side = Some(PieceColor::White);
        self.active_since = Some(now);
    }

    pub fn peek(&self, now: Instant) -> ClockPeek {
        let (mut white, mut black) = (self.white_remaining_ms, self.black_remaining_ms);
        if let (Some(side), Some(since)) = (self.active_side, self.active_since) {
            let elapsed = now.saturating_duration_since(since).as_millis() as u64;
            match side {
                PieceColor::White => white = white.saturating_sub(elapsed),
                PieceColor::Black => black = black.saturating_sub(elapsed),
            }
        }
        ClockPeek {
            white_ms: white,
            black_ms: black,
            active_side: self.active_side,
        }
    }

    /// Commit the elapsed time for the currently-active side, apply the
    /// delay discipline and increment, and flip `active_side`.
    pub fn commit_move(&mut self, now: Instant) -> MoveCommit {
        let mover = self.active_side.expect("commit_move with no active side");
        let since = self.active_since.expect("commit_move with no active_since");
        let elapsed = now.saturating_duration_since(since).as_millis() as u64;

        let deduction = match self.spec.delay_mode {
            DelayMode::None | DelayMode::FischerOnly => elapsed,
            DelayMode::Simple => elapsed.saturating_sub(self.spec.delay_ms),
            DelayMode::Bronstein => elapsed.saturating_sub(elapsed.min(self.spec.delay_ms)),
        };

        let increment_ms = self.spec.increment_ms;
        let remaining = self.remaining_mut(mover);
        *remaining = remaining.saturating_sub(deduction);
        let timed_out = *remaining == 0;
        *remaining += increment_ms;

        let next_side = mover.opposite();
        self.active_side = Some(next_side);
        self.active_since = Some(now);

        MoveCommit {
            deducted_ms: deduction,
            new_active_side: next_side,
            timed_out,
        }
    }

    pub fn stop(&mut self) {
        self.active_side = None;
        self.active_since = None;
    }

    fn remaining_mut(&mut self, side: PieceColor) -> &mut u64 {
        match side {
            PieceColor::White => &mut self.white_remaining_ms,
            PieceColor::Black => &mut self.black_remaining_ms,
        }
    }
}

/// A step clock for deterministic tests: `now()` returns whatever was last
/// set with `advance`, never the wall clock.
#[cfg(test)]
pub struct StepClock {
    pub current: std::sync::Mutex<Instant>,
}

#[cfg(test)]
impl StepClock {
    pub fn new() -> Self {
        Self {
            current: std::sync::Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) -> Instant {
        let mut guard = self.current.lock().unwrap();
        *guard += by;
        *guard
    }

    pub fn now(&self) -> Instant {
        *self.current.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fischer_spec() -> TimeControl {
        TimeControl {
            initial_ms: 180_000,
            increment_ms: 2_000,
            delay_ms: 0,
            delay_mode: DelayMode::FischerOnly,
        }
    }

    #[test]
    fn fischer_increment_law() {
        let clock_source = StepClock::new();
        let mut clock = Clock::new(fischer_spec());
        clock.start(clock_source.now());

        let after_move = clock_source.advance(Duration::from_millis(5_000));
        let commit = clock.commit_move(after_move);

        let peek = clock.peek(after_move);
        assert_eq!(peek.white_ms, 177_000);
        assert_eq!(peek.black_ms, 180_000);
        assert_eq!(commit.new_active_side, PieceColor::Black);
    }

    #[test]
    fn bronstein_refund_law() {
        let clock_source = StepClock::new();
        let spec = TimeControl {
            initial_ms: 60_000,
            increment_ms: 0,
            delay_ms: 3_000,
            delay_mode: DelayMode::Bronstein,
        };
        let mut clock = Clock::new(spec);
        clock.start(clock_source.now());

        // White takes 2000ms, within the delay: no deduction.
        let t1 = clock_source.advance(Duration::from_millis(2_000));
        clock.commit_move(t1);
        // Black's turn now; advance to simulate black's move so white is
        // active again, then advance 7000ms for white's second move.
        let t2 = clock_source.advance(Duration::from_millis(1_000));
        clock.commit_move(t2);
        let t3 = clock_source.advance(Duration::from_millis(7_000));
        let commit = clock.commit_move(t3);

        assert_eq!(commit.deducted_ms, 4_000);
        let peek = clock.peek(t3);
        assert_eq!(peek.white_ms, 56_000);
    }

    #[test]
    fn simple_delay_waits_before_deducting() {
        let clock_source = StepClock::new();
        let spec = TimeControl {
            initial_ms: 60_000,
            increment_ms: 0,
            delay_ms: 2_000,
            delay_mode: DelayMode::Simple,
        };
        let mut clock = Clock::new(spec);
        clock.start(clock_source.now());

        let t1 = clock_source.advance(Duration::from_millis(1_500));
        let commit = clock.commit_move(t1);
        assert_eq!(commit.deducted_ms, 0);

        let t2 = clock_source.advance(Duration::from_millis(5_000));
        let commit = clock.commit_move(t2);
        assert_eq!(commit.deducted_ms, 3_000);
    }

    #[test]
    fn timeout_flagged_before_increment() {
        let clock_source = StepClock::new();
        let spec = TimeControl {
            initial_ms: 1_000,
            increment_ms: 5_000,
            delay_ms: 0,
            delay_mode: DelayMode::FischerOnly,
        };
        let mut clock = Clock::new(spec);
        clock.start(clock_source.now());

        let t1 = clock_source.advance(Duration::from_millis(2_000));
        let commit = clock.commit_move(t1);
        assert!(commit.timed_out);
        // Increment still applied after the flag is raised.
        let peek = clock.peek(t1);
        assert_eq!(peek.white_ms, 5_000);
    }

    #[test]
    fn validate_rejects_out_of_bounds() {
        let spec = TimeControl {
            initial_ms: 30_000,
            increment_ms: 0,
            delay_ms: 0,
            delay_mode: DelayMode::None,
        };
        assert_eq!(spec.validate(), Err(TimeControlError::OutOfBounds));
    }
}
