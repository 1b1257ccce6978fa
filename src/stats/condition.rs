//! Stop and repeat conditions for the training loop

use std::time::{Duration, Instant};

/// Whether a monitored metric improves by decreasing or increasing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Lower is better (losses)
    Minimize,
    /// Higher is better (accuracies)
    Maximize,
}

/// Patience-based early stopping on a monitored metric
///
/// On each `check`, the value is compared against the best seen so far.
/// An improvement resets the wait counter and records the new best;
/// otherwise the wait counter increments. Once the counter reaches
/// `patience`, `check` returns true. The caller is responsible for
/// actually stopping - this type only signals.
///
/// A negative patience disables the condition: `check` always returns
/// false.
///
/// # Example
///
/// ```
/// use afinar::stats::{Direction, EarlyStopCondition};
///
/// let mut cond = EarlyStopCondition::new(2, Direction::Minimize);
/// assert!(!cond.check(5.0));
/// assert!(!cond.check(4.0));
/// assert!(!cond.check(6.0));
/// assert!(cond.check(7.0)); // two checks without improvement
/// ```
#[derive(Debug, Clone)]
pub struct EarlyStopCondition {
    patience: i32,
    direction: Direction,
    best: f64,
    wait: u32,
}

impl EarlyStopCondition {
    /// Create a condition with the given patience (negative disables)
    pub fn new(patience: i32, direction: Direction) -> Self {
        let best = match direction {
            Direction::Minimize => f64::INFINITY,
            Direction::Maximize => f64::NEG_INFINITY,
        };
        Self { patience, direction, best, wait: 0 }
    }

    /// Configured patience
    pub fn patience(&self) -> i32 {
        self.patience
    }

    /// Checks since the last improvement
    pub fn wait(&self) -> u32 {
        self.wait
    }

    /// Best value observed so far
    pub fn best(&self) -> f64 {
        self.best
    }

    /// Feed one observation; returns true when the caller should stop
    pub fn check(&mut self, value: f64) -> bool {
        if self.patience < 0 {
            return false;
        }

        let improved = match self.direction {
            Direction::Minimize => value < self.best,
            Direction::Maximize => value > self.best,
        };
        if improved {
            self.wait = 0;
            self.best = value;
        } else {
            self.wait += 1;
        }

        i64::from(self.wait) >= i64::from(self.patience)
    }
}

/// Rate limiter: fires at most once per interval
///
/// `check` returns true when at least the configured interval has elapsed
/// since the last firing, and resets the timer when it does.
#[derive(Debug, Clone)]
pub struct TimedRepeatCondition {
    every: Duration,
    last_trigger: Instant,
}

impl TimedRepeatCondition {
    /// Create a condition firing at most once per `every`
    pub fn new(every: Duration) -> Self {
        Self { every, last_trigger: Instant::now() }
    }

    /// Returns true (and rearms) once per interval
    pub fn check(&mut self) -> bool {
        if self.last_trigger.elapsed() >= self.every {
            self.last_trigger = Instant::now();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimize_sequence_from_spec_example() {
        // patience=2, minimize, [5,4,6,7]: wait goes 0,0,1,2 and the
        // fourth check signals stop.
        let mut cond = EarlyStopCondition::new(2, Direction::Minimize);
        assert!(!cond.check(5.0));
        assert_eq!(cond.wait(), 0);
        assert!(!cond.check(4.0));
        assert_eq!(cond.wait(), 0);
        assert!(!cond.check(6.0));
        assert_eq!(cond.wait(), 1);
        assert!(cond.check(7.0));
        assert_eq!(cond.wait(), 2);
    }

    #[test]
    fn test_negative_patience_never_triggers() {
        let mut cond = EarlyStopCondition::new(-1, Direction::Minimize);
        for value in [5.0, 6.0, 7.0, 8.0, 9.0, 10.0] {
            assert!(!cond.check(value));
        }
    }

    #[test]
    fn test_zero_patience_triggers_immediately() {
        let mut cond = EarlyStopCondition::new(0, Direction::Minimize);
        assert!(cond.check(5.0));
    }

    #[test]
    fn test_improvement_resets_wait() {
        let mut cond = EarlyStopCondition::new(3, Direction::Minimize);
        cond.check(5.0);
        cond.check(6.0);
        cond.check(6.0);
        assert_eq!(cond.wait(), 2);
        cond.check(4.0);
        assert_eq!(cond.wait(), 0);
        assert_eq!(cond.best(), 4.0);
    }

    #[test]
    fn test_maximize_direction() {
        let mut cond = EarlyStopCondition::new(1, Direction::Maximize);
        assert!(!cond.check(0.5));
        assert!(!cond.check(0.7));
        assert!(cond.check(0.6));
    }

    #[test]
    fn test_equal_value_is_not_improvement() {
        let mut cond = EarlyStopCondition::new(2, Direction::Minimize);
        cond.check(5.0);
        cond.check(5.0);
        assert_eq!(cond.wait(), 1);
    }

    #[test]
    fn test_timed_repeat_condition() {
        let mut cond = TimedRepeatCondition::new(Duration::from_secs(3600));
        assert!(!cond.check());

        let mut cond = TimedRepeatCondition::new(Duration::ZERO);
        assert!(cond.check());
        assert!(cond.check());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// A strictly worsening stream stops after exactly patience checks
        /// beyond the first.
        #[test]
        fn prop_worsening_stream_respects_patience(patience in 1i32..10, start in 0.0f64..10.0) {
            let mut cond = EarlyStopCondition::new(patience, Direction::Minimize);
            prop_assert!(!cond.check(start));
            for i in 1..=patience {
                let stopped = cond.check(start + f64::from(i));
                if i < patience {
                    prop_assert!(!stopped);
                } else {
                    prop_assert!(stopped);
                }
            }
        }

        /// A strictly improving stream never stops (positive patience).
        #[test]
        fn prop_improving_stream_never_stops(patience in 1i32..10, n in 1usize..50) {
            let mut cond = EarlyStopCondition::new(patience, Direction::Minimize);
            for i in 0..n {
                prop_assert!(!cond.check(-(i as f64)));
            }
        }

        /// Disabled condition ignores every input.
        #[test]
        fn prop_disabled_never_stops(values in prop::collection::vec(-1e3f64..1e3, 1..50)) {
            let mut cond = EarlyStopCondition::new(-1, Direction::Minimize);
            for v in values {
                prop_assert!(!cond.check(v));
            }
        }
    }
}
