use chrono::Utc;

/// Clock supplies the current time, in unix seconds, to the evaluator.
///
/// Evaluation itself is pure; the only time-dependent decisions are the retention windows
/// for archived flags and the incremental re-evaluation cutoff. Tests substitute a fixed
/// clock so those decisions are reproducible.
pub trait Clock: Send + Sync {
    /// Current unix timestamp in seconds.
    fn now(&self) -> i64;
}

/// The wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// A clock frozen at a given timestamp.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}
