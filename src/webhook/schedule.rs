//! Retry schedule for caller-driven redelivery.
//!
//! The engine never retries on its own. An external worker asks the
//! schedule how long to wait before attempt `n` and whether another
//! attempt is allowed after it.

use std::time::Duration;

/// Fixed table of delays, indexed by attempt number.
///
/// # Defaults
///
/// | attempt | delay      |
/// |---------|------------|
/// | 1       | immediate  |
/// | 2       | 1 minute   |
/// | 3       | 5 minutes  |
/// | 4       | 30 minutes |
/// | 5       | 2 hours    |
///
/// # Example
///
/// ```
/// use hookcast::webhook::RetrySchedule;
/// use std::time::Duration;
///
/// let schedule = RetrySchedule::default();
/// assert_eq!(schedule.delay_for_attempt(2), Duration::from_secs(60));
/// assert!(schedule.should_retry(4));
/// assert!(!schedule.should_retry(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySchedule {
    delays: Vec<Duration>,
}

impl RetrySchedule {
    /// Default delays before attempts 1 through 5.
    pub const DEFAULT_DELAYS: [Duration; 5] = [
        Duration::ZERO,
        Duration::from_secs(60),
        Duration::from_secs(5 * 60),
        Duration::from_secs(30 * 60),
        Duration::from_secs(2 * 60 * 60),
    ];

    /// Creates the default five-attempt schedule.
    #[must_use]
    pub fn new() -> Self {
        Self {
            delays: Self::DEFAULT_DELAYS.to_vec(),
        }
    }

    /// Creates a schedule from an explicit delay table.
    ///
    /// Entry `i` is the wait before attempt `i + 1`.
    ///
    /// # Panics
    ///
    /// Panics if `delays` is empty.
    #[must_use]
    pub fn from_delays(delays: Vec<Duration>) -> Self {
        assert!(!delays.is_empty(), "retry schedule must have at least one attempt");
        Self { delays }
    }

    /// Returns the wait before making attempt `attempt` (1-based).
    ///
    /// Attempt 0 is treated as immediate; attempts beyond the table reuse
    /// its last entry.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let Some(index) = attempt.checked_sub(1) else {
            return Duration::ZERO;
        };
        let index = usize::try_from(index).unwrap_or(usize::MAX);

        self.delays
            .get(index)
            .or_else(|| self.delays.last())
            .copied()
            .unwrap_or_default()
    }

    /// Returns true if another attempt may follow attempt `attempt`.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts()
    }

    /// Number of attempts the schedule supports.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        u32::try_from(self.delays.len()).unwrap_or(u32::MAX)
    }

    /// Returns the delay table.
    #[must_use]
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::new()
    }
}
