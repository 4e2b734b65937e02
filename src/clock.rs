use chrono::{DateTime, TimeZone, Utc};

/// Time source injected wherever "now" participates in query or cooldown
/// decisions, so tests can pin the instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current time as integer seconds since the epoch, the resolution
    /// listen timestamps are stored at.
    fn now_ts(&self) -> i64 {
        self.now().timestamp()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    pub fn at_epoch(seconds: i64) -> Self {
        let now = Utc.timestamp_opt(seconds, 0).single().unwrap_or_default();
        Self { now }
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_reports_the_pinned_epoch_second() {
        let clock = FixedClock::at_epoch(1520946608);
        assert_eq!(clock.now_ts(), 1520946608);
        assert_eq!(clock.now().timestamp(), 1520946608);
    }
}
