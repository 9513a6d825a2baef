use std::time::{SystemTime, UNIX_EPOCH};

/// A unit of time used to scale rates and durations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeUnit {
    /// Nanoseconds.
    Nanoseconds,
    /// Microseconds.
    Microseconds,
    /// Milliseconds.
    Milliseconds,
    /// Seconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
}

impl TimeUnit {
    /// Returns the number of nanoseconds in one of this unit.
    pub const fn as_nanos(self) -> u64 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Minutes => 60 * 1_000_000_000,
            TimeUnit::Hours => 60 * 60 * 1_000_000_000,
            TimeUnit::Days => 24 * 60 * 60 * 1_000_000_000,
        }
    }

    /// Returns the number of seconds in one of this unit, which may be fractional.
    pub fn as_secs_f64(self) -> f64 {
        self.as_nanos() as f64 / 1e9
    }
}

/// A source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Returns the number of milliseconds since the Unix epoch.
    fn time_millis(&self) -> u64;
}

/// The system wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn time_millis(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, SystemClock, TimeUnit};

    #[test]
    fn unit_scales() {
        assert_eq!(TimeUnit::Milliseconds.as_nanos(), 1_000_000);
        assert_eq!(TimeUnit::Days.as_nanos(), 86_400_000_000_000);
        assert_eq!(TimeUnit::Minutes.as_secs_f64(), 60.0);
        assert_eq!(TimeUnit::Milliseconds.as_secs_f64(), 0.001);
    }

    #[test]
    fn system_clock_is_past_2020() {
        assert!(SystemClock.time_millis() > 1_577_836_800_000);
    }
}
