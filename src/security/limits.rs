//! Rate limit expressions.
//!
//! Limits are written the way operators think about them:
//! `"1000 per hour"`, `"5 per 2 minutes"`, `"10/second"`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// `count` requests allowed every `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RateLimit {
    pub count: u32,
    pub period: Duration,
}

impl RateLimit {
    pub fn new(count: u32, period: Duration) -> Self {
        Self { count, period }
    }

    pub fn per_second(count: u32) -> Self {
        Self::new(count, Duration::from_secs(1))
    }

    /// Tokens regained per second.
    pub fn refill_rate(&self) -> f64 {
        f64::from(self.count) / self.period.as_secs_f64()
    }
}

impl FromStr for RateLimit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidLimit(s.to_string());
        let lowered = s.trim().to_ascii_lowercase();

        let (count, unit) = lowered
            .split_once(" per ")
            .or_else(|| lowered.split_once('/'))
            .ok_or_else(invalid)?;

        let count: u32 = count.trim().parse().map_err(|_| invalid())?;
        if count == 0 {
            return Err(invalid());
        }

        // Optional multiplier: "5 per 2 minutes".
        let mut words = unit.split_whitespace();
        let (multiplier, unit) = match (words.next(), words.next(), words.next()) {
            (Some(unit), None, None) => (1, unit),
            (Some(n), Some(unit), None) => (n.parse::<u64>().map_err(|_| invalid())?, unit),
            _ => return Err(invalid()),
        };
        if multiplier == 0 {
            return Err(invalid());
        }

        let unit_secs: u64 = match unit.trim_end_matches('s') {
            "second" => 1,
            "minute" => 60,
            "hour" => 3_600,
            "day" => 86_400,
            _ => return Err(invalid()),
        };

        let period = unit_secs.checked_mul(multiplier).ok_or_else(invalid)?;
        Ok(Self::new(count, Duration::from_secs(period)))
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.period.as_secs();
        let (amount, unit) = [(86_400, "day"), (3_600, "hour"), (60, "minute")]
            .into_iter()
            .find(|(unit_secs, _)| secs % unit_secs == 0)
            .map(|(unit_secs, unit)| (secs / unit_secs, unit))
            .unwrap_or((secs, "second"));

        if amount == 1 {
            write!(f, "{} per {}", self.count, unit)
        } else {
            write!(f, "{} per {} {}s", self.count, amount, unit)
        }
    }
}
