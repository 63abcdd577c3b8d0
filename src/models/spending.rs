//! Per-user spending counters and the periods they roll over on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Accounting periods for spending counters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SpendPeriod {
    Day,
    Hour,
}

impl SpendPeriod {
    /// Bucket key for a timestamp. Counters reset at period boundaries by
    /// virtue of the key changing, so no sweeper is needed.
    pub fn key(&self, at: DateTime<Utc>) -> String {
        match self {
            SpendPeriod::Day => at.format("%Y-%m-%d").to_string(),
            SpendPeriod::Hour => at.format("%Y-%m-%dT%H").to_string(),
        }
    }
}

/// Running totals for one user in one period
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SpendingState {
    pub spent_usd: f64,
    pub requests: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_period_keys() {
        let at = Utc.with_ymd_and_hms(2026, 8, 7, 13, 45, 0).unwrap();
        assert_eq!(SpendPeriod::Day.key(at), "2026-08-07");
        assert_eq!(SpendPeriod::Hour.key(at), "2026-08-07T13");
    }

    #[test]
    fn test_hour_rollover_changes_key() {
        let before = Utc.with_ymd_and_hms(2026, 8, 7, 13, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 8, 7, 14, 0, 0).unwrap();
        assert_ne!(SpendPeriod::Hour.key(before), SpendPeriod::Hour.key(after));
        assert_eq!(SpendPeriod::Day.key(before), SpendPeriod::Day.key(after));
    }
}
