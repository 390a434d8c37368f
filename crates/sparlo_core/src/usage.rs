use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const USAGE_WARNING_PERCENT: u8 = 80;

/// Result of the backend usage-check call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub tokens_used: u64,
    pub tokens_limit: u64,
    pub reports_count: u64,
    pub chat_tokens_used: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UsageLevel {
    Normal,
    Warning,
    Exceeded,
}

impl UsageSnapshot {
    /// Whole percent of the token allowance used, capped at 100.
    pub fn percent_used(&self) -> u8 {
        if self.tokens_limit == 0 {
            return if self.tokens_used > 0 { 100 } else { 0 };
        }
        let percent = self.tokens_used.saturating_mul(100) / self.tokens_limit;
        percent.min(100) as u8
    }

    pub fn level(&self) -> UsageLevel {
        if self.tokens_limit > 0 && self.tokens_used >= self.tokens_limit {
            UsageLevel::Exceeded
        } else if self.tokens_limit == 0 && self.tokens_used > 0 {
            UsageLevel::Exceeded
        } else if self.percent_used() >= USAGE_WARNING_PERCENT {
            UsageLevel::Warning
        } else {
            UsageLevel::Normal
        }
    }

    pub fn tokens_remaining(&self) -> u64 {
        self.tokens_limit.saturating_sub(self.tokens_used)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Incomplete,
    Unpaid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub period_ends_at: Option<DateTime<Utc>>,
}

impl Subscription {
    /// Paid features stay available through the current period, even after cancelling.
    pub fn is_entitled(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            SubscriptionStatus::Active | SubscriptionStatus::Trialing => true,
            SubscriptionStatus::Canceled => self.period_ends_at.is_some_and(|end| end > now),
            SubscriptionStatus::PastDue
            | SubscriptionStatus::Incomplete
            | SubscriptionStatus::Unpaid => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn usage(used: u64, limit: u64) -> UsageSnapshot {
        UsageSnapshot {
            tokens_used: used,
            tokens_limit: limit,
            ..UsageSnapshot::default()
        }
    }

    #[test]
    fn levels_follow_thresholds() {
        assert_eq!(usage(10, 100).level(), UsageLevel::Normal);
        assert_eq!(usage(80, 100).level(), UsageLevel::Warning);
        assert_eq!(usage(100, 100).level(), UsageLevel::Exceeded);
        assert_eq!(usage(250, 100).percent_used(), 100);
        assert_eq!(usage(0, 0).level(), UsageLevel::Normal);
    }

    #[test]
    fn cancelled_subscription_runs_out_at_period_end() {
        let now = Utc::now();
        let sub = Subscription {
            status: SubscriptionStatus::Canceled,
            period_ends_at: Some(now + Duration::days(3)),
        };
        assert!(sub.is_entitled(now));
        assert!(!sub.is_entitled(now + Duration::days(4)));
    }
}
