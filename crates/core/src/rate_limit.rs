// SPDX-License-Identifier: MIT

//! Cached rate-limit status (§3 `RateLimitStatus`, §4.2).

use serde::{Deserialize, Serialize};

/// Single-row cached verdict from the rate-limit probe. The store keeps
/// exactly one of these (upsert with id=1, per §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages_limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_used: Option<f64>,
    pub is_limited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_at_ms: Option<u64>,
    pub last_updated_ms: u64,
}

impl RateLimitStatus {
    /// Conservative default: treated as "capacity available" when nothing is
    /// known yet (per §4.2's "timeout/exec failure → unknown; return cached
    /// or conservative default").
    pub fn unknown(now_ms: u64) -> Self {
        Self {
            tier: None,
            messages_used: None,
            messages_limit: None,
            percent_used: None,
            is_limited: false,
            reset_at_ms: None,
            last_updated_ms: now_ms,
        }
    }

    pub fn limited_until(reset_at_ms: u64, now_ms: u64) -> Self {
        Self {
            tier: None,
            messages_used: None,
            messages_limit: None,
            percent_used: None,
            is_limited: true,
            reset_at_ms: Some(reset_at_ms),
            last_updated_ms: now_ms,
        }
    }

    /// True if this status is still in effect as a limited verdict at `now_ms`
    /// — i.e. marked limited and its reset deadline hasn't passed yet.
    pub fn still_limited_at(&self, now_ms: u64) -> bool {
        self.is_limited && self.reset_at_ms.is_some_and(|r| r > now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn still_limited_before_reset() {
        let s = RateLimitStatus::limited_until(1_000, 500);
        assert!(s.still_limited_at(500));
        assert!(s.still_limited_at(999));
    }

    #[test]
    fn not_limited_after_reset() {
        let s = RateLimitStatus::limited_until(1_000, 500);
        assert!(!s.still_limited_at(1_000));
        assert!(!s.still_limited_at(1_500));
    }

    #[test]
    fn unknown_is_not_limited() {
        assert!(!RateLimitStatus::unknown(0).still_limited_at(0));
    }
}
