// SPDX-License-Identifier: MIT

//! Rate-Limit Probe (§4.2): periodically checks whether the agent CLI
//! currently has quota, caching the verdict so repeated calls within the
//! probe interval are free.

use std::time::Duration;

use tracing::Instrument;

use taskforge_core::RateLimitStatus;
use taskforge_wire::stream_event::ResultEvent;
use taskforge_wire::{contains_rate_limit_phrase, parse_reset_time};

use crate::subprocess::{run_with_timeout, SubprocessError};

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
    #[error("probe produced no parseable output")]
    Unparseable,
}

/// Invokes the agent CLI in one-shot JSON mode with a trivial prompt and
/// interprets the result per §4.2's signal table.
#[derive(Clone)]
pub struct RateLimitProbe {
    cli_path: String,
    timeout: Duration,
}

impl RateLimitProbe {
    pub fn new(cli_path: impl Into<String>, timeout: Duration) -> Self {
        Self { cli_path: cli_path.into(), timeout }
    }

    /// Run a single probe. `now_ms` is used only for reset-time computation
    /// when a rate-limit phrase is found without an explicit deadline.
    pub async fn probe(&self, now_ms: u64) -> Result<RateLimitStatus, ProbeError> {
        let span = tracing::info_span!("rate_limit.probe", cli = %self.cli_path);
        let start = std::time::Instant::now();
        let result = self.probe_inner(now_ms).instrument(span).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(status) => tracing::info!(elapsed_ms, is_limited = status.is_limited, "probe completed"),
            Err(e) => tracing::warn!(elapsed_ms, error = %e, "probe failed"),
        }
        result
    }

    async fn probe_inner(&self, now_ms: u64) -> Result<RateLimitStatus, ProbeError> {
        let token = probe_token();
        let prompt = format!("Reply with only the word OK. token={token}");
        let args = ["-p", "--output-format", "json", "--dangerously-skip-permissions", &prompt];
        let output = run_with_timeout(&self.cli_path, &args, None, self.timeout).await?;

        if output.success() {
            if let Ok(result) = serde_json::from_str::<ResultEvent>(output.stdout.trim()) {
                if !result.is_error {
                    return Ok(RateLimitStatus {
                        tier: None,
                        messages_used: None,
                        messages_limit: None,
                        percent_used: None,
                        is_limited: false,
                        reset_at_ms: None,
                        last_updated_ms: now_ms,
                    });
                }
                if contains_rate_limit_phrase(&result.result) {
                    let reset_at_ms = parse_reset_time(&result.result, now_ms);
                    return Ok(RateLimitStatus::limited_until(reset_at_ms, now_ms));
                }
            }
            return Ok(RateLimitStatus::unknown(now_ms));
        }

        if contains_rate_limit_phrase(&output.stderr) {
            let reset_at_ms = parse_reset_time(&output.stderr, now_ms);
            return Ok(RateLimitStatus::limited_until(reset_at_ms, now_ms));
        }

        Err(ProbeError::Unparseable)
    }
}

fn probe_token() -> u128 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or(0)
}

/// Decide whether a cached status is still fresh enough to skip a new probe
/// (§4.2 "at most one probe per 5 minutes ... if limited with a future
/// reset_at, the probe is skipped entirely").
pub fn should_skip_probe(cached: Option<&RateLimitStatus>, now_ms: u64, probe_interval: Duration) -> bool {
    match cached {
        Some(status) if status.still_limited_at(now_ms) => true,
        Some(status) => now_ms.saturating_sub(status.last_updated_ms) < probe_interval.as_millis() as u64,
        None => false,
    }
}

/// Build a rate-limited status from a mid-session signal (§4.3
/// `mark_rate_limited`, invoked by the session manager).
pub fn mark_rate_limited(reset_at_ms: u64, now_ms: u64) -> RateLimitStatus {
    RateLimitStatus::limited_until(reset_at_ms, now_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_probe_when_cached_limited_and_reset_in_future() {
        let cached = RateLimitStatus::limited_until(2_000, 500);
        assert!(should_skip_probe(Some(&cached), 1_000, Duration::from_secs(300)));
    }

    #[test]
    fn do_not_skip_once_reset_has_passed() {
        let cached = RateLimitStatus::limited_until(2_000, 500);
        assert!(!should_skip_probe(Some(&cached), 2_500, Duration::from_secs(300)));
    }

    #[test]
    fn skip_probe_within_cadence_window_even_if_not_limited() {
        let cached = RateLimitStatus::unknown(1_000);
        assert!(should_skip_probe(Some(&cached), 1_100, Duration::from_secs(300)));
    }

    #[test]
    fn run_probe_after_cadence_window_elapses() {
        let cached = RateLimitStatus::unknown(1_000);
        assert!(!should_skip_probe(Some(&cached), 1_000 + 301_000, Duration::from_secs(300)));
    }

    #[test]
    fn no_cache_never_skips() {
        assert!(!should_skip_probe(None, 1_000, Duration::from_secs(300)));
    }
}
