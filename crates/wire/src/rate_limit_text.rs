// SPDX-License-Identifier: MIT

//! Rate-limit phrase detection and reset-time parsing (§4.2).
//!
//! Both the probe and the CLI driver scan raw CLI output for these phrases;
//! this module is the single source of truth for the regex and the
//! reset-time grammar so the two stay in sync.

use chrono::{Local, TimeZone};
use std::sync::OnceLock;

fn phrase_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::RegexBuilder::new(
            r"you.ve hit your limit|rate limit|too many requests|usage limit|exceeded.*quota|capacity",
        )
        .case_insensitive(true)
        .build()
        .expect("static rate-limit phrase regex is valid")
    })
}

/// True if `text` contains one of the case-insensitive rate-limit phrases
/// from §4.2's table.
pub fn contains_rate_limit_phrase(text: &str) -> bool {
    phrase_regex().is_match(text)
}

fn clock_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::RegexBuilder::new(r"resets?\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)\s*(?:\(([^)]+)\))?")
            .case_insensitive(true)
            .build()
            .expect("static reset-clock regex is valid")
    })
}

fn iso_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:\d{2})?")
            .expect("static iso-8601 regex is valid")
    })
}

fn try_again_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::RegexBuilder::new(r"try again in\s+(\d+)\s*(minutes?|hours?)")
            .case_insensitive(true)
            .build()
            .expect("static try-again regex is valid")
    })
}

/// Parse a reset-time phrase out of free text, returning an epoch-ms
/// deadline. Tries, in order: (a) `resets <H>[:M]<am|pm> (<tz>)`, (b) an
/// embedded ISO-8601 datetime, (c) `try again in N (minutes|hours)`. Falls
/// back to `now_ms + 1 hour` when rate-limited but no pattern matches,
/// per §4.2.
///
/// The timezone name captured in (a), if present, is parsed but not
/// honored — per the open question in §9, reset-clock phrases are
/// interpreted as the process's local time regardless of the embedded tz
/// name.
pub fn parse_reset_time(text: &str, now_ms: u64) -> u64 {
    if let Some(ms) = parse_clock_phrase(text, now_ms) {
        return ms;
    }
    if let Some(ms) = parse_iso_phrase(text) {
        return ms;
    }
    if let Some(ms) = parse_try_again_phrase(text, now_ms) {
        return ms;
    }
    now_ms + 60 * 60 * 1000
}

fn parse_clock_phrase(text: &str, now_ms: u64) -> Option<u64> {
    let caps = clock_regex().captures(text)?;
    let mut hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(2).map(|m| m.as_str().parse().ok()).unwrap_or(Some(0))?;
    let is_pm = caps.get(3)?.as_str().eq_ignore_ascii_case("pm");

    if hour == 12 {
        hour = 0;
    }
    if is_pm {
        hour += 12;
    }
    if hour > 23 || minute > 59 {
        return None;
    }

    let now = Local.timestamp_millis_opt(now_ms as i64).single()?;
    let today = now.date_naive().and_hms_opt(hour, minute, 0)?;
    let mut candidate = Local.from_local_datetime(&today).single()?;
    if candidate <= now {
        candidate = candidate + chrono::Duration::days(1);
    }
    Some(candidate.timestamp_millis().max(0) as u64)
}

fn parse_iso_phrase(text: &str) -> Option<u64> {
    let m = iso_regex().find(text)?;
    let raw = m.as_str();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis().max(0) as u64);
    }
    // No offset/Z suffix: interpret as UTC.
    let naive = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Some(naive.and_utc().timestamp_millis().max(0) as u64)
}

fn parse_try_again_phrase(text: &str, now_ms: u64) -> Option<u64> {
    let caps = try_again_regex().captures(text)?;
    let n: u64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str().to_ascii_lowercase();
    let delta_ms = if unit.starts_with("hour") { n * 60 * 60 * 1000 } else { n * 60 * 1000 };
    Some(now_ms + delta_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[yare::parameterized(
        hit_your_limit = { "You've hit your limit for today", true },
        rate_limit = { "RATE LIMIT exceeded", true },
        too_many_requests = { "too many requests, slow down", true },
        usage_limit = { "usage limit reached", true },
        exceeded_quota = { "you have exceeded your quota", true },
        capacity = { "no capacity available right now", true },
        unrelated_text = { "everything is fine", false },
    )]
    fn detects_each_phrase_case_insensitively(text: &str, expected: bool) {
        assert_eq!(contains_rate_limit_phrase(text), expected);
    }

    #[test]
    fn parses_clock_phrase_into_future_timestamp() {
        let now_ms: u64 = 1_700_000_000_000;
        let ms = parse_reset_time("resets 8pm (America/New_York)", now_ms);
        assert!(ms > now_ms);
        assert!(ms - now_ms <= 24 * 60 * 60 * 1000);
    }

    #[test]
    fn parses_clock_phrase_with_minutes() {
        let now_ms: u64 = 1_700_000_000_000;
        let ms = parse_reset_time("resets 10:30pm (UTC)", now_ms);
        assert!(ms > now_ms);
    }

    #[test]
    fn parses_iso8601_datetime() {
        let now_ms: u64 = 1_700_000_000_000;
        let ms = parse_reset_time("limit resets at 2024-06-01T12:00:00Z", now_ms);
        let expected = chrono::DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z").unwrap();
        assert_eq!(ms, expected.timestamp_millis() as u64);
    }

    #[test]
    fn parses_try_again_in_minutes() {
        let now_ms: u64 = 1_700_000_000_000;
        let ms = parse_reset_time("please try again in 45 minutes", now_ms);
        assert_eq!(ms, now_ms + 45 * 60 * 1000);
    }

    #[test]
    fn parses_try_again_in_hours() {
        let now_ms: u64 = 1_700_000_000_000;
        let ms = parse_reset_time("try again in 2 hours", now_ms);
        assert_eq!(ms, now_ms + 2 * 60 * 60 * 1000);
    }

    #[test]
    fn defaults_to_one_hour_when_no_pattern_matches() {
        let now_ms: u64 = 1_700_000_000_000;
        let ms = parse_reset_time("rate limit hit, no further detail", now_ms);
        assert_eq!(ms, now_ms + 60 * 60 * 1000);
    }

    proptest::proptest! {
        /// §8 "Reset-time parse round-trips": whatever `now_ms` is, a
        /// `try again in N minutes/hours` phrase always parses to a
        /// timestamp strictly in the future, displaced by exactly the
        /// stated delta.
        #[test]
        fn try_again_phrase_always_yields_future_timestamp(
            now_ms in 0u64..=4_102_444_800_000, // up to year 2100
            n in 1u64..10_000,
            hours in proptest::bool::ANY,
        ) {
            let unit = if hours { "hours" } else { "minutes" };
            let text = format!("please try again in {n} {unit}");
            let ms = parse_reset_time(&text, now_ms);
            let expected_delta = if hours { n * 60 * 60 * 1000 } else { n * 60 * 1000 };
            proptest::prop_assert_eq!(ms, now_ms + expected_delta);
            proptest::prop_assert!(ms > now_ms);
        }

        /// A `resets <H>[:M]<am|pm>` phrase, for any valid hour/minute, always
        /// parses to a timestamp within the next 24 hours of `now_ms`.
        #[test]
        fn clock_phrase_always_yields_timestamp_within_a_day(
            now_ms in 0u64..=4_102_444_800_000,
            hour in 1u32..=12,
            minute in 0u32..60,
            pm in proptest::bool::ANY,
        ) {
            let meridiem = if pm { "pm" } else { "am" };
            let text = format!("resets {hour}:{minute:02}{meridiem} (UTC)");
            if let Some(ms) = parse_clock_phrase(&text, now_ms) {
                proptest::prop_assert!(ms > now_ms);
                proptest::prop_assert!(ms - now_ms <= 24 * 60 * 60 * 1000);
            }
        }
    }
}
