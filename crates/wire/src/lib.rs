// SPDX-License-Identifier: MIT

//! The agent-CLI wire contract (§4.3, §6 "Agent CLI contract"): the
//! stream-json event envelope the CLI driver parses off stdout, and the
//! rate-limit phrase / reset-time parser the probe and the driver both use
//! to detect quota exhaustion in-band.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod rate_limit_text;
pub mod stream_event;

pub use rate_limit_text::{contains_rate_limit_phrase, parse_reset_time};
pub use stream_event::{ContentBlock, StreamEvent, TextExtraction};
