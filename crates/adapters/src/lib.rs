// SPDX-License-Identifier: MIT

//! External collaborators the engine drives as subprocesses: the agent CLI
//! (§4.3), the rate-limit probe (§4.2), and the git/PR adapter (§4.7, §6).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod driver;
pub mod git;
pub mod probe;
pub mod subprocess;

pub use driver::{AgentCliDriver, DriverError, RunOutcome};
pub use git::{GitAdapter, GitError};
pub use probe::{mark_rate_limited, should_skip_probe, ProbeError, RateLimitProbe};
