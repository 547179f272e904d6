// SPDX-License-Identifier: MIT

//! Adapts a shared `Arc<dyn TimeSource>` to the `Clock` shape the core data
//! model's constructors expect, for call sites (scheduler, session manager)
//! that only hold the object-safe handle rather than a concrete `Clock`.

use std::sync::Arc;
use std::time::Instant;

use taskforge_core::{Clock, TimeSource};

#[derive(Clone)]
pub struct EpochClock(pub Arc<dyn TimeSource>);

impl Clock for EpochClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        self.0.epoch_ms()
    }
}
