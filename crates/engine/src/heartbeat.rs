// SPDX-License-Identifier: MIT

//! Heartbeat (§4.5): the periodic tick loop that drives the Scheduler. A
//! single-threaded cooperative loop — `beat()` always runs to completion
//! before the next tick, and no two beats ever overlap.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use taskforge_adapters::{should_skip_probe, RateLimitProbe};
use taskforge_core::{EntityType, EventType, RateLimitStatus, TimeSource};
use taskforge_storage::Store;

use crate::bus::EventBus;
use crate::scheduler::Scheduler;

pub struct Heartbeat {
    scheduler: Scheduler,
    probe: RateLimitProbe,
    store: Arc<dyn Store>,
    bus: EventBus,
    clock: Arc<dyn TimeSource>,
    probe_interval: Duration,
    gc_every_beats: u64,
}

impl Heartbeat {
    pub fn new(
        scheduler: Scheduler,
        probe: RateLimitProbe,
        store: Arc<dyn Store>,
        bus: EventBus,
        clock: Arc<dyn TimeSource>,
        probe_interval: Duration,
        gc_every_beats: u64,
    ) -> Self {
        Self { scheduler, probe, store, bus, clock, probe_interval, gc_every_beats: gc_every_beats.max(1) }
    }

    /// Run the tick loop until `shutdown` is cancelled (§5 "stopping the
    /// engine cancels the heartbeat task"). Session supervisors are
    /// deliberately not cancelled here — see [`crate::session_manager`].
    pub async fn run(&self, interval: Duration, shutdown: CancellationToken) {
        self.bus.emit(EventType::heartbeat_started(), EntityType::System, None, serde_json::json!({})).await;

        let mut beat_count: u64 = 0;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    beat_count += 1;
                    self.beat(beat_count).await;
                }
            }
        }

        self.bus.emit(EventType::heartbeat_stopped(), EntityType::System, None, serde_json::json!({})).await;
    }

    /// Run one beat to completion (§4.5 "per-beat sequence"). Every
    /// component is wrapped independently: one failing component never
    /// blocks the others in the same beat (§7).
    pub async fn beat(&self, beat_count: u64) {
        let now_ms = self.clock.epoch_ms();
        let rate_limit = self.rate_limit_status(now_ms).await;
        let phase = if beat_count % 2 == 1 { "assess" } else { "execute" };

        self.bus
            .emit(
                EventType::heartbeat_tick(),
                EntityType::System,
                None,
                serde_json::json!({
                    "timestamp": now_ms,
                    "rate_limit": rate_limit.is_limited,
                    "beat_number": beat_count,
                    "phase": phase,
                }),
            )
            .await;

        if rate_limit.is_limited {
            self.bus
                .emit(
                    EventType::heartbeat_rate_limited(),
                    EntityType::System,
                    None,
                    serde_json::json!({"reset_at_ms": rate_limit.reset_at_ms}),
                )
                .await;
            return;
        }

        if let Err(e) = self.scheduler.dedupe_tasks().await {
            tracing::warn!(error = %e, beat = beat_count, "dedupe_tasks failed");
        }

        let phase_result = if beat_count % 2 == 1 {
            self.scheduler.assess_phase().await.map(|_| ())
        } else {
            self.scheduler.execute_phase().await
        };
        if let Err(e) = phase_result {
            tracing::warn!(error = %e, beat = beat_count, phase = phase, "scheduler phase failed");
        }

        if beat_count % self.gc_every_beats == 0 {
            if let Err(e) = self.scheduler.cleanup_stale_worktrees().await {
                tracing::warn!(error = %e, beat = beat_count, "cleanup_stale_worktrees failed");
            }
        }
    }

    /// §4.2 `get_rate_limit_status`: skip the probe entirely when the cache
    /// is still valid, otherwise probe and refresh the cache. Probe/store
    /// failures fall back to the cached value, or an optimistic unknown
    /// status if there is none (§7 "transient operational").
    async fn rate_limit_status(&self, now_ms: u64) -> RateLimitStatus {
        let cached = match self.store.get_rate_limit_status().await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read cached rate-limit status");
                None
            }
        };

        if should_skip_probe(cached.as_ref(), now_ms, self.probe_interval) {
            return cached.unwrap_or_else(|| RateLimitStatus::unknown(now_ms));
        }

        match self.probe.probe(now_ms).await {
            Ok(status) => {
                if let Err(e) = self.store.set_rate_limit_status(status.clone()).await {
                    tracing::warn!(error = %e, "failed to persist rate-limit status");
                }
                status
            }
            Err(e) => {
                tracing::warn!(error = %e, "rate-limit probe failed, falling back to cache");
                cached.unwrap_or_else(|| RateLimitStatus::unknown(now_ms))
            }
        }
    }
}
