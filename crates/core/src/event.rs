// SPDX-License-Identifier: MIT

//! Event envelope: the wire and storage form for everything emitted on the
//! event bus (§4.1) and persisted for audit.
//!
//! Per the design notes, the dotted `event_type` string stays the wire/storage
//! form, but callers get a closed, validated constructor surface
//! ([`EventType`]) rather than building arbitrary strings by hand.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

use crate::clock::Clock;

/// A dotted `category.verb` event type tag, e.g. `task.created`.
///
/// Construct well-known types via the associated functions (`EventType::task_created()`,
/// `EventType::heartbeat_tick()`, ...), or parse an externally-supplied tag with
/// [`EventType::parse`], which validates the `category.verb` shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(Cow<'static, str>);

/// Subscribing to this type delivers every event, regardless of its own type.
pub const WILDCARD: &str = "*";

impl EventType {
    const fn from_static(s: &'static str) -> Self {
        Self(Cow::Borrowed(s))
    }

    /// Parse and validate an event type string (`"*"` or `category.verb`,
    /// lowercase ascii + underscores in each segment).
    pub fn parse(s: impl Into<String>) -> Result<Self, InvalidEventType> {
        let s = s.into();
        if s == WILDCARD {
            return Ok(Self(Cow::Borrowed(WILDCARD)));
        }
        let valid = s
            .split('.')
            .filter(|seg| !seg.is_empty())
            .all(|seg| seg.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'))
            && s.matches('.').count() >= 1
            && !s.starts_with('.')
            && !s.ends_with('.');
        if valid {
            Ok(Self(Cow::Owned(s)))
        } else {
            Err(InvalidEventType(s))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.0.as_ref() == WILDCARD
    }

    pub fn wildcard() -> Self {
        Self(Cow::Borrowed(WILDCARD))
    }

    // -- heartbeat.* --
    pub fn heartbeat_started() -> Self { Self::from_static("heartbeat.started") }
    pub fn heartbeat_stopped() -> Self { Self::from_static("heartbeat.stopped") }
    pub fn heartbeat_tick() -> Self { Self::from_static("heartbeat.tick") }
    pub fn heartbeat_rate_limited() -> Self { Self::from_static("heartbeat.rate_limited") }

    // -- task.* --
    pub fn task_created() -> Self { Self::from_static("task.created") }
    pub fn task_updated() -> Self { Self::from_static("task.updated") }
    pub fn task_assessed() -> Self { Self::from_static("task.assessed") }
    pub fn task_executing() -> Self { Self::from_static("task.executing") }
    pub fn task_ready_for_review() -> Self { Self::from_static("task.ready_for_review") }
    pub fn task_completed() -> Self { Self::from_static("task.completed") }
    pub fn task_failed() -> Self { Self::from_static("task.failed") }
    pub fn task_cancelled() -> Self { Self::from_static("task.cancelled") }
    pub fn task_needs_decomposition() -> Self { Self::from_static("task.needs_decomposition") }
    pub fn task_requeued() -> Self { Self::from_static("task.requeued") }

    // -- session.* --
    pub fn session_created() -> Self { Self::from_static("session.created") }
    pub fn session_started() -> Self { Self::from_static("session.started") }
    pub fn session_output() -> Self { Self::from_static("session.output") }
    pub fn session_turn_completed() -> Self { Self::from_static("session.turn_completed") }
    pub fn session_completed() -> Self { Self::from_static("session.completed") }
    pub fn session_failed() -> Self { Self::from_static("session.failed") }
    pub fn session_cancelled() -> Self { Self::from_static("session.cancelled") }
    pub fn session_rate_limited() -> Self { Self::from_static("session.rate_limited") }
    pub fn session_message_sent() -> Self { Self::from_static("session.message_sent") }

    // -- comment / project / tasks --
    pub fn comment_created() -> Self { Self::from_static("comment.created") }
    pub fn project_created() -> Self { Self::from_static("project.created") }
    pub fn project_switched() -> Self { Self::from_static("project.switched") }
    pub fn tasks_reordered() -> Self { Self::from_static("tasks.reordered") }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidEventType(pub String);

impl fmt::Display for InvalidEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid event type (expected \"category.verb\"): {:?}", self.0)
    }
}

impl std::error::Error for InvalidEventType {}

/// What kind of entity an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Task,
    Session,
    System,
    Project,
    Comment,
}

crate::simple_display! {
    EntityType {
        Task => "task",
        Session => "session",
        System => "system",
        Project => "project",
        Comment => "comment",
    }
}

/// Persistent record of a state change, delivered on the bus and durably
/// stored for audit (§3 `Event`, §6 event envelope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub event_type: EventType,
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    pub payload: Value,
    pub timestamp_ms: u64,
}

impl Event {
    pub fn new(
        event_type: EventType,
        entity_type: EntityType,
        entity_id: Option<String>,
        payload: Value,
        clock: &impl Clock,
    ) -> Self {
        Self {
            id: nanoid::nanoid!(21),
            event_type,
            entity_type,
            entity_id,
            payload,
            timestamp_ms: clock.epoch_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;

    #[test]
    fn well_known_constructors_are_dotted() {
        assert_eq!(EventType::task_created().as_str(), "task.created");
        assert_eq!(EventType::heartbeat_tick().as_str(), "heartbeat.tick");
    }

    #[test]
    fn parse_accepts_valid_dotted_string() {
        let t = EventType::parse("task.created").unwrap();
        assert_eq!(t, EventType::task_created());
    }

    #[test]
    fn parse_accepts_wildcard() {
        assert!(EventType::parse("*").unwrap().is_wildcard());
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(EventType::parse("no-dot").is_err());
        assert!(EventType::parse(".leading").is_err());
        assert!(EventType::parse("trailing.").is_err());
        assert!(EventType::parse("Has.Upper").is_err());
    }

    #[test]
    fn event_carries_timestamp_from_clock() {
        let clock = FakeClock::new();
        let e = Event::new(
            EventType::task_created(),
            EntityType::Task,
            Some("tsk-1".into()),
            serde_json::json!({"title": "x"}),
            &clock,
        );
        assert_eq!(e.timestamp_ms, clock.epoch_ms());
        assert_eq!(e.event_type.as_str(), "task.created");
    }
}
