// SPDX-License-Identifier: MIT

//! Comment identifier and record.

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::task::TaskId;

crate::define_id! {
    /// Unique identifier for a comment.
    #[derive(Default)]
    pub struct CommentId("cmt-");
}

/// Who authored a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentAuthor {
    User,
    System,
}

crate::simple_display! {
    CommentAuthor {
        User => "user",
        System => "system",
    }
}

/// An annotation on a task: authored by the user via the API, by the engine
/// when assessing, or by the engine when a task transitions to review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub task_id: TaskId,
    pub content: String,
    pub author: CommentAuthor,
    pub created_at_ms: u64,
}

impl Comment {
    pub fn new(task_id: TaskId, content: impl Into<String>, author: CommentAuthor, clock: &impl Clock) -> Self {
        Self { id: CommentId::new(), task_id, content: content.into(), author, created_at_ms: clock.epoch_ms() }
    }

    /// A task is eligible for the bot to keep driving on iff it has no
    /// comments, or its latest comment was authored by the user (otherwise
    /// the bot would be replying to its own review summary forever).
    pub fn bot_may_act(latest: Option<&Comment>) -> bool {
        match latest {
            None => true,
            Some(c) => c.author == CommentAuthor::User,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;

    #[test]
    fn bot_may_act_with_no_comments() {
        assert!(Comment::bot_may_act(None));
    }

    #[test]
    fn bot_may_act_after_user_comment() {
        let clock = FakeClock::new();
        let c = Comment::new(TaskId::new(), "hi", CommentAuthor::User, &clock);
        assert!(Comment::bot_may_act(Some(&c)));
    }

    #[test]
    fn bot_may_not_act_after_its_own_comment() {
        let clock = FakeClock::new();
        let c = Comment::new(TaskId::new(), "review summary", CommentAuthor::System, &clock);
        assert!(!Comment::bot_may_act(Some(&c)));
    }
}
