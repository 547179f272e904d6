// SPDX-License-Identifier: MIT

//! Prompt construction for a launched session (§4.5 execute phase) and
//! review-comment extraction from a finished session's transcript (§4.5
//! `mark_task_ready_for_review`).

use std::sync::OnceLock;

use taskforge_core::{Comment, Task};
use taskforge_wire::StreamEvent;

const GIT_RULES: &str = "\
Do not run any git commands yourself (no `git add`, `git commit`, `git push`, \
branch creation, or similar). The orchestrator owns all git operations for \
this task; your job is only to edit files in the working directory.";

const CLOSING_INSTRUCTION: &str = "End your final reply with a `## How to test` section describing how to verify this change.";

const REVIEW_COMMENT_MAX_CHARS: usize = 1500;

/// Build the prompt handed to `start_session` for a task launch.
pub fn build_launch_prompt(task: &Task, comments: &[Comment]) -> String {
    let mut sections = vec![format!("# {}", task.title), task.description.clone()];

    if !comments.is_empty() {
        let mut history = String::from("## Comment history\n");
        for c in comments {
            history.push_str(&format!("- ({}) {}\n", c.author, c.content));
        }
        sections.push(history);
    }

    sections.push(GIT_RULES.to_string());
    sections.push(CLOSING_INSTRUCTION.to_string());
    sections.join("\n\n")
}

fn how_to_test_heading() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::RegexBuilder::new(r"^#{1,3}\s*how to test")
            .case_insensitive(true)
            .multi_line(true)
            .build()
            .expect("static heading regex is valid")
    })
}

/// Parse a session's raw stdout (one `stream-json` event per line) into the
/// review comment body: everything from a `## How to test` heading (any of
/// `#`/`##`/`###`) to end of text if found, else the last 40 lines — both
/// truncated to 1500 chars (§4.5 step 2).
pub fn extract_review_comment(stdout: &str) -> String {
    let mut text = String::new();
    for line in stdout.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(event) = StreamEvent::parse_line(line) {
            if let Some(extracted) = event.extract_text() {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&extracted);
            }
        }
    }

    let body = if let Some(m) = how_to_test_heading().find(&text) {
        text[m.start()..].to_string()
    } else {
        last_n_lines(&text, 40)
    };

    truncate_chars(&body, REVIEW_COMMENT_MAX_CHARS)
}

fn last_n_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

/// Truncate a PR body to `max_chars`, per §4.5 step 3 (65000-char cap).
pub fn truncate_pr_body(text: &str, max_chars: usize) -> String {
    truncate_chars(text, max_chars)
}
