// SPDX-License-Identifier: MIT

//! Batch triage of pending tasks via a single LLM call (§4.5 "Assessment
//! phase"). Abstracted behind [`Assessor`] so the scheduler's tests can
//! supply a deterministic fake instead of shelling out.

use async_trait::async_trait;
use std::time::Duration;

use taskforge_core::{Assessment, Complexity, TaskId};

use taskforge_adapters::subprocess::{run_with_timeout, SubprocessError};
use taskforge_wire::stream_event::ResultEvent;

#[derive(Debug, Clone)]
pub struct AssessmentRequest {
    pub id: TaskId,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct AssessmentResult {
    pub id: TaskId,
    pub complexity: Complexity,
    pub recommended_model: String,
    pub assessment: Assessment,
    pub comment: Option<String>,
}

impl AssessmentResult {
    /// Conservative fallback applied to every task in the batch on LLM
    /// failure or on a task missing from the parsed response (§4.5).
    pub fn conservative_default(id: TaskId) -> Self {
        Self {
            id,
            complexity: Complexity::Medium,
            recommended_model: "sonnet".to_string(),
            assessment: Assessment::default(),
            comment: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssessError {
    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
    #[error("assessment call failed: {0}")]
    CliError(String),
    #[error("could not parse assessment response: {0}")]
    Parse(#[from] serde_json::Error),
}

#[async_trait]
pub trait Assessor: Send + Sync {
    async fn assess(&self, requests: &[AssessmentRequest]) -> Result<Vec<AssessmentResult>, AssessError>;
}

#[derive(serde::Deserialize)]
struct RawAssessment {
    id: String,
    complexity: Complexity,
    recommended_model: String,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    subtasks: Vec<String>,
    #[serde(default)]
    should_decompose: bool,
    #[serde(default)]
    comment: Option<String>,
}

/// Drives the agent CLI in one-shot JSON mode with a single batched prompt
/// covering every task in the request (§4.5 "send a single structured
/// prompt... parse a JSON array response").
#[derive(Clone)]
pub struct CliAssessor {
    cli_path: String,
    model: String,
    timeout: Duration,
}

impl CliAssessor {
    pub fn new(cli_path: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self { cli_path: cli_path.into(), model: model.into(), timeout }
    }

    fn build_prompt(requests: &[AssessmentRequest]) -> String {
        let triples: Vec<serde_json::Value> = requests
            .iter()
            .map(|r| serde_json::json!({"id": r.id.to_string(), "title": r.title, "description": r.description}))
            .collect();
        format!(
            "Assess each task below for complexity (simple|medium|complex), a recommended model, \
             and whether it should be decomposed into subtasks. Respond with ONLY a JSON array, \
             one object per task, each shaped as \
             {{\"id\":..,\"complexity\":..,\"recommended_model\":..,\"reasoning\":..,\"subtasks\":[..],\
             \"should_decompose\":..,\"comment\":..}}.\n\nTasks:\n{}",
            serde_json::to_string(&triples).unwrap_or_default()
        )
    }
}

#[async_trait]
impl Assessor for CliAssessor {
    async fn assess(&self, requests: &[AssessmentRequest]) -> Result<Vec<AssessmentResult>, AssessError> {
        let prompt = Self::build_prompt(requests);
        let args = ["-p", "--output-format", "json", "--model", &self.model, "--dangerously-skip-permissions", &prompt];
        let output = run_with_timeout(&self.cli_path, &args, None, self.timeout).await?;
        if !output.success() {
            return Err(AssessError::CliError(output.stderr));
        }

        let result: ResultEvent = serde_json::from_str(output.stdout.trim())?;
        if result.is_error {
            return Err(AssessError::CliError(result.result));
        }

        let raw: Vec<RawAssessment> = serde_json::from_str(extract_json_array(&result.result))?;
        Ok(raw
            .into_iter()
            .map(|r| AssessmentResult {
                id: TaskId::from_string(r.id),
                complexity: r.complexity,
                recommended_model: r.recommended_model,
                assessment: Assessment { reasoning: r.reasoning, subtasks: r.subtasks, should_decompose: r.should_decompose },
                comment: r.comment,
            })
            .collect())
    }
}

/// The agent CLI sometimes wraps its JSON answer in prose or code fences;
/// take the outermost `[...]` span.
fn extract_json_array(text: &str) -> &str {
    match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    }
}
