use chrono::{DateTime, Utc};
use serde::Serialize;

use super::intent::{self, Intent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Think,
    SearchEmail,
    CreateDraft,
    BookMeeting,
    Clarify,
    Done,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Think => "think",
            StepKind::SearchEmail => "search_email",
            StepKind::CreateDraft => "create_draft",
            StepKind::BookMeeting => "book_meeting",
            StepKind::Clarify => "clarify",
            StepKind::Done => "done",
        }
    }

    /// Synthetic steps are bookkeeping only: the executor stamps them done
    /// without calling any collaborator.
    pub fn is_synthetic(self) -> bool {
        matches!(self, StepKind::Think | StepKind::Clarify | StepKind::Done)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Done,
    Failed,
}

/// One unit of orchestrated work. Serialized as-is into the `agentSteps`
/// field of the chat response for the UI step trace.
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub label: String,
    pub status: StepStatus,
    pub result: Option<serde_json::Value>,
    pub detail: Option<String>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Step {
    fn new(kind: StepKind, index: usize, label: impl Into<String>) -> Self {
        Self {
            id: format!(
                "step_{}_{}_{}",
                kind.as_str(),
                index,
                Utc::now().timestamp_millis()
            ),
            kind,
            label: label.into(),
            status: StepStatus::Pending,
            result: None,
            detail: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    fn done_now(mut self) -> Self {
        let now = Utc::now();
        self.status = StepStatus::Done;
        self.started_at = Some(now);
        self.completed_at = Some(now);
        self
    }
}

/// Decompose an approved natural-language goal into the fixed-order step
/// list: think, [search_email], [create_draft], [book_meeting], done.
///
/// Drafting implies searching first, because the reply needs an email to
/// reply to. Steps never reorder based on runtime results.
pub fn build_plan(goal: &str) -> Vec<Step> {
    let draft = intent::wants_draft(goal);
    let scheduling = intent::wants_scheduling(goal);
    let search = intent::wants_search(goal) || draft;

    let mut steps = Vec::new();
    let mut idx = 0usize;

    let mut think = Step::new(StepKind::Think, idx, "Understanding the goal").done_now();
    think.detail = Some(goal.to_string());
    steps.push(think);
    idx += 1;

    if search {
        steps.push(Step::new(StepKind::SearchEmail, idx, "Searching recent email"));
        idx += 1;
    }
    if draft {
        steps.push(Step::new(StepKind::CreateDraft, idx, "Writing the draft reply"));
        idx += 1;
    }
    if scheduling {
        steps.push(Step::new(StepKind::BookMeeting, idx, "Setting up the meeting"));
        idx += 1;
    }

    steps.push(Step::new(StepKind::Done, idx, "Wrapping up"));
    steps
}

/// Build the lighter UI trace for an ordinary (non-approved-plan) message.
/// The trace is display-only: the actual response text comes from a single
/// AI call, whose outcome decides the final step's status.
pub fn build_chat_trace(message: &str, intent: &Intent, ai_ok: bool) -> Vec<Step> {
    let mut steps = Vec::new();
    let mut idx = 0usize;

    let mut think = Step::new(StepKind::Think, idx, "Reading the message").done_now();
    think.detail = Some(message.chars().take(120).collect());
    steps.push(think);
    idx += 1;

    steps.push(Step::new(StepKind::Clarify, idx, "Working out what you need").done_now());
    idx += 1;

    if intent.actionable {
        steps.push(Step::new(StepKind::SearchEmail, idx, "Checking inbox context").done_now());
        idx += 1;
    }

    let mut compose = Step::new(StepKind::CreateDraft, idx, "Composing the response");
    let now = Utc::now();
    compose.started_at = Some(now);
    compose.completed_at = Some(now);
    compose.status = if ai_ok { StepStatus::Done } else { StepStatus::Failed };
    if !ai_ok {
        compose.error = Some("Response generation failed".to_string());
    }
    steps.push(compose);

    steps
}
