use chrono::Utc;
use serde::Serialize;

use super::executor::{SchedulingKind, StepOutputs};

#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Structured output of one plan run, as surfaced to the UI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub changes: Vec<String>,
    pub artifacts: Vec<Artifact>,
    pub next_monitoring: Option<serde_json::Value>,
}

pub struct Synthesis {
    pub message: String,
    pub changes: Vec<String>,
    pub artifacts: Vec<Artifact>,
}

impl Synthesis {
    pub fn into_result(self, success: bool) -> (String, ExecutionResult) {
        (
            self.message,
            ExecutionResult {
                success,
                changes: self.changes,
                artifacts: self.artifacts,
                next_monitoring: None,
            },
        )
    }
}

/// Turn accumulated step outputs into one user-facing summary.
///
/// Priority is policy, not accident: a concrete artifact (draft, meeting)
/// always outranks a count-of-emails report, and a reported failure always
/// outranks the generic fallback. First match wins.
pub fn synthesize(
    outputs: &StepOutputs,
    ok: bool,
    error: Option<&str>,
    goal: &str,
) -> Synthesis {
    if let Some(draft) = &outputs.draft {
        let id = draft
            .original_email_id
            .clone()
            .unwrap_or_else(|| format!("draft_{}", Utc::now().timestamp_millis()));
        return Synthesis {
            message: format!(
                "Your draft for {} is ready to review. Open it, tweak anything you like, and send when you're happy.",
                draft.recipient_name
            ),
            changes: vec![
                format!("Draft written for {}", draft.recipient_name),
                format!("Subject: {}", draft.subject),
            ],
            artifacts: vec![Artifact {
                kind: "draft".to_string(),
                id: Some(id),
                label: Some("View draft".to_string()),
                url: None,
            }],
        };
    }

    if let Some(scheduling) = &outputs.scheduling {
        let message = match scheduling.kind {
            SchedulingKind::GoogleMeet => format!(
                "Your meeting is on the calendar with a Meet link: {}",
                scheduling.booking_url
            ),
            SchedulingKind::SchedulingLink => format!(
                "Here's a scheduling link to share: {}",
                scheduling.booking_url
            ),
        };
        return Synthesis {
            message,
            changes: vec![format!(
                "Meeting set up ({} min)",
                scheduling.duration_minutes
            )],
            artifacts: vec![Artifact {
                kind: "event".to_string(),
                id: None,
                label: Some("Open scheduling link".to_string()),
                url: Some(scheduling.booking_url.clone()),
            }],
        };
    }

    if let Some(search) = &outputs.search {
        if search.response.count >= 1 {
            let count = search.response.count;
            let noun = if count == 1 { "email" } else { "emails" };
            return Synthesis {
                message: format!("Found {} {} matching your request.", count, noun),
                changes: vec![format!("Searched inbox ({})", search.query)],
                artifacts: Vec::new(),
            };
        }
    }

    if !ok {
        let reason = error.unwrap_or("something went wrong along the way");
        return Synthesis {
            message: format!(
                "I couldn't finish that plan: {}. Want me to try again?",
                reason
            ),
            changes: Vec::new(),
            artifacts: Vec::new(),
        };
    }

    Synthesis {
        message: format!("Done with \"{}\".", goal),
        changes: Vec::new(),
        artifacts: Vec::new(),
    }
}
