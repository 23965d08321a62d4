use anyhow::{Result, anyhow, bail};
use chrono::{Duration, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use super::llm::ChatMessage;
use super::plan::{Step, StepKind, StepStatus};
use super::services::{
    Collaborators, DraftOptions, EmailHit, MeetingRequest, SearchRequest, SearchResponse,
};

/// Fixed query for the plan path: the goal decides whether we search at all,
/// not what we search for.
const SEARCH_QUERY: &str = "newer_than:7d";
const SEARCH_MAX_RESULTS: u32 = 5;
const DEFAULT_DURATION_MIN: u32 = 30;

/// Per-request context threaded explicitly through every step handler.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub user_name: String,
    pub user_email: String,
    pub goal: String,
    pub conversation_history: Vec<ChatMessage>,
    pub privacy_mode: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftData {
    pub content: String,
    pub thought: String,
    pub recipient_name: String,
    pub recipient_email: String,
    pub sender_name: String,
    pub original_email_id: Option<String>,
    pub thread_id: Option<String>,
    pub message_id: Option<String>,
    pub subject: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingKind {
    GoogleMeet,
    SchedulingLink,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingData {
    pub booking_url: String,
    pub duration_minutes: u32,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: SchedulingKind,
}

#[derive(Debug, Clone)]
pub struct SearchOutput {
    pub response: SearchResponse,
    pub query: String,
}

/// Result bag shared across steps within one execution. Written by exactly
/// one step handler at a time; later handlers read earlier slots (the draft
/// handler reads the search slot), which is why steps never run in parallel.
#[derive(Default)]
pub struct StepOutputs {
    pub search: Option<SearchOutput>,
    pub draft: Option<DraftData>,
    pub scheduling: Option<SchedulingData>,
}

pub struct ExecutionOutcome {
    pub steps: Vec<Step>,
    pub outputs: StepOutputs,
    pub ok: bool,
    pub error: Option<String>,
}

/// Run the step list strictly in order. The first failed step halts the
/// pipeline: its error is recorded, every later step stays pending.
pub async fn execute_plan(
    mut steps: Vec<Step>,
    ctx: &ExecutionContext,
    services: &Collaborators,
) -> ExecutionOutcome {
    let mut outputs = StepOutputs::default();
    let mut ok = true;
    let mut error: Option<String> = None;

    for step in steps.iter_mut() {
        if step.kind.is_synthetic() {
            if step.status != StepStatus::Done {
                let now = Utc::now();
                step.status = StepStatus::Done;
                step.started_at = Some(now);
                step.completed_at = Some(now);
            }
            continue;
        }

        step.status = StepStatus::Running;
        step.started_at = Some(Utc::now());
        info!("Executing step {} ({})", step.id, step.kind.as_str());

        let outcome = match step.kind {
            StepKind::SearchEmail => run_search(ctx, services, &mut outputs).await,
            StepKind::CreateDraft => run_draft(ctx, services, &mut outputs).await,
            StepKind::BookMeeting => run_booking(ctx, services, &mut outputs).await,
            StepKind::Think | StepKind::Clarify | StepKind::Done => Ok(StepReport::default()),
        };

        step.completed_at = Some(Utc::now());
        match outcome {
            Ok(report) => {
                step.status = StepStatus::Done;
                step.detail = report.detail;
                step.result = report.result;
            }
            Err(e) => {
                let message = e.to_string();
                step.status = StepStatus::Failed;
                step.error = Some(message.clone());
                ok = false;
                error = Some(message);
                break;
            }
        }
    }

    ExecutionOutcome {
        steps,
        outputs,
        ok,
        error,
    }
}

#[derive(Default)]
struct StepReport {
    detail: Option<String>,
    result: Option<serde_json::Value>,
}

async fn run_search(
    ctx: &ExecutionContext,
    services: &Collaborators,
    outputs: &mut StepOutputs,
) -> Result<StepReport> {
    let req = SearchRequest {
        query: SEARCH_QUERY.to_string(),
        max_results: SEARCH_MAX_RESULTS,
        include_body: true,
    };
    let response = services.search.search(&ctx.user_email, &req).await?;
    let count = response.count;

    outputs.search = Some(SearchOutput {
        response,
        query: req.query.clone(),
    });
    Ok(StepReport {
        detail: Some(format!("Scanned {} recent emails", count)),
        result: Some(json!({ "count": count, "query": req.query })),
    })
}

/// Split "Jane Doe <jane@x.com>" into name and address parts.
fn parse_address(from: &str) -> (String, String) {
    match from.split_once('<') {
        Some((name, rest)) => (
            name.trim().trim_matches('"').to_string(),
            rest.trim_end_matches('>').trim().to_string(),
        ),
        None => {
            let addr = from.trim();
            let name = addr.split('@').next().unwrap_or(addr);
            (name.to_string(), addr.to_string())
        }
    }
}

fn email_context_text(email: &EmailHit) -> String {
    let body = email
        .body_text
        .as_deref()
        .or(email.snippet.as_deref())
        .unwrap_or_default();
    format!(
        "From: {}\nSubject: {}\nDate: {}\n\n{}",
        email.from, email.subject, email.date, body
    )
}

async fn run_draft(
    ctx: &ExecutionContext,
    services: &Collaborators,
    outputs: &mut StepOutputs,
) -> Result<StepReport> {
    let source = outputs
        .search
        .as_ref()
        .and_then(|s| s.response.emails.first())
        .cloned();

    let context_text = match &source {
        Some(email) => email_context_text(email),
        None => ctx.goal.clone(),
    };

    let opts = DraftOptions {
        user_name: ctx.user_name.clone(),
        user_email: ctx.user_email.clone(),
        reply_instructions: ctx.goal.clone(),
        conversation_history: ctx.conversation_history.clone(),
        privacy_mode: ctx.privacy_mode,
    };
    let reply = services.drafts.generate_draft_reply(&context_text, &opts).await?;
    if reply.draft_content.trim().is_empty() {
        bail!("Synthesis failed");
    }

    let (parsed_name, parsed_email) = source
        .as_ref()
        .map(|e| parse_address(&e.from))
        .unwrap_or_default();

    let subject = match &source {
        Some(email) if email.subject.to_lowercase().starts_with("re:") => email.subject.clone(),
        Some(email) => format!("Re: {}", email.subject),
        None => ctx.goal.chars().take(60).collect(),
    };

    let draft = DraftData {
        content: reply.draft_content,
        thought: reply.thought,
        recipient_name: reply
            .recipient_name
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(parsed_name),
        recipient_email: reply
            .recipient_email
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(parsed_email),
        sender_name: reply
            .sender_name
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| ctx.user_name.clone()),
        original_email_id: source.as_ref().map(|e| e.id.clone()),
        thread_id: source.as_ref().and_then(|e| e.thread_id.clone()),
        message_id: source.as_ref().map(|e| e.id.clone()),
        subject: subject.clone(),
    };

    let report = StepReport {
        detail: Some(format!("Draft ready for {}", draft.recipient_name)),
        result: Some(json!({ "subject": subject, "recipient": draft.recipient_email.clone() })),
    };
    outputs.draft = Some(draft);
    Ok(report)
}

pub fn extract_duration_minutes(goal: &str) -> u32 {
    let re = Regex::new(r"\b(15|30|45|60|90)\s*min\b").unwrap();
    re.captures(&goal.to_lowercase())
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(DEFAULT_DURATION_MIN)
}

/// Crude time-phrase gate. It only decides whether the calendar path runs;
/// the matched text is not interpreted and the booking always lands on
/// tomorrow 14:00. Known stub, kept deliberately.
pub fn mentions_time_of_day(goal: &str) -> bool {
    let re = Regex::new(r"(?i)\b(?:at|on|for)\s+\d{1,2}(?::\d{2})?\s*(?:am|pm)?\b").unwrap();
    re.is_match(goal)
}

async fn run_booking(
    ctx: &ExecutionContext,
    services: &Collaborators,
    outputs: &mut StepOutputs,
) -> Result<StepReport> {
    let duration = extract_duration_minutes(&ctx.goal);

    if mentions_time_of_day(&ctx.goal) && services.calendar.is_connected() {
        let start = (Utc::now() + Duration::days(1))
            .date_naive()
            .and_hms_opt(14, 0, 0)
            .unwrap()
            .and_utc();
        let req = MeetingRequest {
            summary: ctx.goal.chars().take(80).collect(),
            start_time: start,
            end_time: start + Duration::minutes(duration as i64),
        };
        if let Some(meeting) = services.calendar.create_meeting(&req).await? {
            let url = meeting
                .meet_link
                .or(meeting.html_link)
                .unwrap_or_default();
            outputs.scheduling = Some(SchedulingData {
                booking_url: url.clone(),
                duration_minutes: duration,
                title: meeting.summary,
                kind: SchedulingKind::GoogleMeet,
            });
            return Ok(StepReport {
                detail: Some(format!("Meeting booked for {} minutes", duration)),
                result: Some(json!({ "type": "google_meet", "url": url })),
            });
        }
    }

    let link = services
        .booking
        .get_booking_link(duration, &ctx.goal)
        .await?
        .ok_or_else(|| anyhow!("Cal.com link failed"))?;

    let url = link.booking_url.clone();
    outputs.scheduling = Some(SchedulingData {
        booking_url: link.booking_url,
        duration_minutes: link.duration_minutes,
        title: link.title,
        kind: SchedulingKind::SchedulingLink,
    });
    Ok(StepReport {
        detail: Some(format!("Scheduling link ready ({} min)", duration)),
        result: Some(json!({ "type": "scheduling_link", "url": url })),
    })
}
