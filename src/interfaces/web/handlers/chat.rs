use axum::{Json, extract::State, http::HeaderMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::super::AppState;
use crate::core::conversation::to_history;
use crate::core::executor::{DraftData, ExecutionContext, SchedulingData, execute_plan};
use crate::core::intent::{self, Intent};
use crate::core::llm::ChatMessage;
use crate::core::llm::arcus::{fallback_reply, generate_chat_reply};
use crate::core::plan::{Step, build_chat_trace, build_plan};
use crate::core::synthesis::{ExecutionResult, synthesize};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    /// The email the user has open in the client, if any. Forwarded verbatim
    /// into the AI context so "reply to this" style messages resolve.
    #[serde(default)]
    pub email_context: Option<String>,
    #[serde(default)]
    pub privacy_mode: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub conversation_id: String,
    pub ai_generated: bool,
    pub action_type: String,
    pub agent_steps: Vec<Step>,
    pub draft_data: Option<DraftData>,
    pub scheduling_data: Option<SchedulingData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_result: Option<ExecutionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

struct Caller {
    email: String,
    name: String,
}

/// Caller identity comes from gateway-installed headers, with body fields as
/// a fallback for direct API use.
fn resolve_caller(headers: &HeaderMap, payload: &ChatRequest) -> Caller {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    };
    Caller {
        email: header("x-user-email")
            .or_else(|| payload.user_email.clone())
            .unwrap_or_else(|| "guest@mailient.local".to_string()),
        name: header("x-user-name")
            .or_else(|| payload.user_name.clone())
            .unwrap_or_else(|| "there".to_string()),
    }
}

/// The chat-arcus endpoint. Approved plans go through the step-execution
/// pipeline; everything else takes the single-call AI path. Whatever goes
/// wrong, the caller gets a conversational JSON body, never a bare 500.
pub async fn chat_arcus_endpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let conversation_id = payload
        .conversation_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let caller = resolve_caller(&headers, &payload);

    match handle_chat(&state, &caller, &payload, &conversation_id).await {
        Ok(response) => Json(response),
        Err(e) => {
            error!("chat-arcus handler failed: {:#}", e);
            Json(ChatResponse {
                message: "Sorry, something went wrong on my end while handling that. \
                          Please try again in a moment."
                    .to_string(),
                timestamp: Utc::now(),
                conversation_id,
                ai_generated: false,
                action_type: "general".to_string(),
                agent_steps: Vec::new(),
                draft_data: None,
                scheduling_data: None,
                execution_result: None,
                error: Some("internal_error".to_string()),
                error_detail: Some(e.to_string()),
            })
        }
    }
}

async fn handle_chat(
    state: &AppState,
    caller: &Caller,
    payload: &ChatRequest,
    conversation_id: &str,
) -> anyhow::Result<ChatResponse> {
    let intent = intent::classify(&payload.message);
    let turns = state.store.thread(&caller.email, conversation_id).await?;
    let history = to_history(&turns);

    let response = if intent.plan_approved {
        run_approved_plan(state, caller, payload, conversation_id, &intent, history).await
    } else {
        run_chat_turn(state, caller, payload, conversation_id, &intent, history).await
    };

    // Best-effort persistence: a failed save never fails the chat turn.
    if let Err(e) = state
        .store
        .record_turn(
            &caller.email,
            &payload.message,
            &response.message,
            conversation_id,
        )
        .await
    {
        warn!("Failed to persist chat turn: {}", e);
    }

    Ok(response)
}

async fn run_approved_plan(
    state: &AppState,
    caller: &Caller,
    payload: &ChatRequest,
    conversation_id: &str,
    intent: &Intent,
    history: Vec<ChatMessage>,
) -> ChatResponse {
    let goal = intent
        .plan_goal
        .clone()
        .unwrap_or_else(|| "the approved plan".to_string());
    info!("Executing approved plan for {}: {}", caller.email, goal);

    let ctx = ExecutionContext {
        user_name: caller.name.clone(),
        user_email: caller.email.clone(),
        goal: goal.clone(),
        conversation_history: history,
        privacy_mode: payload.privacy_mode,
    };

    let steps = build_plan(&goal);
    let outcome = execute_plan(steps, &ctx, &state.services).await;
    let synthesis = synthesize(
        &outcome.outputs,
        outcome.ok,
        outcome.error.as_deref(),
        &goal,
    );
    let (message, execution_result) = synthesis.into_result(outcome.ok);

    ChatResponse {
        message,
        timestamp: Utc::now(),
        conversation_id: conversation_id.to_string(),
        ai_generated: true,
        action_type: "execution_result".to_string(),
        agent_steps: outcome.steps,
        draft_data: outcome.outputs.draft,
        scheduling_data: outcome.outputs.scheduling,
        execution_result: Some(execution_result),
        error: None,
        error_detail: None,
    }
}

async fn run_chat_turn(
    state: &AppState,
    caller: &Caller,
    payload: &ChatRequest,
    conversation_id: &str,
    intent: &Intent,
    history: Vec<ChatMessage>,
) -> ChatResponse {
    let mut context_note = format!(
        "Context: you are talking to {} <{}>. Calendar integration connected: {}.",
        caller.name,
        caller.email,
        state.services.calendar.is_connected()
    );
    if let Some(email) = payload
        .email_context
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        context_note.push_str("\nThe user currently has this email open:\n");
        context_note.push_str(email);
    }

    let (message, ai_ok) =
        match generate_chat_reply(&state.llm, &payload.message, &history, &context_note).await {
            Ok(text) => (text, true),
            Err(e) => {
                warn!("AI reply failed, using fallback: {}", e);
                (fallback_reply(&payload.message), false)
            }
        };

    let action_type = if intent.wants_draft {
        "draft_reply"
    } else if intent.wants_scheduling {
        "schedule_meeting"
    } else {
        "general"
    };

    ChatResponse {
        message,
        timestamp: Utc::now(),
        conversation_id: conversation_id.to_string(),
        ai_generated: ai_ok,
        action_type: action_type.to_string(),
        agent_steps: build_chat_trace(&payload.message, intent, ai_ok),
        draft_data: None,
        scheduling_data: None,
        execution_result: None,
        error: None,
        error_detail: None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::HeaderValue;
    use tokio::sync::RwLock;

    use super::*;
    use crate::core::conversation::ConversationStore;
    use crate::core::llm::{LlmManager, LlmProvider};
    use crate::core::plan::{StepKind, StepStatus};
    use crate::core::services::fakes::{
        FakeBooking, FakeCalendar, FakeDrafts, FakeSearch, collaborators, hit_from,
    };
    use crate::core::services::DraftReply;

    fn test_state(
        search: FakeSearch,
        drafts: FakeDrafts,
    ) -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ConversationStore::open(dir.path()).unwrap());
        let (log_tx, _) = tokio::sync::broadcast::channel(8);
        (
            AppState {
                store,
                llm: Arc::new(RwLock::new(LlmManager::new())),
                services: collaborators(
                    search,
                    drafts,
                    FakeCalendar::default(),
                    FakeBooking {
                        username: Some("ada".to_string()),
                        ..Default::default()
                    },
                ),
                log_tx,
                api_host: "127.0.0.1".to_string(),
                api_port: 8740,
                api_token: None,
            },
            dir,
        )
    }

    fn request(message: &str) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            conversation_id: Some("conv_test".to_string()),
            user_email: None,
            user_name: None,
            email_context: None,
            privacy_mode: false,
        }
    }

    fn jane_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-email", HeaderValue::from_static("ada@mailient.dev"));
        headers.insert("x-user-name", HeaderValue::from_static("Ada"));
        headers
    }

    async fn send(state: &AppState, message: &str) -> ChatResponse {
        let payload = request(message);
        let caller = resolve_caller(&jane_headers(), &payload);
        handle_chat(state, &caller, &payload, "conv_test")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn approved_draft_plan_produces_execution_result() {
        let (state, _dir) = test_state(
            FakeSearch {
                hits: vec![hit_from("Jane <jane@x.com>", "The proposal")],
                ..Default::default()
            },
            FakeDrafts {
                reply: Some(DraftReply {
                    draft_content: "Hi Jane, happy to walk through the proposal.".to_string(),
                    thought: "Keep it brief.".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );

        let response = send(
            &state,
            "[PLAN_APPROVED:xyz] Execute the approved plan: draft a reply to Jane about the proposal",
        )
        .await;

        assert_eq!(response.action_type, "execution_result");
        assert!(response.ai_generated);
        assert_eq!(response.agent_steps.len(), 4);
        assert!(
            response
                .agent_steps
                .iter()
                .all(|s| s.status == StepStatus::Done)
        );

        let draft = response.draft_data.as_ref().unwrap();
        assert!(draft.recipient_name.contains("Jane"));
        assert_eq!(draft.subject, "Re: The proposal");

        let result = response.execution_result.as_ref().unwrap();
        assert!(result.success);
        assert!(!result.changes.is_empty());
        assert_eq!(result.artifacts[0].kind, "draft");

        // The turn was persisted with the first order index.
        assert_eq!(
            state
                .store
                .message_count("ada@mailient.dev", "conv_test")
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn failed_search_surfaces_reason_and_never_starts_draft_step() {
        let (state, _dir) = test_state(
            FakeSearch {
                fail_with: Some("Search failed (500)".to_string()),
                ..Default::default()
            },
            FakeDrafts::default(),
        );

        let response = send(
            &state,
            "[PLAN_APPROVED:abc] Execute the approved plan: draft a reply to Jane",
        )
        .await;

        assert_eq!(response.action_type, "execution_result");
        assert!(response.message.contains("Search failed (500)"));
        let result = response.execution_result.as_ref().unwrap();
        assert!(!result.success);

        let draft_step = response
            .agent_steps
            .iter()
            .find(|s| s.kind == StepKind::CreateDraft)
            .unwrap();
        assert_eq!(draft_step.status, StepStatus::Pending);
        assert!(draft_step.started_at.is_none());
    }

    #[tokio::test]
    async fn non_plan_message_without_llm_uses_fallback_and_failed_trace() {
        let (state, _dir) = test_state(FakeSearch::default(), FakeDrafts::default());

        let response = send(&state, "hello there").await;
        assert_eq!(response.action_type, "general");
        assert!(!response.ai_generated);
        assert!(response.execution_result.is_none());
        assert!(response.draft_data.is_none());
        assert_eq!(response.message, fallback_reply("hello there"));

        // Trace: think, clarify, create_draft; final step failed with no AI.
        assert_eq!(response.agent_steps.len(), 3);
        let last = response.agent_steps.last().unwrap();
        assert_eq!(last.kind, StepKind::CreateDraft);
        assert_eq!(last.status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn non_plan_draft_request_maps_to_draft_reply_action() {
        let (state, _dir) = test_state(FakeSearch::default(), FakeDrafts::default());
        let response = send(&state, "draft a reply to Sam").await;
        assert_eq!(response.action_type, "draft_reply");
        // Actionable message gets the search trace step.
        assert_eq!(response.agent_steps.len(), 4);
    }

    #[tokio::test]
    async fn non_plan_scheduling_request_maps_to_schedule_meeting_action() {
        let (state, _dir) = test_state(FakeSearch::default(), FakeDrafts::default());
        let response = send(&state, "set up a meeting with Jane").await;
        assert_eq!(response.action_type, "schedule_meeting");
    }

    struct RecordingProvider {
        reply: String,
        messages: Arc<std::sync::Mutex<Vec<ChatMessage>>>,
    }

    #[async_trait::async_trait]
    impl LlmProvider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        async fn generate(
            &self,
            _model_id: &str,
            messages: &[ChatMessage],
        ) -> anyhow::Result<String> {
            *self.messages.lock().unwrap() = messages.to_vec();
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn open_email_context_reaches_the_ai_prompt() {
        let (state, _dir) = test_state(FakeSearch::default(), FakeDrafts::default());
        let captured = Arc::new(std::sync::Mutex::new(Vec::new()));
        state.llm.write().await.set_active(
            Box::new(RecordingProvider {
                reply: "You could confirm the new time works.".to_string(),
                messages: captured.clone(),
            }),
            "test-model".to_string(),
        );

        let mut payload = request("what should I say back?");
        payload.email_context = Some(
            "From: Jane <jane@x.com>\nSubject: The proposal\nCan we move the call to Thursday?"
                .to_string(),
        );
        let caller = resolve_caller(&jane_headers(), &payload);
        let response = handle_chat(&state, &caller, &payload, "conv_test")
            .await
            .unwrap();

        assert!(response.ai_generated);
        assert_eq!(response.message, "You could confirm the new time works.");

        let messages = captured.lock().unwrap();
        let system = &messages[0];
        assert_eq!(system.role, "system");
        assert!(system.content.contains("has this email open"));
        assert!(system.content.contains("Can we move the call to Thursday?"));
    }

    #[tokio::test]
    async fn consecutive_turns_get_increasing_message_order() {
        let (state, _dir) = test_state(FakeSearch::default(), FakeDrafts::default());
        send(&state, "hello").await;
        send(&state, "still there?").await;
        assert_eq!(
            state
                .store
                .message_count("ada@mailient.dev", "conv_test")
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn scheduling_plan_falls_back_to_booking_link() {
        let (state, _dir) = test_state(FakeSearch::default(), FakeDrafts::default());
        let response = send(
            &state,
            "[PLAN_APPROVED:k1] Execute the approved plan: book a 45 min call with the design team",
        )
        .await;

        let scheduling = response.scheduling_data.as_ref().unwrap();
        assert_eq!(scheduling.duration_minutes, 45);
        assert_eq!(scheduling.booking_url, "https://cal.com/ada/45min");
        assert!(response.execution_result.as_ref().unwrap().success);
    }

    #[test]
    fn response_serializes_in_camel_case_with_null_payloads() {
        let response = ChatResponse {
            message: "ok".to_string(),
            timestamp: Utc::now(),
            conversation_id: "c1".to_string(),
            ai_generated: true,
            action_type: "general".to_string(),
            agent_steps: Vec::new(),
            draft_data: None,
            scheduling_data: None,
            execution_result: None,
            error: None,
            error_detail: None,
        };
        let v = serde_json::to_value(&response).unwrap();
        assert_eq!(v["conversationId"], "c1");
        assert_eq!(v["aiGenerated"], true);
        assert!(v["draftData"].is_null());
        assert!(v["schedulingData"].is_null());
        assert!(v.get("executionResult").is_none());
    }
}
