use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};

use super::super::AppState;

/// Stored thread for one conversation, oldest first. Feeds the UI history
/// pane on reload.
pub async fn get_thread(
    Path(conversation_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<serde_json::Value> {
    let user_email = headers
        .get("x-user-email")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("guest@mailient.local");

    match state.store.thread(user_email, &conversation_id).await {
        Ok(turns) => {
            let messages: Vec<serde_json::Value> = turns
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "userMessage": t.user_message,
                        "agentResponse": t.agent_response,
                    })
                })
                .collect();
            Json(serde_json::json!({
                "success": true,
                "conversationId": conversation_id,
                "messages": messages,
            }))
        }
        Err(e) => Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    }
}
