use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use super::{ChatMessage, LlmManager};
use crate::core::intent;
use crate::core::services::{DraftGenerator, DraftOptions, DraftReply};

/// Arcus is the agent persona: these prompt builders are the only place the
/// persona text lives.
const ARCUS_IDENTITY: &str = "You are Arcus, an email assistant embedded in the Mailient client. \
     You write on behalf of the user, in their voice, and you never invent \
     facts about emails you have not been shown.";

fn draft_system_prompt(opts: &DraftOptions) -> String {
    let mut prompt = String::new();
    prompt.push_str(ARCUS_IDENTITY);
    prompt.push_str(
        "\n\nWrite a reply draft for the email context the user provides.\n\
         Respond with ONE JSON object and nothing else, using exactly these keys:\n\
         {\"draftContent\": \"...\", \"thought\": \"...\", \"recipientName\": \"...\", \
         \"recipientEmail\": \"...\", \"senderName\": \"...\"}\n\
         draftContent is the full reply body. thought is one sentence on why \
         you wrote it that way. recipientName/recipientEmail describe who the \
         reply goes to, taken from the source email's From line.\n",
    );
    prompt.push_str(&format!(
        "\nThe user signing the reply is {} <{}>.\n",
        opts.user_name, opts.user_email
    ));
    if opts.privacy_mode {
        prompt.push_str(
            "Privacy mode is on: do not quote the original email verbatim, paraphrase instead.\n",
        );
    }
    prompt
}

/// Pull the first top-level JSON object out of a model response that may
/// wrap it in prose or code fences.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start { Some(&text[start..=end]) } else { None }
}

/// LLM-backed draft generator used on the live path.
pub struct ArcusWriter {
    llm: Arc<RwLock<LlmManager>>,
}

impl ArcusWriter {
    pub fn new(llm: Arc<RwLock<LlmManager>>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl DraftGenerator for ArcusWriter {
    async fn generate_draft_reply(
        &self,
        email_context: &str,
        opts: &DraftOptions,
    ) -> Result<DraftReply> {
        let mut messages = vec![ChatMessage::system(draft_system_prompt(opts))];
        let history_window = opts.conversation_history.len().saturating_sub(10);
        for entry in opts.conversation_history.iter().skip(history_window) {
            messages.push(entry.clone());
        }
        messages.push(ChatMessage::user(format!(
            "EMAIL CONTEXT:\n{}\n\nINSTRUCTIONS:\n{}",
            email_context, opts.reply_instructions
        )));

        let raw = {
            let llm = self.llm.read().await;
            llm.generate(&messages).await?
        };

        match extract_json_object(&raw).and_then(|s| serde_json::from_str::<DraftReply>(s).ok()) {
            Some(reply) => Ok(reply),
            None => {
                // Model ignored the JSON contract; salvage the text as the body.
                warn!("Draft generator returned non-JSON output, using raw text");
                Ok(DraftReply {
                    draft_content: raw.trim().to_string(),
                    ..Default::default()
                })
            }
        }
    }
}

/// One-shot reply for the ordinary (non-approved-plan) chat path.
pub async fn generate_chat_reply(
    llm: &RwLock<LlmManager>,
    message: &str,
    history: &[ChatMessage],
    context_note: &str,
) -> Result<String> {
    let mut messages = vec![ChatMessage::system(format!(
        "{}\n\nAnswer the user's message conversationally. When they ask for an \
         action you cannot take directly, propose a short plan they can approve.\n{}",
        ARCUS_IDENTITY, context_note
    ))];
    let history_window = history.len().saturating_sub(20);
    for entry in history.iter().skip(history_window) {
        messages.push(entry.clone());
    }
    messages.push(ChatMessage::user(message));

    let llm = llm.read().await;
    llm.generate(&messages).await
}

/// Deterministic response used when the AI call fails. Keyword routing only,
/// so the chat turn still reads sensibly without a model behind it.
pub fn fallback_reply(message: &str) -> String {
    if intent::wants_draft(message) {
        "I couldn't reach the writing model just now. Ask me again and I'll draft \
         that reply, or open the email and I'll pick it up from there."
            .to_string()
    } else if intent::wants_scheduling(message) {
        "I couldn't reach the scheduling service just now. Try again in a moment \
         and I'll set that meeting up."
            .to_string()
    } else if intent::wants_search(message) {
        "I couldn't run that search just now. Try again in a moment and I'll go \
         through your inbox."
            .to_string()
    } else {
        "I hit a snag generating a response. Could you try that again?".to_string()
    }
}
