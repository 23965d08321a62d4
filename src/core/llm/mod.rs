pub mod arcus;
mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    // Execute a prompt against a selected model using a structured conversation history
    async fn generate(&self, model_id: &str, messages: &[ChatMessage]) -> Result<String>;
}

pub struct LlmManager {
    provider: Option<Box<dyn LlmProvider>>,
    model: Option<String>,
}

impl LlmManager {
    pub fn new() -> Self {
        Self {
            provider: None,
            model: None,
        }
    }

    pub fn set_active(&mut self, provider: Box<dyn LlmProvider>, model_id: String) {
        info!("Setting active LLM: {} ({})", provider.name(), model_id);
        self.provider = Some(provider);
        self.model = Some(model_id);
    }

    pub async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let provider = self.provider.as_ref().ok_or_else(|| {
            anyhow::anyhow!("No LLM provider configured. Set [llm] in mailient.toml.")
        })?;
        let model_id = self
            .model
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No LLM model configured."))?;
        provider.generate(model_id, messages).await
    }
}

impl Default for LlmManager {
    fn default() -> Self {
        Self::new()
    }
}
