pub(crate) mod auth;
mod handlers;
mod router;

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use tokio::sync::RwLock;
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};
use tracing::info;

use crate::core::conversation::ConversationStore;
use crate::core::llm::LlmManager;
use crate::core::services::Collaborators;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: Arc<ConversationStore>,
    pub(crate) llm: Arc<RwLock<LlmManager>>,
    pub(crate) services: Collaborators,
    pub(crate) log_tx: tokio::sync::broadcast::Sender<String>,
    pub(crate) api_host: String,
    pub(crate) api_port: u16,
    pub(crate) api_token: Option<String>,
}

pub struct ApiServerConfig {
    pub store: Arc<ConversationStore>,
    pub llm: Arc<RwLock<LlmManager>>,
    pub services: Collaborators,
    pub log_tx: tokio::sync::broadcast::Sender<String>,
    pub api_host: String,
    pub api_port: u16,
    pub api_token: Option<String>,
}

pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig) -> Self {
        Self {
            state: AppState {
                store: config.store,
                llm: config.llm,
                services: config.services,
                log_tx: config.log_tx,
                api_host: config.api_host,
                api_port: config.api_port,
                api_token: config.api_token,
            },
        }
    }

    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.state.api_host, self.state.api_port);
        let app = router::build_api_router(self.state);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("Arcus API running at http://{addr}");
        axum::serve(listener, app).await?;
        Ok(())
    }
}

// --- SSE log tail (used by router) ---

async fn sse_logs_endpoint(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let lines = BroadcastStream::new(state.log_tx.subscribe());
    let stream = lines.map(|line| {
        let event = match line {
            Ok(line) => Event::default().data(line),
            // A lagged receiver drops lines rather than blocking the writer.
            Err(_) => Event::default().data("log tail lagged, some lines dropped"),
        };
        Ok(event)
    });
    Sse::new(stream)
}
