mod config;
mod core;
mod interfaces;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::core::conversation::ConversationStore;
use crate::core::llm::arcus::ArcusWriter;
use crate::core::llm::{LlmManager, OpenAiCompatProvider};
use crate::core::services::calcom::CalComLinks;
use crate::core::services::calendar::GoogleCalendar;
use crate::core::services::mail::HttpEmailSearch;
use crate::core::services::Collaborators;
use crate::interfaces::web::{ApiServer, ApiServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = ServiceConfig::load(config_path.as_deref())?;

    let (log_tx, _) = tokio::sync::broadcast::channel::<String>(256);
    logging::init(log_tx.clone());
    info!("Mailient {} starting", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(ConversationStore::open(config.workspace_dir())?);

    let mut llm = LlmManager::new();
    match config.llm_api_key() {
        Some(key) => llm.set_active(
            Box::new(OpenAiCompatProvider::new(
                "openai",
                config.llm.base_url.clone(),
                key,
            )),
            config.llm.model.clone(),
        ),
        None => warn!(
            "No LLM key in ${}; chat falls back to canned replies",
            config.llm.api_key_env
        ),
    }
    let llm = Arc::new(RwLock::new(llm));

    let services = Collaborators {
        search: Arc::new(HttpEmailSearch::new(
            config.mail.search_url.clone(),
            config.mail_service_token(),
        )),
        drafts: Arc::new(ArcusWriter::new(llm.clone())),
        calendar: Arc::new(GoogleCalendar::new(config.calendar_access_token())),
        booking: Arc::new(CalComLinks::new(config.booking.calcom_username.clone())),
    };

    ApiServer::new(ApiServerConfig {
        store,
        llm,
        services,
        log_tx,
        api_host: config.api.host.clone(),
        api_port: config.api.port,
        api_token: config.api.token.clone(),
    })
    .run()
    .await
}
