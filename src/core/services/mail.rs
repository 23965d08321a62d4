use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;

use super::{EmailSearch, SearchRequest, SearchResponse};

/// HTTP client for the mail-search service. The service resolves the Gmail
/// credential itself from the caller identity header; this client only
/// carries the query and the service-to-service token.
pub struct HttpEmailSearch {
    client: Client,
    base_url: String,
    service_token: Option<String>,
}

impl HttpEmailSearch {
    pub fn new(base_url: impl Into<String>, service_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            service_token,
        }
    }
}

#[async_trait]
impl EmailSearch for HttpEmailSearch {
    async fn search(&self, user_email: &str, req: &SearchRequest) -> Result<SearchResponse> {
        let mut request = self
            .client
            .post(&self.base_url)
            .header("x-user-email", user_email)
            .json(req);
        if let Some(token) = &self.service_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let res = request.send().await?;
        if !res.status().is_success() {
            return Err(anyhow!("Search failed ({})", res.status().as_u16()));
        }
        Ok(res.json().await?)
    }
}
