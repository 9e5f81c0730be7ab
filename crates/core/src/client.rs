use crate::config::GitHubClientConfig;
use crate::traits::RemoteSearchClient;
use crate::{SearchPage, SearchRequest, TransportError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use std::time::Duration;
use tracing::{error, info};
use url::Url;

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Client for `GET /search/repositories`.
pub struct GitHubSearchClient {
    client: Client,
    base_url: Url,
    timeout_seconds: u64,
}

impl GitHubSearchClient {
    pub fn new(config: &GitHubClientConfig) -> Result<Self, TransportError> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            HeaderName::from_static("x-github-api-version"),
            HeaderValue::from_str(config.api_version.trim())
                .map_err(|error| TransportError::Config(format!("api_version: {error}")))?,
        );
        if let Some(token) = config.token.as_deref().filter(|token| !token.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|error| TransportError::Config(format!("token: {error}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        // A trailing slash keeps any base path (e.g. GitHub Enterprise `/api/v3`) on join.
        let base_url = Url::parse(&format!("{}/", config.base_url.trim_end_matches('/')))?;

        Ok(Self {
            client,
            base_url,
            timeout_seconds: config.timeout_seconds,
        })
    }

    pub fn search_url(&self, request: &SearchRequest) -> Result<Url, TransportError> {
        let mut url = self.base_url.join("search/repositories")?;
        url.query_pairs_mut()
            .append_pair("q", &request.remote_query())
            .append_pair("sort", request.sort.as_str())
            .append_pair("order", request.order.as_str())
            .append_pair("per_page", &request.per_page.to_string())
            .append_pair("page", &request.page.to_string());
        Ok(url)
    }

    fn classify(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(self.timeout_seconds)
        } else {
            TransportError::Http(error)
        }
    }
}

#[async_trait]
impl RemoteSearchClient for GitHubSearchClient {
    async fn fetch_page(&self, request: &SearchRequest) -> Result<SearchPage, TransportError> {
        let url = self.search_url(request)?;
        info!(
            query = %request.remote_query(),
            page = request.page,
            per_page = request.per_page,
            "searching remote repositories"
        );

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| self.classify(error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            error!(status = status.as_u16(), body = %body, "remote search api error");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|error| self.classify(error))?;
        let page: SearchPage = serde_json::from_slice(&bytes)
            .map_err(|error| TransportError::Decode(error.to_string()))?;

        info!(
            count = page.items.len(),
            total_count = page.total_count,
            "retrieved remote repositories"
        );
        Ok(page)
    }
}
