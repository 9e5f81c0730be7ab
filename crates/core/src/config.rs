use crate::error::TransportError;
use std::fmt;
use url::Url;

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_GITHUB_API_VERSION: &str = "2022-11-28";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

#[derive(Clone)]
pub struct GitHubClientConfig {
    pub base_url: String,
    /// Sent as `X-GitHub-Api-Version`.
    pub api_version: String,
    pub timeout_seconds: u64,
    /// GitHub rejects requests without a User-Agent.
    pub user_agent: String,
    pub token: Option<String>,
}

impl Default for GitHubClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GITHUB_API_URL.to_string(),
            api_version: DEFAULT_GITHUB_API_VERSION.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            user_agent: concat!("repo-search/", env!("CARGO_PKG_VERSION")).to_string(),
            token: None,
        }
    }
}

impl fmt::Debug for GitHubClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClientConfig")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("user_agent", &self.user_agent)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl GitHubClientConfig {
    pub fn validate(&self) -> Result<(), TransportError> {
        let url = Url::parse(&self.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransportError::Config(format!(
                "base_url must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.timeout_seconds == 0 {
            return Err(TransportError::Config(
                "timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.api_version.trim().is_empty() {
            return Err(TransportError::Config(
                "api_version must not be blank".to_string(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(TransportError::Config(
                "user_agent must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}
