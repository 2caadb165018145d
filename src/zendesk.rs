use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::env;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub const ENV_SUBDOMAIN: &str = "ZENDESK_API_SUBDOMAIN";
pub const ENV_EMAIL: &str = "ZENDESK_API_EMAIL";
pub const ENV_TOKEN: &str = "ZENDESK_API_TOKEN";
/// Older deployments export the token under this misspelt name.
pub const ENV_TOKEN_LEGACY: &str = "ZENDESK_API_TOEKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} not set")]
    MissingEnv(&'static str),
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("invalid Zendesk API root {raw:?}: {source}")]
    InvalidRoot {
        raw: String,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: StatusCode },
    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl UpstreamError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Where the Zendesk account lives and how to authenticate against it.
#[derive(Clone)]
pub struct ZendeskConfig {
    api_root: Url,
    email: String,
    token: String,
}

impl fmt::Debug for ZendeskConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZendeskConfig")
            .field("api_root", &self.api_root.as_str())
            .field("email", &self.email)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl ZendeskConfig {
    /// Configuration for `https://{subdomain}.zendesk.com/api/v2`.
    pub fn new(
        subdomain: &str,
        email: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let subdomain = subdomain.trim();
        if subdomain.is_empty() {
            return Err(ConfigError::Empty("subdomain"));
        }
        let raw = format!("https://{subdomain}.zendesk.com/api/v2");
        Self::with_api_root(&raw, email, token)
    }

    /// Configuration against an arbitrary API root, e.g. a sandbox or a local mock.
    pub fn with_api_root(
        api_root: &str,
        email: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let email = email.into();
        let token = token.into();
        if email.trim().is_empty() {
            return Err(ConfigError::Empty("email"));
        }
        if token.trim().is_empty() {
            return Err(ConfigError::Empty("token"));
        }
        let trimmed = api_root.trim().trim_end_matches('/');
        let api_root = Url::parse(trimmed).map_err(|source| ConfigError::InvalidRoot {
            raw: api_root.to_string(),
            source,
        })?;
        Ok(Self {
            api_root,
            email,
            token,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from a key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| non_blank(lookup(key));
        let subdomain = read(ENV_SUBDOMAIN).ok_or(ConfigError::MissingEnv(ENV_SUBDOMAIN))?;
        let email = read(ENV_EMAIL).ok_or(ConfigError::MissingEnv(ENV_EMAIL))?;
        let token = token_from(&lookup).ok_or(ConfigError::MissingEnv(ENV_TOKEN))?;
        Self::new(&subdomain, email, token)
    }

    /// API root without a trailing slash.
    pub fn api_root(&self) -> &str {
        self.api_root.as_str().trim_end_matches('/')
    }

    /// Whether `url` points inside this account's API root.
    pub fn owns(&self, url: &Url) -> bool {
        let root = self.api_root.path().trim_end_matches('/');
        let path = url.path();
        url.scheme() == self.api_root.scheme()
            && url.host_str() == self.api_root.host_str()
            && url.port_or_known_default() == self.api_root.port_or_known_default()
            && (root.is_empty()
                || path == root
                || path.strip_prefix(root).is_some_and(|rest| rest.starts_with('/')))
    }

    pub fn username(&self) -> String {
        format!("{}/token", self.email)
    }

    pub fn tickets_url(&self, page_size: usize) -> String {
        format!("{}/tickets.json?page[size]={page_size}", self.api_root())
    }

    pub fn user_url(&self, user_id: u64) -> String {
        format!("{}/users/{user_id}.json", self.api_root())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn token_from(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    non_blank(lookup(ENV_TOKEN)).or_else(|| non_blank(lookup(ENV_TOKEN_LEGACY)))
}

/// API token from the environment, falling back to the legacy variable name.
pub fn token_from_env() -> Option<String> {
    token_from(|key| env::var(key).ok())
}

/// Authenticated JSON client for the Zendesk API. Cheap to clone.
#[derive(Clone, Debug)]
pub struct ZendeskClient {
    http: Client,
    config: ZendeskConfig,
}

impl ZendeskClient {
    pub fn new(config: ZendeskConfig) -> Self {
        Self::with_http(Client::new(), config)
    }

    pub fn with_http(http: Client, config: ZendeskConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &ZendeskConfig {
        &self.config
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, UpstreamError> {
        debug!(%url, "GET zendesk");
        let response = self
            .http
            .get(url)
            .basic_auth(self.config.username(), Some(&self.config.token))
            .send()
            .await
            .map_err(|source| UpstreamError::Http {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        if status != StatusCode::OK {
            warn!(%url, %status, "zendesk request rejected");
            return Err(UpstreamError::Status {
                url: url.to_string(),
                status,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|source| UpstreamError::Decode {
                url: url.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdomain_builds_api_root() {
        let config = ZendeskConfig::new("acme", "agent@acme.test", "secret").unwrap();
        assert_eq!(config.api_root(), "https://acme.zendesk.com/api/v2");
        assert_eq!(
            config.tickets_url(25),
            "https://acme.zendesk.com/api/v2/tickets.json?page[size]=25"
        );
        assert_eq!(
            config.user_url(7),
            "https://acme.zendesk.com/api/v2/users/7.json"
        );
        assert_eq!(config.username(), "agent@acme.test/token");
    }

    #[test]
    fn empty_credentials_are_rejected() {
        assert!(matches!(
            ZendeskConfig::new(" ", "a@b", "t"),
            Err(ConfigError::Empty("subdomain"))
        ));
        assert!(matches!(
            ZendeskConfig::new("acme", "", "t"),
            Err(ConfigError::Empty("email"))
        ));
        assert!(matches!(
            ZendeskConfig::with_api_root("not a url", "a@b", "t"),
            Err(ConfigError::InvalidRoot { .. })
        ));
    }

    #[test]
    fn owns_only_urls_under_the_api_root() {
        let config = ZendeskConfig::new("acme", "a@b", "t").unwrap();
        let inside = Url::parse("https://acme.zendesk.com/api/v2/tickets/1.json").unwrap();
        let other_host = Url::parse("https://evil.test/api/v2/tickets/1.json").unwrap();
        let other_scheme = Url::parse("http://acme.zendesk.com/api/v2/tickets/1.json").unwrap();
        let other_path = Url::parse("https://acme.zendesk.com/admin").unwrap();
        let sibling = Url::parse("https://acme.zendesk.com/api/v2evil/tickets/1.json").unwrap();
        let root = Url::parse("https://acme.zendesk.com/api/v2").unwrap();
        assert!(config.owns(&inside));
        assert!(config.owns(&root));
        assert!(!config.owns(&other_host));
        assert!(!config.owns(&other_scheme));
        assert!(!config.owns(&other_path));
        assert!(!config.owns(&sibling));
    }

    #[test]
    fn owns_respects_segment_boundary_of_nested_root() {
        let config =
            ZendeskConfig::with_api_root("https://proxy.test/zendesk/", "a@b", "t").unwrap();
        let inside = Url::parse("https://proxy.test/zendesk/tickets/1.json").unwrap();
        let sibling = Url::parse("https://proxy.test/zendesk-admin/tickets/1.json").unwrap();
        assert!(config.owns(&inside));
        assert!(!config.owns(&sibling));
    }

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| {
            pairs
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.clone())
        }
    }

    #[test]
    fn lookup_falls_back_to_legacy_token_name() {
        let config = ZendeskConfig::from_lookup(lookup_from(&[
            (ENV_SUBDOMAIN, "acme"),
            (ENV_EMAIL, "agent@acme.test"),
            (ENV_TOKEN, "  "),
            (ENV_TOKEN_LEGACY, "legacy-secret"),
        ]))
        .unwrap();
        assert_eq!(config.token, "legacy-secret");
        assert_eq!(config.api_root(), "https://acme.zendesk.com/api/v2");
    }

    #[test]
    fn lookup_prefers_current_token_name() {
        let config = ZendeskConfig::from_lookup(lookup_from(&[
            (ENV_SUBDOMAIN, "acme"),
            (ENV_EMAIL, "agent@acme.test"),
            (ENV_TOKEN, "current"),
            (ENV_TOKEN_LEGACY, "legacy-secret"),
        ]))
        .unwrap();
        assert_eq!(config.token, "current");
    }

    #[test]
    fn lookup_reports_missing_values() {
        assert!(matches!(
            ZendeskConfig::from_lookup(lookup_from(&[(ENV_SUBDOMAIN, "acme"), (ENV_EMAIL, "")])),
            Err(ConfigError::MissingEnv(ENV_EMAIL))
        ));
        assert!(matches!(
            ZendeskConfig::from_lookup(lookup_from(&[
                (ENV_SUBDOMAIN, "acme"),
                (ENV_EMAIL, "agent@acme.test"),
            ])),
            Err(ConfigError::MissingEnv(ENV_TOKEN))
        ));
    }

    #[test]
    fn debug_output_redacts_token() {
        let config = ZendeskConfig::new("acme", "a@b", "hunter2").unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
    }
}
