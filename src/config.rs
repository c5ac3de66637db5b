//! Provider configuration.
//!
//! Built from the provider block sent by the host at configure time. Values
//! missing from the block fall back to environment variables:
//!
//! | Setting        | Environment variables                         | Default                 |
//! |----------------|-----------------------------------------------|-------------------------|
//! | `url`          | `JFROG_URL`, `PROJECTS_URL`                   | `http://localhost:8081` |
//! | `access_token` | `JFROG_ACCESS_TOKEN`, `PROJECTS_ACCESS_TOKEN` | none, required          |

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::ProviderError;

/// URL used when neither the provider block nor the environment sets one.
pub const DEFAULT_URL: &str = "http://localhost:8081";

/// Number of retries after the first attempt.
pub const DEFAULT_RETRY_COUNT: u32 = 5;

/// Host version reported in the user agent when the host doesn't send one.
pub const DEFAULT_HOST_VERSION: &str = "0.13+compatible";

const URL_VARS: [&str; 2] = ["JFROG_URL", "PROJECTS_URL"];
const TOKEN_VARS: [&str; 2] = ["JFROG_ACCESS_TOKEN", "PROJECTS_ACCESS_TOKEN"];

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    host_version: Option<String>,
}

/// Connection settings shared by every remote call.
#[derive(Clone)]
pub struct ProviderConfig {
    /// Base URL; only scheme, host and port are kept.
    pub url: Url,
    /// Bearer token.
    pub access_token: String,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Retries after the first attempt on transport errors and 5xx responses.
    pub retry_count: u32,
    /// Pause between attempts.
    pub retry_wait: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Version of the host driving this provider.
    pub host_version: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("url", &self.url.as_str())
            .field("access_token", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .field("retry_count", &self.retry_count)
            .field("retry_wait", &self.retry_wait)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ProviderConfig {
    /// Create a configuration with default retry and timeout settings.
    pub fn new(url: &str, access_token: impl Into<String>) -> Result<Self, ProviderError> {
        let access_token = access_token.into();
        if access_token.is_empty() {
            return Err(ProviderError::Configuration(
                "no authentication details supplied".to_string(),
            ));
        }
        Ok(Self {
            url: normalize_url(url)?,
            access_token,
            user_agent: user_agent(DEFAULT_HOST_VERSION),
            retry_count: DEFAULT_RETRY_COUNT,
            retry_wait: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
            host_version: DEFAULT_HOST_VERSION.to_string(),
        })
    }

    /// Build from a provider block, falling back to the process environment.
    pub fn from_json(config: &Value) -> Result<Self, ProviderError> {
        Self::from_json_with_env(config, |name| std::env::var(name).ok())
    }

    /// Build from a provider block with an injected environment lookup.
    pub fn from_json_with_env<F>(config: &Value, env: F) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: RawConfig = if config.is_null() {
            RawConfig::default()
        } else {
            serde_json::from_value(config.clone())?
        };

        let url = match raw.url {
            Some(url) => url,
            None => first_set(&URL_VARS, &env).unwrap_or_else(|| DEFAULT_URL.to_string()),
        };
        if url.trim().is_empty() {
            return Err(ProviderError::Configuration(
                "you must supply a URL".to_string(),
            ));
        }

        let token = raw
            .access_token
            .filter(|t| !t.is_empty())
            .or_else(|| first_set(&TOKEN_VARS, &env))
            .unwrap_or_default();

        let mut config = Self::new(&url, token)?;
        if let Some(version) = raw.host_version.filter(|v| !v.is_empty()) {
            config.user_agent = user_agent(&version);
            config.host_version = version;
        }
        Ok(config)
    }

    /// Set the retry budget.
    pub fn with_retry(mut self, retry_count: u32, retry_wait: Duration) -> Self {
        self.retry_count = retry_count;
        self.retry_wait = retry_wait;
        self
    }

    /// Absolute URL for an API path; each segment is percent-encoded on its own.
    pub fn endpoint<I>(&self, segments: I) -> Result<Url, ProviderError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ProviderError::Configuration(format!("url '{}' cannot be a base", self.url))
            })?
            .clear()
            .extend(segments);
        Ok(url)
    }
}

fn first_set<F>(names: &[&str], env: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names
        .iter()
        .filter_map(|name| env(name))
        .find(|value| !value.is_empty())
}

fn user_agent(host_version: &str) -> String {
    format!(
        "terraform/{} {}/{}",
        host_version,
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}

fn normalize_url(raw: &str) -> Result<Url, ProviderError> {
    let parsed = Url::parse(raw.trim())
        .map_err(|e| ProviderError::Configuration(format!("invalid url '{}': {}", raw, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ProviderError::Configuration(format!(
            "url must use http or https, got '{}'",
            parsed.scheme()
        )));
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| ProviderError::Configuration(format!("url '{}' has no host", raw)))?;

    let base = match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    };
    Url::parse(&base).map_err(|e| ProviderError::Configuration(e.to_string()))
}
