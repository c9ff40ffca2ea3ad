//! HTTP client for the library service.
//!
//! Every call goes through [`ApiClient::request`], which adds Basic
//! credentials, retries server errors with backoff, and suppresses mutating
//! verbs in dry-run mode.

pub mod models;
mod retry;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use retry::{RetryPolicy, is_server_error};

/// Statuses accepted when a call site doesn't say otherwise.
pub const DEFAULT_EXPECTED: &[u16] = &[200, 201, 204];

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{method} {url} -> {status}")]
    Http {
        method: Method,
        url: String,
        status: u16,
        body: Option<String>,
    },
    #[error("{method} {url} failed: {source}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Unexpected response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Couldn't encode request body: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ApiError {
    /// HTTP status, if the service answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Http { body, .. } => body.as_deref(),
            _ => None,
        }
    }

    /// The service answered with an unexpected status.
    pub fn is_http(&self) -> bool {
        matches!(self, Self::Http { .. })
    }

    /// 400 or 409: the entity already exists or the pairing is invalid.
    pub fn is_conflict(&self) -> bool {
        matches!(self.status(), Some(400 | 409))
    }
}

/// HTTP Basic credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Settings for an [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// Credentials used when a call doesn't pass its own.
    pub default_auth: Option<BasicAuth>,
    /// Log mutating requests instead of sending them.
    pub dry_run: bool,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            default_auth: Some(BasicAuth::new("admin", "admin")),
            dry_run: false,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Snapshot of what the client has put on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RequestStats {
    /// Requests actually sent, retries included.
    pub sent: usize,
    /// Sent requests with a mutating verb.
    pub mutating_sent: usize,
    /// Mutating requests swallowed by dry-run mode.
    pub suppressed: usize,
}

#[derive(Debug, Default)]
struct Counters {
    sent: AtomicUsize,
    mutating_sent: AtomicUsize,
    suppressed: AtomicUsize,
}

/// JSON-over-HTTP client for the library service.
pub struct ApiClient {
    client: Client,
    base_url: String,
    default_auth: Option<BasicAuth>,
    dry_run: bool,
    retry: RetryPolicy,
    counters: Counters,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| ApiError::Transport {
                method: Method::GET,
                url: config.base_url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_auth: config.default_auth,
            dry_run: config.dry_run,
            retry: config.retry,
            counters: Counters::default(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn stats(&self) -> RequestStats {
        RequestStats {
            sent: self.counters.sent.load(Ordering::Relaxed),
            mutating_sent: self.counters.mutating_sent.load(Ordering::Relaxed),
            suppressed: self.counters.suppressed.load(Ordering::Relaxed),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Sends one request and returns the parsed body.
    ///
    /// Returns `None` for 204, an empty body, or a suppressed dry-run call.
    /// Bodies that aren't JSON come back as [`Value::String`]. Statuses outside
    /// `expected` (default [`DEFAULT_EXPECTED`]) fail with [`ApiError::Http`];
    /// server errors and transport failures are retried first.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        auth: Option<&BasicAuth>,
        body: Option<&Value>,
        expected: Option<&[u16]>,
    ) -> Result<Option<Value>, ApiError> {
        let url = self.url(path);
        let mutating = is_mutating(&method);

        if self.dry_run && mutating {
            info!("DRY-RUN {} {} body={}", method, url, compact(body));
            self.counters.suppressed.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        let expected = expected.unwrap_or(DEFAULT_EXPECTED);
        let auth = auth.or(self.default_auth.as_ref());
        let mut attempt = 0;

        loop {
            self.counters.sent.fetch_add(1, Ordering::Relaxed);
            if mutating {
                self.counters.mutating_sent.fetch_add(1, Ordering::Relaxed);
            }

            match self.send_once(&method, &url, auth, body).await {
                Ok((status, text)) if expected.contains(&status) => {
                    return Ok(parse_body(status, text));
                }
                Ok((status, text)) => {
                    let retryable = self.retry.is_retryable_status(status);
                    if retryable && self.retry.should_retry(attempt) {
                        let delay = self.retry.delay_for(attempt);
                        warn!(
                            "{} {} -> {}, retrying in {:?}",
                            method, url, status, delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(ApiError::Http {
                        method,
                        url,
                        status,
                        body: (!text.is_empty()).then_some(text),
                    });
                }
                Err(source) => {
                    if self.retry.should_retry(attempt) {
                        let delay = self.retry.delay_for(attempt);
                        warn!(
                            "{} {} failed ({}), retrying in {:?}",
                            method, url, source, delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(ApiError::Transport {
                        method,
                        url,
                        source,
                    });
                }
            }
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        auth: Option<&BasicAuth>,
        body: Option<&Value>,
    ) -> Result<(u16, String), reqwest::Error> {
        let mut builder = self
            .client
            .request(method.clone(), url)
            .header(ACCEPT, "application/json");
        if let Some(auth) = auth {
            builder = builder.basic_auth(&auth.username, Some(&auth.password));
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        debug!("{} {} -> {}", method, url, status);
        Ok((status, text))
    }

    /// Fetches a JSON array, skipping entries that don't match `T`.
    pub async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let Some(value) = self.request(Method::GET, path, None, None, None).await? else {
            return Ok(Vec::new());
        };
        let Value::Array(items) = value else {
            return Err(ApiError::Decode {
                url: self.url(path),
                source: serde::de::Error::custom("expected a JSON array"),
            });
        };

        Ok(items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    debug!("Skipping malformed entry from {}: {}", path, e);
                    None
                }
            })
            .collect())
    }

    /// POSTs `body` and decodes the response into `T`.
    ///
    /// `Ok(None)` means nothing came back, which is always the case in dry-run
    /// mode.
    pub async fn post<B, T>(
        &self,
        path: &str,
        auth: Option<&BasicAuth>,
        body: Option<&B>,
        expected: &[u16],
    ) -> Result<Option<T>, ApiError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(ApiError::Encode)?;
        let value = self
            .request(Method::POST, path, auth, body.as_ref(), Some(expected))
            .await?;

        value
            .map(|v| {
                serde_json::from_value(v).map_err(|source| ApiError::Decode {
                    url: self.url(path),
                    source,
                })
            })
            .transpose()
    }

    /// POSTs and ignores whatever comes back.
    pub async fn post_unit<B: Serialize>(
        &self,
        path: &str,
        auth: Option<&BasicAuth>,
        body: Option<&B>,
        expected: &[u16],
    ) -> Result<(), ApiError> {
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(ApiError::Encode)?;
        self.request(Method::POST, path, auth, body.as_ref(), Some(expected))
            .await?;
        Ok(())
    }
}

fn is_mutating(method: &Method) -> bool {
    ![Method::GET, Method::HEAD, Method::OPTIONS].contains(method)
}

fn parse_body(status: u16, text: String) -> Option<Value> {
    if status == 204 || text.is_empty() {
        return None;
    }
    Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

/// One-line JSON for log output.
fn compact(body: Option<&Value>) -> String {
    match body {
        None => "null".to_string(),
        Some(value) => serde_json::to_string(value).unwrap_or_else(|_| value.to_string()),
    }
}
