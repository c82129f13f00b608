use std::time::Duration;

use reqwest::{Client, Method, Response, StatusCode, header::HeaderMap};
use serde::{Serialize, de::DeserializeOwned};
use tokio::time::sleep;

use crate::{config::RetryConfig, error::ApiError, management::TokenManager, warning};

/// How a failed provider call should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The bearer token was refused; refresh it and replay the request.
    AuthExpired,
    /// Provider-imposed pacing, carrying `Retry-After` in seconds.
    RateLimited(u64),
    /// Worth another try after the fixed retry delay.
    TransientNetwork,
    Fatal,
}

/// Maps a provider error response to a [`Classification`].
pub type Classifier = fn(StatusCode, &HeaderMap) -> Classification;

/// Default classification of Spotify Web API error responses.
pub fn classify_status(status: StatusCode, headers: &HeaderMap) -> Classification {
    match status {
        StatusCode::UNAUTHORIZED => Classification::AuthExpired,
        StatusCode::TOO_MANY_REQUESTS => Classification::RateLimited(retry_after(headers)),
        StatusCode::REQUEST_TIMEOUT
        | StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => Classification::TransientNetwork,
        _ => Classification::Fatal,
    }
}

/// Errors raised before any response arrived.
pub fn classify_transport(err: &reqwest::Error) -> Classification {
    if err.is_builder() || err.is_redirect() || err.is_decode() {
        Classification::Fatal
    } else if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        Classification::TransientNetwork
    } else {
        Classification::Fatal
    }
}

fn retry_after(headers: &HeaderMap) -> u64 {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(1)
}

/// Retry budget applied to every request.
///
/// `max_attempts` bounds transient failures per request (and, separately,
/// token refreshes per request). Rate limiting does not consume attempts;
/// the wait is the provider's `Retry-After` plus one second.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub max_rate_limit_wait: Duration,
}

impl RetryPolicy {
    pub fn rate_limit_wait(&self, retry_after_secs: u64) -> Option<Duration> {
        let requested = Duration::from_secs(retry_after_secs);
        (requested <= self.max_rate_limit_wait).then(|| requested + Duration::from_secs(1))
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            delay: config.delay,
            max_rate_limit_wait: config.max_rate_limit_wait,
        }
    }
}

/// A replayable request against the resource API.
///
/// `url` is either a path below the API base URL or an absolute URL, as
/// handed out by the provider's `next` page pointers.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            body: None,
        }
    }

    pub fn post<T: Serialize>(url: impl Into<String>, body: &T) -> Result<Self, ApiError> {
        Self::with_body(Method::POST, url, body)
    }

    pub fn put<T: Serialize>(url: impl Into<String>, body: &T) -> Result<Self, ApiError> {
        Self::with_body(Method::PUT, url, body)
    }

    fn with_body<T: Serialize>(
        method: Method,
        url: impl Into<String>,
        body: &T,
    ) -> Result<Self, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Fatal {
            status: None,
            reason: e.to_string(),
        })?;
        Ok(Self {
            method,
            url: url.into(),
            body: Some(body),
        })
    }

    fn resolve(&self, base_url: &str) -> String {
        if self.url.starts_with("http://") || self.url.starts_with("https://") {
            self.url.clone()
        } else {
            format!("{}{}", base_url, self.url)
        }
    }
}

/// A page of a paginated collection.
pub trait Paged {
    type Item;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

/// Resource API client that resolves expired tokens, rate limiting and
/// bounded transient failures on its own.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    tokens: TokenManager,
    policy: RetryPolicy,
    classify: Classifier,
}

impl ApiClient {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        tokens: TokenManager,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
            policy,
            classify: classify_status,
        }
    }

    pub fn with_classifier(mut self, classify: Classifier) -> Self {
        self.classify = classify;
        self
    }

    /// Sends `request` until it succeeds or its failure is unrecoverable.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Auth`] when no access token can be obtained.
    /// - [`ApiError::RetriesExhausted`] when transient failures use up the
    ///   attempt budget.
    /// - [`ApiError::Fatal`] for unclassified or malformed requests, and for
    ///   rate-limit waits above the configured ceiling.
    pub async fn call(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let url = request.resolve(&self.base_url);
        let mut attempt: u32 = 0;
        let mut auth_refreshes: u32 = 0;

        loop {
            let credential = self.tokens.get_access_credential().await?;

            let mut builder = self
                .http
                .request(request.method.clone(), &url)
                .bearer_auth(&credential.value);
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let (classification, status, reason) = match builder.send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status();
                    let classification = (self.classify)(status, resp.headers());
                    let body = resp.text().await.unwrap_or_default();
                    (classification, Some(status.as_u16()), body)
                }
                Err(err) => (classify_transport(&err), None, err.to_string()),
            };

            match classification {
                Classification::AuthExpired => {
                    auth_refreshes += 1;
                    if auth_refreshes > self.policy.max_attempts {
                        return Err(ApiError::Fatal {
                            status,
                            reason: format!("access token refused after refresh: {reason}"),
                        });
                    }
                    warning!("Access token expired, refreshing before retrying {}", url);
                    self.tokens.invalidate(&credential).await;
                }
                Classification::RateLimited(secs) => match self.policy.rate_limit_wait(secs) {
                    Some(wait) => {
                        warning!(
                            "Rate limited, retrying {} in {} seconds",
                            url,
                            wait.as_secs()
                        );
                        sleep(wait).await;
                    }
                    None => {
                        warning!(
                            "Retry after has reached an abnormal high of {} seconds, giving up on {}",
                            secs,
                            url
                        );
                        return Err(ApiError::Fatal {
                            status,
                            reason: format!("rate limited for {secs} seconds"),
                        });
                    }
                },
                Classification::TransientNetwork => {
                    attempt += 1;
                    if attempt >= self.policy.max_attempts {
                        return Err(ApiError::RetriesExhausted {
                            attempts: attempt,
                            reason,
                        });
                    }
                    warning!(
                        "Request to {} failed (attempt {}/{}), retrying in {} ms",
                        url,
                        attempt,
                        self.policy.max_attempts,
                        self.policy.delay.as_millis()
                    );
                    sleep(self.policy.delay).await;
                }
                Classification::Fatal => return Err(ApiError::Fatal { status, reason }),
            }
        }
    }

    /// [`call`](Self::call) and decode the JSON body.
    pub async fn call_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        self.call(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::Fatal {
                status: None,
                reason: format!("unexpected response body: {e}"),
            })
    }

    /// Follows `next` pointers from `first` until the collection is
    /// exhausted. Each page is a fresh call with its own retry budget.
    pub async fn fetch_all<P>(&self, first: ApiRequest) -> Result<Vec<P::Item>, ApiError>
    where
        P: Paged + DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut next = Some(first);

        while let Some(request) = next.take() {
            let page: P = self.call_json(&request).await?;
            let (page_items, next_url) = page.into_parts();
            items.extend(page_items);
            next = next_url.map(ApiRequest::get);
        }

        Ok(items)
    }
}
