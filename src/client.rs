//! Cache Client Module
//!
//! Async HTTP client for a running `ristretto-server`.
//!
//! Connection failures are retried with linear backoff. Error statuses
//! returned by the server are surfaced as-is and never retried.

use std::time::Duration;

use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{
    ClearResponse, DeleteResponse, ErrorResponse, GetResponse, HealthResponse, SetRequest,
    SetResponse, StatsResponse,
};

/// Default server address used by the CLI.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5050";

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(200);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// == Client Error ==
#[derive(Error, Debug)]
pub enum ClientError {
    /// Server unreachable after every retry
    #[error("connection failed after {attempts} attempt(s): {source}")]
    Connection {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with an error status
    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },

    /// Response body did not match the expected shape
    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("invalid server url: {0}")]
    InvalidUrl(String),

    #[error("failed to build HTTP client: {0}")]
    Setup(String),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

// == Cache Client ==
/// Thin typed wrapper over the server's HTTP/JSON API.
#[derive(Debug, Clone)]
pub struct CacheClient {
    http: reqwest::Client,
    base_url: Url,
    max_retries: u32,
    backoff: Duration,
}

impl CacheClient {
    /// Creates a client for the server at `base_url`, e.g. `http://127.0.0.1:5050`.
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Setup(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF,
        })
    }

    /// Sets how many times a failed connection is retried, and the base delay.
    ///
    /// The n-th retry waits `n * backoff`.
    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    // == Get ==
    /// Fetches `key`. A 404 from the server maps to `Ok(None)`.
    pub async fn get(&self, key: &str) -> ClientResult<Option<String>> {
        let url = self.url(&["get", key])?;
        let response = self.send(Method::GET, url, None).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: GetResponse = decode(response).await?;
        Ok(Some(body.value))
    }

    // == Set ==
    /// Writes a key. `admitted` in the response reports whether it was stored.
    pub async fn set(&self, request: &SetRequest) -> ClientResult<SetResponse> {
        let url = self.url(&["set"])?;
        decode(self.send(Method::PUT, url, Some(request)).await?).await
    }

    // == Delete ==
    pub async fn delete(&self, key: &str) -> ClientResult<DeleteResponse> {
        let url = self.url(&["del", key])?;
        decode(self.send(Method::DELETE, url, None).await?).await
    }

    pub async fn clear(&self) -> ClientResult<ClearResponse> {
        let url = self.url(&["clear"])?;
        decode(self.send(Method::POST, url, None).await?).await
    }

    pub async fn stats(&self) -> ClientResult<StatsResponse> {
        let url = self.url(&["stats"])?;
        decode(self.send(Method::GET, url, None).await?).await
    }

    pub async fn health(&self) -> ClientResult<HealthResponse> {
        let url = self.url(&["health"])?;
        decode(self.send(Method::GET, url, None).await?).await
    }

    /// Appends percent-encoded path segments to the base URL.
    fn url(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&SetRequest>,
    ) -> ClientResult<reqwest::Response> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let mut request = self.http.request(method.clone(), url.clone());
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    debug!(%method, %url, status = response.status().as_u16(), "request completed");
                    return Ok(response);
                }
                Err(error) if attempt <= self.max_retries && is_retryable(&error) => {
                    let delay = self.backoff * attempt;
                    warn!(%url, attempt, ?delay, error = %error, "request failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(source) => {
                    return Err(ClientError::Connection {
                        attempts: attempt,
                        source,
                    })
                }
            }
        }
    }
}

fn is_retryable(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}

/// Decodes a success body, or turns an error status into `ClientError::Server`.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()));
    }

    let text = response
        .text()
        .await
        .map_err(|e| ClientError::Decode(e.to_string()))?;
    let message = serde_json::from_str::<ErrorResponse>(&text)
        .map(|body| body.error)
        .unwrap_or(text);

    Err(ClientError::Server {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_encodes_key_segments() {
        let client = CacheClient::new("http://localhost:5050").unwrap();
        let url = client.url(&["get", "a key/with slash"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5050/get/a%20key%2Fwith%20slash");
    }

    #[test]
    fn test_url_keeps_base_path() {
        let client = CacheClient::new("http://localhost:5050/cache/").unwrap();
        let url = client.url(&["stats"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5050/cache/stats");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            CacheClient::new("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(matches!(
            CacheClient::new("mailto:someone@example.com"),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_gives_connection_error() {
        // Grab a free port, then close it
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let client = CacheClient::new(&format!("http://{}", addr))
            .unwrap()
            .with_retries(2, Duration::from_millis(10));

        match client.health().await {
            Err(ClientError::Connection { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected connection error, got {:?}", other),
        }
    }
}
