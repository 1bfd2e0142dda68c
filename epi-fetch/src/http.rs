use std::time::Duration;

use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::ClientConfig;

/// Failures talking to the backend.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum HttpError {
    /// No response, e.g. connection refused or reset.
    #[error("network error: {0}")]
    Network(String),
    /// No response within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// The backend answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// The status code.
        status: u16,
        /// The response body, parsed as json when possible, otherwise a json string.
        body: Value,
        /// A display message taken from the body, or the status reason.
        message: String,
    },
    /// A 2xx response whose body couldn't be decoded.
    #[error("could not decode response: {0}")]
    Decode(String),
    /// The base url and path don't form a valid url.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// The request couldn't be built, e.g. a malformed header name.
    #[error("invalid request: {0}")]
    Request(String),
}

impl HttpError {
    pub(crate) fn status(status: u16, body: Value) -> Self {
        let message = ["message", "error", "detail"]
            .iter()
            .find_map(|field| body.get(field).and_then(Value::as_str))
            .map(str::to_string)
            .or_else(|| body.as_str().filter(|s| !s.is_empty()).map(str::to_string))
            .unwrap_or_else(|| {
                StatusCode::from_u16(status)
                    .ok()
                    .and_then(|status| status.canonical_reason())
                    .unwrap_or("unexpected status")
                    .to_string()
            });
        HttpError::Status {
            status,
            body,
            message,
        }
    }

    /// Transport failures, timeouts and 5xx responses are worth another attempt, 4xx never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::Network(_) | HttpError::Timeout(_) => true,
            HttpError::Status { status, .. } => *status >= 500,
            HttpError::Decode(_) | HttpError::InvalidUrl(_) | HttpError::Request(_) => false,
        }
    }

    /// The response status, if the backend answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Query string, json body and extra headers for a single request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// Query string pairs, in order.
    pub query: Vec<(String, String)>,
    /// Json body.
    pub body: Option<Value>,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    /// No query, body or extra headers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append query string pairs.
    pub fn with_query(mut self, pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    /// Append a single query string pair.
    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Set the json body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Json client for the backend REST API, with a per attempt timeout and fixed delay retries.
#[derive(Debug, Clone)]
pub struct HttpClient {
    config: ClientConfig,
    client: reqwest::Client,
}

impl HttpClient {
    /// Create a client from its config.
    pub fn new(config: ClientConfig) -> Result<Self, HttpError> {
        Url::parse(&config.base_url)
            .map_err(|e| HttpError::InvalidUrl(format!("{}: {e}", config.base_url)))?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| HttpError::Network(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// The config this client was created with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// `GET path`
    pub async fn get(&self, path: &str, options: RequestOptions) -> Result<Value, HttpError> {
        self.request(Method::GET, path, options).await
    }

    /// `POST path`
    pub async fn post(&self, path: &str, options: RequestOptions) -> Result<Value, HttpError> {
        self.request(Method::POST, path, options).await
    }

    /// `PUT path`
    pub async fn put(&self, path: &str, options: RequestOptions) -> Result<Value, HttpError> {
        self.request(Method::PUT, path, options).await
    }

    /// `PATCH path`
    pub async fn patch(&self, path: &str, options: RequestOptions) -> Result<Value, HttpError> {
        self.request(Method::PATCH, path, options).await
    }

    /// `DELETE path`
    pub async fn delete(&self, path: &str, options: RequestOptions) -> Result<Value, HttpError> {
        self.request(Method::DELETE, path, options).await
    }

    /// `GET path`, decoding the json response into `T`.
    pub async fn get_json<T>(&self, path: &str, options: RequestOptions) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        self.request_json(Method::GET, path, options).await
    }

    /// Send a request and decode the json response into `T`.
    pub async fn request_json<T>(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let value = self.request(method, path, options).await?;
        serde_json::from_value(value).map_err(|e| HttpError::Decode(e.to_string()))
    }

    /// Send a request, retrying transport, timeout and 5xx failures up to `max_retries` times.
    ///
    /// Empty response bodies are returned as [`Value::Null`].
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<Value, HttpError> {
        let url = self.url(path)?;
        let max_attempts = self.config.max_retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            match self.send_once(&method, &url, &options).await {
                Ok(value) => {
                    tracing::trace!(%method, %url, attempt, "request succeeded");
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(
                        %method,
                        %url,
                        attempt,
                        max_attempts,
                        "request failed, retrying in {:?}: {e}",
                        self.config.retry_delay
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::debug!(%method, %url, attempt, "request failed: {e}");
                    return Err(e);
                }
            }
        }
    }

    fn url(&self, path: &str) -> Result<Url, HttpError> {
        let joined = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| HttpError::InvalidUrl(format!("{joined}: {e}")))
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        options: &RequestOptions,
    ) -> Result<Value, HttpError> {
        let mut builder = self
            .client
            .request(method.clone(), url.clone())
            .header(reqwest::header::ACCEPT, "application/json");
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &options.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;

        if status.is_success() {
            if bytes.is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_slice(&bytes).map_err(|e| HttpError::Decode(e.to_string()))
        } else {
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes)
                    .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
            };
            Err(HttpError::status(status.as_u16(), body))
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> HttpError {
        if e.is_timeout() {
            HttpError::Timeout(self.config.timeout)
        } else if e.is_builder() {
            HttpError::Request(e.to_string())
        } else {
            HttpError::Network(e.to_string())
        }
    }
}
