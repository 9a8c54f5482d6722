//! The single chokepoint for calls to the edge functions.
//!
//! Adds the bearer token, defaults JSON bodies, and turns non-2xx answers
//! into [`AppError::Request`] with the message the function sent back.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Request, Response};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::session::TokenProvider;

const FALLBACK_MESSAGE: &str = "Request failed";

/// Per-call knobs. `auth_required` defaults to true.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub body: Option<serde_json::Value>,
    pub headers: HeaderMap,
    pub auth_required: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            body: None,
            headers: HeaderMap::new(),
            auth_required: true,
        }
    }
}

impl RequestOptions {
    pub fn json(body: serde_json::Value) -> Self {
        Self {
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn header(mut self, name: HeaderName, value: &'static str) -> Self {
        self.headers.insert(name, HeaderValue::from_static(value));
        self
    }

    pub fn unauthenticated(mut self) -> Self {
        self.auth_required = false;
        self
    }
}

/// Extract `{"error": "..."}` from a failed response body.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(|s| s.to_string()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
}

pub struct Gateway {
    client: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    anon_key: Option<String>,
}

impl Gateway {
    pub fn new(tokens: Arc<dyn TokenProvider>, anon_key: Option<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent("FoodLoopsBackOffice/1.0")
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            tokens,
            anon_key,
        })
    }

    /// Assemble the outgoing request without sending it.
    ///
    /// A missing token is not an error here: the request goes out without
    /// `Authorization` and the remote function decides.
    pub async fn build(
        &self,
        method: Method,
        url: &str,
        opts: RequestOptions,
    ) -> Result<Request, AppError> {
        let mut headers = opts.headers;

        if opts.body.is_some() && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        if opts.auth_required {
            match self.tokens.access_token().await {
                Some(token) => {
                    let value = HeaderValue::from_str(&format!("Bearer {}", token))
                        .map_err(|e| AppError::Auth(format!("Invalid access token: {}", e)))?;
                    headers.insert(AUTHORIZATION, value);
                }
                None => debug!("No active session, sending {} {} without token", method, url),
            }
        }

        if let Some(key) = &self.anon_key {
            let apikey = HeaderName::from_static("apikey");
            if !headers.contains_key(&apikey) {
                if let Ok(value) = HeaderValue::from_str(key) {
                    headers.insert(apikey, value);
                }
            }
        }

        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = opts.body {
            let bytes = serde_json::to_vec(&body)
                .map_err(|e| AppError::Decode(format!("Failed to encode request body: {}", e)))?;
            builder = builder.body(bytes);
        }
        builder
            .build()
            .map_err(|e| AppError::Config(format!("Invalid request to '{}': {}", url, e)))
    }

    pub async fn send(&self, request: Request) -> Result<Response, AppError> {
        let label = format!("{} {}", request.method(), request.url().path());
        let resp = self.client.execute(request).await.map_err(|e| {
            warn!("{} failed: {}", label, e);
            AppError::Network(e.to_string())
        })?;
        check_response(resp, &label).await
    }

    pub async fn request(
        &self,
        method: Method,
        url: &str,
        opts: RequestOptions,
    ) -> Result<Response, AppError> {
        let request = self.build(method, url, opts).await?;
        self.send(request).await
    }
}

/// Pass 2xx through; otherwise log status and raw body and fail with the
/// function's own message.
pub async fn check_response(resp: Response, label: &str) -> Result<Response, AppError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    warn!("{} failed ({}): {}", label, status, body);
    Err(AppError::Request {
        status: status.as_u16(),
        message: error_message(&body),
        body,
    })
}
