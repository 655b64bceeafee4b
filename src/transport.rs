use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::types::ErrorBody;

/// A single outgoing HTTP call.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    /// JSON body, already encoded. `None` sends a bodyless request.
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
    /// Refuse response bodies larger than this many bytes.
    pub max_body_bytes: Option<usize>,
}

/// Status and raw body of a completed HTTP call.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Sends HTTP requests on behalf of a [`StickerClient`](crate::StickerClient).
///
/// Implementations return `Ok` for every response that arrived, whatever
/// its status, and [`ApiError::Network`] when no response arrived at all.
/// Status classification happens above this trait. A transport should
/// fail with [`ApiError::ResponseTooLarge`] once a body passes
/// `max_body_bytes`; callers re-check the length regardless.
pub trait Transport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> impl Future<Output = Result<HttpResponse>> + Send;
}

/// Headers attached to every request.
pub fn default_headers(config: &ClientConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, header_value(&config.user_agent, "User-Agent")?);
    headers.insert(
        ACCEPT_LANGUAGE,
        header_value(&config.accept_language, "Accept-Language")?,
    );
    Ok(headers)
}

fn header_value(value: &str, name: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| ApiError::Validation(format!("invalid {name} header value: {value:?}")))
}

/// [`Transport`] backed by a shared `reqwest::Client`.
///
/// Clones share one connection pool, so a health probe and a generation
/// poll can run concurrently over the same transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    /// Build a transport with the config's default headers.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .default_headers(default_headers(config)?)
            .build()
            .map_err(|e| ApiError::network("Failed to build HTTP client", e))?;
        Ok(Self { http })
    }

    /// Use a custom `reqwest::Client` (TLS, proxies, pool tuning).
    ///
    /// The client is used as-is; default headers are not added.
    pub fn with_http_client(http: Client) -> Self {
        Self { http }
    }
}

impl Transport for HttpTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            url,
            body,
            timeout,
            max_body_bytes,
        } = request;

        let mut builder = self.http.request(method.clone(), &url).timeout(timeout);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let mut resp = builder.send().await.map_err(|e| {
            let context = if e.is_timeout() {
                format!("{method} {url} timed out after {timeout:?}")
            } else {
                format!("Cannot reach sticker service at {url}")
            };
            ApiError::network(context, e)
        })?;

        let status = resp.status().as_u16();
        if let (Some(limit), Some(len)) = (max_body_bytes, resp.content_length()) {
            if len > limit as u64 {
                return Err(ApiError::ResponseTooLarge { limit });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| ApiError::network(format!("Failed to read response from {url}"), e))?
        {
            if let Some(limit) = max_body_bytes {
                if body.len() + chunk.len() > limit {
                    return Err(ApiError::ResponseTooLarge { limit });
                }
            }
            body.extend_from_slice(&chunk);
        }

        Ok(HttpResponse { status, body })
    }
}

/// Classify a response and decode a 2xx body as `R`.
pub fn decode_response<R: DeserializeOwned>(response: &HttpResponse) -> Result<R> {
    if !(200..300).contains(&response.status) {
        return Err(error_for_status(response));
    }

    let text = String::from_utf8_lossy(&response.body);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidResponse("empty response body".into()));
    }
    if trimmed.starts_with('<') {
        return Err(ApiError::InvalidResponse(
            "server returned markup instead of JSON".into(),
        ));
    }

    serde_json::from_slice(&response.body).map_err(ApiError::Decoding)
}

/// Map a non-2xx response to its error.
pub fn error_for_status(response: &HttpResponse) -> ApiError {
    match response.status {
        400 => ApiError::Validation(
            server_message(&response.body).unwrap_or_else(|| "Bad request".into()),
        ),
        429 | 503 => ApiError::Overloaded,
        500 => ApiError::Server(
            server_message(&response.body).unwrap_or_else(|| "Internal server error".into()),
        ),
        status => ApiError::Http { status },
    }
}

fn server_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
}
