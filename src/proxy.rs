use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::translate::anthropic_types::{ErrorResponse, MessagesResponse, StreamEvent};
use crate::translate::openai_types::{ChatCompletionResponse, ChatErrorResponse};
use crate::translate::request::TranslatedRequest;
use crate::translate::response::{openai_error_to_anthropic, openai_to_anthropic};
use crate::translate::streaming::reframe;

use axum::http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HOST, TRANSFER_ENCODING};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use bytes::Bytes;
use futures::stream::Stream;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
pub const MODELS_PATH: &str = "/v1/models";

/// Headers that describe a single hop; each side's HTTP stack sets its own.
const HOP_HEADERS: [axum::http::HeaderName; 4] = [HOST, CONTENT_LENGTH, TRANSFER_ENCODING, CONNECTION];

/// Anthropic events in emission order
pub type SseStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Where backend calls go and how long non-streaming ones may take.
#[derive(Debug, Clone)]
pub struct Backend {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl Backend {
    pub fn new(client: reqwest::Client, base_url: &str, request_timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            request_timeout,
        }
    }

    /// No client-wide timeout: streaming and passthrough calls may run as long as
    /// the inbound connection does. Non-streaming calls set one per request.
    pub fn from_config(config: &ProxyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProxyError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::new(client, &config.base_url(), config.request_timeout()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// `path_and_query` must start with `/`.
    pub fn url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url, path_and_query)
    }
}

/// Forward a translated non-streaming request and translate the reply.
pub async fn proxy_non_streaming(
    req: &TranslatedRequest,
    backend: &Backend,
) -> Result<MessagesResponse> {
    let url = backend.url(CHAT_COMPLETIONS_PATH);

    info!(url = %url, model = %req.backend.model, "Forwarding chat completion");

    let response = backend
        .client
        .post(&url)
        .timeout(backend.request_timeout())
        .json(&req.backend)
        .send()
        .await
        .map_err(ProxyError::BackendUnreachable)?;

    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(ProxyError::BackendUnreachable)?;

    debug!(status = status.as_u16(), body_len = body.len(), "Backend responded");

    if !status.is_success() {
        let err = upstream_error(status, &body);
        warn!(status = status.as_u16(), error = %err, "Backend returned an error");
        return Err(err);
    }

    let openai_resp: ChatCompletionResponse = serde_json::from_slice(&body).map_err(|e| {
        ProxyError::backend_decode(format!(
            "{}. Body: {}",
            e,
            truncate(&String::from_utf8_lossy(&body), 300)
        ))
    })?;

    let anthropic_resp = openai_to_anthropic(&openai_resp, &req.original_model);

    info!(
        input_tokens = anthropic_resp.usage.input_tokens,
        output_tokens = anthropic_resp.usage.output_tokens,
        "Completed"
    );

    Ok(anthropic_resp)
}

/// Forward a translated streaming request, returning Anthropic stream events.
///
/// The returned stream opens the message immediately and only then contacts the
/// backend. Dropping it (client disconnect) drops the backend connection with it.
pub fn proxy_streaming(req: &TranslatedRequest, backend: &Backend) -> SseStream {
    let url = backend.url(CHAT_COMPLETIONS_PATH);

    info!(url = %url, model = %req.backend.model, "Forwarding chat completion (streaming)");

    let request = backend.client.post(&url).json(&req.backend);
    Box::pin(reframe(open_stream(request)))
}

async fn open_stream(
    request: reqwest::RequestBuilder,
) -> Result<impl Stream<Item = reqwest::Result<Bytes>>> {
    let response = request.send().await.map_err(ProxyError::BackendUnreachable)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.bytes().await.unwrap_or_default();
        return Err(upstream_error(status, &body));
    }

    Ok(response.bytes_stream())
}

/// Fetch the backend's model listing, unchanged.
pub async fn proxy_models(backend: &Backend) -> Result<(StatusCode, Option<HeaderValue>, Bytes)> {
    let url = backend.url(MODELS_PATH);

    info!(url = %url, "Forwarding model listing");

    let response = backend
        .client
        .get(&url)
        .send()
        .await
        .map_err(ProxyError::BackendUnreachable)?;

    let status = response.status();
    let content_type = response.headers().get(CONTENT_TYPE).cloned();
    let body = response
        .bytes()
        .await
        .map_err(ProxyError::BackendUnreachable)?;

    debug!(status = status.as_u16(), body_len = body.len(), "Model listing response");

    Ok((status, content_type, body))
}

/// Forward any request to the same path on the backend, untouched.
pub async fn proxy_passthrough(
    method: Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
    backend: &Backend,
) -> Result<reqwest::Response> {
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
    let url = backend.url(path_and_query);

    info!(method = %method, url = %url, "Passthrough");

    let mut forwarded = headers.clone();
    for name in &HOP_HEADERS {
        forwarded.remove(name);
    }

    let response = backend
        .client
        .request(method, &url)
        .headers(forwarded)
        .body(body)
        .send()
        .await
        .map_err(ProxyError::BackendUnreachable)?;

    debug!(status = response.status().as_u16(), "Passthrough response");

    Ok(response)
}

/// Strip the hop-scoped headers from an upstream response before mirroring it.
pub fn mirrored_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = upstream.clone();
    headers.remove(TRANSFER_ENCODING);
    headers.remove(CONNECTION);
    headers
}

fn upstream_error(status: StatusCode, body: &[u8]) -> ProxyError {
    let body = match serde_json::from_slice::<ChatErrorResponse>(body) {
        Ok(err) => openai_error_to_anthropic(&err),
        Err(_) => ErrorResponse::api_error(format!(
            "Backend returned status {}: {}",
            status.as_u16(),
            truncate(&String::from_utf8_lossy(body), 500)
        )),
    };

    ProxyError::Upstream {
        status: status.as_u16(),
        body,
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_url_joins_without_double_slash() {
        let backend = Backend::new(
            reqwest::Client::new(),
            "http://localhost:11434/",
            Duration::from_secs(1),
        );
        assert_eq!(backend.base_url(), "http://localhost:11434");
        assert_eq!(backend.request_timeout(), Duration::from_secs(1));
        assert_eq!(
            backend.url(CHAT_COMPLETIONS_PATH),
            "http://localhost:11434/v1/chat/completions"
        );
        assert_eq!(
            backend.url("/api/tags?verbose=1"),
            "http://localhost:11434/api/tags?verbose=1"
        );
    }

    #[test]
    fn test_upstream_error_uses_backend_message() {
        let body = br#"{"error":{"message":"model \"nope\" not found, try pulling it first","type":"api_error"}}"#;
        let err = upstream_error(StatusCode::NOT_FOUND, body);
        let ProxyError::Upstream { status, body } = err else {
            panic!("expected upstream error");
        };
        assert_eq!(status, 404);
        assert!(body.error.message.contains("try pulling it first"));
    }

    #[test]
    fn test_upstream_error_with_plain_body() {
        let err = upstream_error(StatusCode::SERVICE_UNAVAILABLE, b"loading model");
        let ProxyError::Upstream { status, body } = err else {
            panic!("expected upstream error");
        };
        assert_eq!(status, 503);
        assert_eq!(body.error.error_type, "api_error");
        assert!(body.error.message.contains("loading model"));
    }

    #[test]
    fn test_mirrored_headers_drop_hop_headers() {
        let mut upstream = HeaderMap::new();
        upstream.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        upstream.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        upstream.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        upstream.insert("x-backend", HeaderValue::from_static("ollama"));

        let headers = mirrored_headers(&upstream);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["x-backend"], "ollama");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ééé", 3), "é");
    }
}
