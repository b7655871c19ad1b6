use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::models::ModelMap;
use crate::proxy::{self, Backend, MODELS_PATH};
use crate::translate::request::{translate_request, TranslatedRequest};

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::stream::StreamExt;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub const MESSAGES_PATH: &str = "/v1/messages";

/// Shared, read-only state: built once at startup and never mutated.
#[derive(Clone)]
pub struct AppState {
    pub backend: Backend,
    pub models: ModelMap,
}

impl AppState {
    pub fn from_config(config: &ProxyConfig) -> Result<Self> {
        Ok(Self {
            backend: Backend::from_config(config)?,
            models: ModelMap::new(&config.models),
        })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            MESSAGES_PATH,
            post(handle_messages).fallback(handle_method_not_allowed),
        )
        .route(
            MODELS_PATH,
            get(handle_models)
                .head(handle_passthrough)
                .fallback(handle_passthrough),
        )
        .fallback(handle_passthrough)
        // Request bodies are forwarded whole, however large
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_messages(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req = match translate_request(&body, &state.models) {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "Failed to parse request");
            return e.into_response();
        }
    };

    info!(
        model = %req.original_model,
        backend_model = %req.backend.model,
        streaming = req.stream,
        messages = req.backend.messages.len(),
        "Request"
    );

    if req.stream {
        handle_streaming(&state, &req)
    } else {
        handle_non_streaming(&state, &req).await
    }
}

async fn handle_non_streaming(state: &AppState, req: &TranslatedRequest) -> Response {
    match proxy::proxy_non_streaming(req, &state.backend).await {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => {
            error!(error = %e, "Proxy error");
            e.into_response()
        }
    }
}

fn handle_streaming(state: &AppState, req: &TranslatedRequest) -> Response {
    let event_stream = proxy::proxy_streaming(req, &state.backend)
        .map(|event| Event::default().event(event.event_name()).json_data(&event));

    Sse::new(event_stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

async fn handle_method_not_allowed(method: Method, uri: Uri) -> ProxyError {
    warn!(method = %method, path = %uri.path(), "Method not allowed");
    ProxyError::MethodNotAllowed {
        method: method.to_string(),
        path: uri.path().to_string(),
    }
}

async fn handle_models(State(state): State<Arc<AppState>>) -> Response {
    match proxy::proxy_models(&state.backend).await {
        Ok((status, content_type, body)) => {
            let mut builder = Response::builder().status(status);
            if let Some(content_type) = content_type {
                builder = builder.header(CONTENT_TYPE, content_type);
            }
            builder
                .body(Body::from(body))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(e) => {
            error!(error = %e, "Model listing failed");
            e.into_response()
        }
    }
}

async fn handle_passthrough(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match proxy::proxy_passthrough(method, &uri, &headers, body, &state.backend).await {
        Ok(upstream) => {
            let status = upstream.status();
            let headers = proxy::mirrored_headers(upstream.headers());

            let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            response
        }
        Err(e) => {
            error!(error = %e, "Passthrough error");
            e.into_response()
        }
    }
}
