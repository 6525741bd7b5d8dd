use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use tracing::{error, info, warn};

use crate::core::CoreState;
use crate::error::ProxyError;
use crate::prompt::build_request;
use crate::request::ProxyRequest;
use crate::response::Reply;
use crate::upstream::CallContext;

/// Canonical endpoint: replies with `{text}`.
pub async fn proxy_handler(
    State(state): State<Arc<CoreState>>,
    method: Method,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let ctx = CallContext {
        trace_id: request_id(&headers),
    };

    let result = forward(&state, method, body, &ctx).await.map(|raw| {
        let reply = Reply::interpret(&raw);
        log_reply(&reply, &raw, &ctx);
        reply.into_proxy_response()
    });
    match result {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(err) => failure_response(err, &ctx),
    }
}

/// Legacy `/api/gemini` endpoint: relays the upstream `generateContent` body
/// unchanged, which is the shape its clients read candidates from.
pub async fn gemini_relay_handler(
    State(state): State<Arc<CoreState>>,
    method: Method,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let ctx = CallContext {
        trace_id: request_id(&headers),
    };

    match forward(&state, method, body, &ctx).await {
        Ok(raw) => {
            let mut resp = Response::new(Body::from(raw));
            resp.headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            resp
        }
        Err(err) => failure_response(err, &ctx),
    }
}

async fn forward(
    state: &CoreState,
    method: Method,
    body: Result<Bytes, BytesRejection>,
    ctx: &CallContext,
) -> Result<Bytes, ProxyError> {
    if method != Method::POST {
        return Err(ProxyError::MethodNotAllowed(method));
    }

    let body = body.map_err(body_rejection)?;
    let request = ProxyRequest::from_body(&body, state.config.default_attach_system_prompt)?;
    let credential = state.credential.as_ref().ok_or(ProxyError::Configuration)?;

    info!(
        event = "proxy_request",
        trace_id = %ctx.trace_id,
        mode = %request.mode,
        attach_system_prompt = request.attach_system_prompt,
        text_len = request.text.len()
    );

    let upstream_request = build_request(&request, &state.config.model);
    state
        .upstream
        .generate(credential, upstream_request, ctx)
        .await
}

fn body_rejection(rejection: BytesRejection) -> ProxyError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ProxyError::PayloadTooLarge
    } else {
        ProxyError::bad_request("Failed to read the request body.")
    }
}

fn log_reply(reply: &Reply, raw: &[u8], ctx: &CallContext) {
    match reply {
        Reply::Text { usage, .. } => info!(
            event = "proxy_response",
            trace_id = %ctx.trace_id,
            reply = reply.kind(),
            total_tokens = usage.and_then(|usage| usage.total_token_count)
        ),
        _ => warn!(
            event = "proxy_response",
            trace_id = %ctx.trace_id,
            reply = reply.kind(),
            body = %String::from_utf8_lossy(raw)
        ),
    }
}

fn failure_response(err: ProxyError, ctx: &CallContext) -> Response {
    log_failure(&err, ctx);
    err.into_response()
}

fn log_failure(err: &ProxyError, ctx: &CallContext) {
    match err {
        ProxyError::Configuration => error!(
            event = "proxy_error",
            trace_id = %ctx.trace_id,
            status = err.status().as_u16(),
            "upstream credential is not configured; set it in the server environment"
        ),
        ProxyError::UpstreamUnreachable(detail) => error!(
            event = "proxy_error",
            trace_id = %ctx.trace_id,
            status = err.status().as_u16(),
            error = %detail
        ),
        _ => warn!(
            event = "proxy_error",
            trace_id = %ctx.trace_id,
            status = err.status().as_u16(),
            error = %err
        ),
    }
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .or_else(|| headers.get("request-id"))
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}
