use axum::Json;
use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::header::{ALLOW, CONTENT_TYPE};
use serde::Serialize;
use thiserror::Error;

const CONFIGURATION_MESSAGE: &str = "The AI service is not configured on the server.";
const UNREACHABLE_MESSAGE: &str = "Failed to reach the AI service.";
const PAYLOAD_TOO_LARGE_MESSAGE: &str = "Request body is too large.";
const TIMEOUT_MESSAGE: &str = "The AI service did not respond in time.";

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("request body exceeds the configured limit")]
    PayloadTooLarge,
    #[error("upstream credential is not configured")]
    Configuration,
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),
    #[error("upstream timed out")]
    UpstreamTimeout,
    #[error("upstream responded with status {status}")]
    Upstream {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: ErrorMessage<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorMessage<'a> {
    message: &'a str,
}

impl ProxyError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Upstream { status, .. } => *status,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::MethodNotAllowed(method) => {
                let message = format!("Method {method} Not Allowed");
                let mut resp = json_error(status, &message);
                resp.headers_mut()
                    .insert(ALLOW, HeaderValue::from_static("POST"));
                resp
            }
            Self::BadRequest(message) => json_error(status, &message),
            Self::PayloadTooLarge => json_error(status, PAYLOAD_TOO_LARGE_MESSAGE),
            Self::Configuration => json_error(status, CONFIGURATION_MESSAGE),
            Self::UpstreamUnreachable(_) => json_error(status, UNREACHABLE_MESSAGE),
            Self::UpstreamTimeout => json_error(status, TIMEOUT_MESSAGE),
            Self::Upstream { headers, body, .. } => passthrough(status, &headers, body),
        }
    }
}

fn json_error(status: StatusCode, message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorMessage { message },
    };
    (status, Json(body)).into_response()
}

// Upstream diagnostics go back to the client byte for byte.
fn passthrough(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Response {
    let content_type = headers
        .get(CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));
    let mut resp = Response::new(Body::from(body));
    *resp.status_mut() = status;
    resp.headers_mut().insert(CONTENT_TYPE, content_type);
    resp
}
