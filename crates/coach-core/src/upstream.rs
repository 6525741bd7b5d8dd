use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use coach_protocol::gemini::generate_content::GenerateContentRequest;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue};
use tracing::{info, warn};

use crate::config::{Credential, ProxyConfig};
use crate::error::ProxyError;

const API_KEY_HEADER: &str = "x-goog-api-key";
const OP_GENERATE: &str = "gemini.generate";

#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub trace_id: String,
}

/// Single outbound call to the generative API.
///
/// Implementations return the raw success body; non-success statuses and
/// transport failures come back as [`ProxyError`].
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn generate(
        &self,
        credential: &Credential,
        request: GenerateContentRequest,
        ctx: &CallContext,
    ) -> Result<Bytes, ProxyError>;
}

#[derive(Debug, Clone)]
pub struct GeminiUpstream {
    client: wreq::Client,
    base_url: String,
}

impl GeminiUpstream {
    pub fn new(config: &ProxyConfig) -> Result<Self, wreq::Error> {
        let mut builder = wreq::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout);
        if let Some(proxy) = config.proxy.as_deref() {
            builder = builder.proxy(wreq::Proxy::all(proxy)?);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl Upstream for GeminiUpstream {
    async fn generate(
        &self,
        credential: &Credential,
        request: GenerateContentRequest,
        ctx: &CallContext,
    ) -> Result<Bytes, ProxyError> {
        let model = request.path.model;
        let path = format!("/v1beta/models/{model}:generateContent");
        let url = build_url(&self.base_url, &path);
        let headers = build_gemini_headers(credential)?;
        let started_at = Instant::now();
        info!(
            event = "upstream_request",
            trace_id = %ctx.trace_id,
            op = OP_GENERATE,
            method = "POST",
            path = %path,
            model = %model,
            system_instruction = request.body.system_instruction.is_some()
        );
        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(&request.body)
            .send()
            .await
            .map_err(|err| {
                warn!(
                    event = "upstream_response",
                    trace_id = %ctx.trace_id,
                    op = OP_GENERATE,
                    status = "error",
                    elapsed_ms = started_at.elapsed().as_millis(),
                    error = %err
                );
                network_failure(err)
            })?;
        info!(
            event = "upstream_response",
            trace_id = %ctx.trace_id,
            op = OP_GENERATE,
            status = %response.status().as_u16(),
            elapsed_ms = started_at.elapsed().as_millis()
        );
        handle_response(response, ctx).await
    }
}

pub fn network_failure(err: wreq::Error) -> ProxyError {
    if err.is_timeout() {
        ProxyError::UpstreamTimeout
    } else {
        ProxyError::UpstreamUnreachable(err.to_string())
    }
}

pub async fn handle_response(
    response: wreq::Response,
    ctx: &CallContext,
) -> Result<Bytes, ProxyError> {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await.map_err(network_failure)?;

    if !status.is_success() {
        warn!(
            event = "upstream_error",
            trace_id = %ctx.trace_id,
            op = OP_GENERATE,
            status = %status.as_u16(),
            body = %String::from_utf8_lossy(&body)
        );
        return Err(ProxyError::Upstream {
            status,
            headers,
            body,
        });
    }

    Ok(body)
}

fn build_gemini_headers(credential: &Credential) -> Result<HeaderMap, ProxyError> {
    let mut headers = HeaderMap::new();
    let mut api_key =
        HeaderValue::from_str(credential.expose()).map_err(|_| ProxyError::Configuration)?;
    api_key.set_sensitive(true);
    headers.insert(API_KEY_HEADER, api_key);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

fn build_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let mut path = path.trim_start_matches('/');
    if base.ends_with("/v1beta") && (path == "v1beta" || path.starts_with("v1beta/")) {
        path = path.trim_start_matches("v1beta/").trim_start_matches("v1beta");
    }
    format!("{base}/{path}")
}
