use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{any, get};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::config::{Credential, ProxyConfig};
use crate::handler::{gemini_relay_handler, proxy_handler};
use crate::upstream::Upstream;

pub const SERVICE_NAME: &str = "coach-proxy";

pub struct CoreState {
    pub config: ProxyConfig,
    pub credential: Option<Credential>,
    pub upstream: Arc<dyn Upstream>,
}

pub struct Core {
    state: Arc<CoreState>,
}

#[derive(Serialize)]
struct Health {
    ok: bool,
    service: &'static str,
}

impl Core {
    pub fn new(
        config: ProxyConfig,
        credential: Option<Credential>,
        upstream: Arc<dyn Upstream>,
    ) -> Self {
        Self {
            state: Arc::new(CoreState {
                config,
                credential,
                upstream,
            }),
        }
    }

    pub fn router(&self) -> Router {
        let max_body_bytes = self.state.config.max_body_bytes;
        Router::new()
            .route("/api/ai", any(proxy_handler))
            .route("/api/gemini", any(gemini_relay_handler))
            .route("/api/chat", any(proxy_handler))
            .route(
                "/healthz",
                get(|| async {
                    Json(Health {
                        ok: true,
                        service: SERVICE_NAME,
                    })
                }),
            )
            .layer(DefaultBodyLimit::max(max_body_bytes))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }
}
