pub mod config;
pub mod core;
pub mod error;
pub mod handler;
pub mod prompt;
pub mod request;
pub mod response;
pub mod upstream;

pub use config::{Credential, DEFAULT_BASE_URL, DEFAULT_MODEL, ProxyConfig};
pub use crate::core::{Core, CoreState};
pub use error::ProxyError;
pub use request::{Mode, ProxyRequest};
pub use response::{ProxyResponse, Reply};
pub use upstream::{CallContext, GeminiUpstream, Upstream};
