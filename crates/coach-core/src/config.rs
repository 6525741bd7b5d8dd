use std::fmt;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-05-20";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Server-held upstream API key. Never printed, never serialized.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for a missing or blank key so an empty env var counts as unset.
    pub fn from_optional(value: Option<String>) -> Option<Self> {
        value
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(Self)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub model: String,
    pub base_url: String,
    /// Used when the request body carries none of the system-prompt flags.
    pub default_attach_system_prompt: bool,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub proxy: Option<String>,
    pub max_body_bytes: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_attach_system_prompt: true,
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            proxy: None,
            max_body_bytes: 64 * 1024,
        }
    }
}
