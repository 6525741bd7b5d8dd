use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ProxyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Feedback,
    Continue,
    Rephrase,
    Raw,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Feedback => "feedback",
            Mode::Continue => "continue",
            Mode::Rephrase => "rephrase",
            Mode::Raw => "raw",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMode(pub String);

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "feedback" => Ok(Mode::Feedback),
            "continue" => Ok(Mode::Continue),
            "rephrase" => Ok(Mode::Rephrase),
            "raw" => Ok(Mode::Raw),
            _ => Err(UnknownMode(value.to_string())),
        }
    }
}

/// Canonical request every accepted body shape collapses into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    pub text: String,
    pub mode: Mode,
    pub attach_system_prompt: bool,
}

/// Body as sent by any of the clients, canonical and legacy fields side by side.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    text: Option<String>,
    prompt: Option<String>,
    message: Option<String>,
    mode: Option<String>,
    action: Option<String>,
    attach_system_prompt: Option<bool>,
    use_system_prompt: Option<bool>,
    system_prompt: Option<bool>,
}

impl ProxyRequest {
    pub fn from_body(body: &[u8], default_attach_system_prompt: bool) -> Result<Self, ProxyError> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|_| ProxyError::bad_request("Request body must be valid JSON."))?;
        if !value.is_object() {
            return Err(ProxyError::bad_request("Request body must be a JSON object."));
        }
        let wire: WireRequest = serde_json::from_value(value)
            .map_err(|err| ProxyError::bad_request(format!("Invalid request body: {err}")))?;
        wire.normalize(default_attach_system_prompt)
    }
}

impl WireRequest {
    fn normalize(self, default_attach_system_prompt: bool) -> Result<ProxyRequest, ProxyError> {
        let text = self
            .text
            .or(self.prompt)
            .or(self.message)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ProxyError::bad_request("Request text is required."))?;

        let mode = match self.mode.or(self.action) {
            Some(raw) => raw
                .parse::<Mode>()
                .map_err(|_| ProxyError::bad_request("Invalid action type."))?,
            None => Mode::default(),
        };

        let attach_system_prompt = self
            .attach_system_prompt
            .or(self.use_system_prompt)
            .or(self.system_prompt)
            .unwrap_or(default_attach_system_prompt);

        Ok(ProxyRequest {
            text,
            mode,
            attach_system_prompt,
        })
    }
}
