use coach_protocol::gemini::ErrorResponse;
use coach_protocol::gemini::generate_content::{GenerateContentResponse, UsageMetadata};
use serde::{Deserialize, Serialize};

pub const FALLBACK_TEXT: &str = "I received a response, but couldn't understand it.";
pub const API_ERROR_PREFIX: &str = "Error from API: ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyResponse {
    pub text: String,
}

/// How a success-status upstream body was understood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text {
        text: String,
        usage: Option<UsageMetadata>,
    },
    ApiError(String),
    Unrecognized,
}

impl Reply {
    pub fn interpret(body: &[u8]) -> Self {
        if let Ok(response) = serde_json::from_slice::<GenerateContentResponse>(body) {
            if let Some(text) = response.first_text() {
                return Reply::Text {
                    text: text.to_string(),
                    usage: response.usage_metadata,
                };
            }
        }
        match serde_json::from_slice::<ErrorResponse>(body) {
            Ok(envelope) => Reply::ApiError(envelope.error.message),
            Err(_) => Reply::Unrecognized,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Text { .. } => "text",
            Reply::ApiError(_) => "api_error",
            Reply::Unrecognized => "unrecognized",
        }
    }

    pub fn into_proxy_response(self) -> ProxyResponse {
        let text = match self {
            Reply::Text { text, .. } => text,
            Reply::ApiError(message) => format!("{API_ERROR_PREFIX}{message}"),
            Reply::Unrecognized => FALLBACK_TEXT.to_string(),
        };
        ProxyResponse { text }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_candidate_text() {
        let body = br#"{"candidates":[{"content":{"parts":[{"text":"Hello"},{"text":"ignored"}]}},{"content":{"parts":[{"text":"second"}]}}]}"#;
        let reply = Reply::interpret(body);
        assert_eq!(reply.kind(), "text");
        assert_eq!(reply.into_proxy_response().text, "Hello");
    }

    #[test]
    fn test_usage_is_kept() {
        let body = br#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hi"}]},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":3,"candidatesTokenCount":1,"totalTokenCount":4}}"#;
        match Reply::interpret(body) {
            Reply::Text { usage, .. } => assert_eq!(usage.unwrap().total_token_count, Some(4)),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn test_missing_candidates_falls_back() {
        for body in [
            &br#"{}"#[..],
            br#"{"candidates":[]}"#,
            br#"{"candidates":[{"finishReason":"SAFETY"}]}"#,
            br#"{"candidates":[{"content":{"parts":[]}}]}"#,
            br#"{"candidates":"nope"}"#,
            b"<html>oops</html>",
        ] {
            assert_eq!(Reply::interpret(body), Reply::Unrecognized);
            assert_eq!(Reply::Unrecognized.into_proxy_response().text, FALLBACK_TEXT);
        }
    }

    #[test]
    fn test_error_object_is_prefixed() {
        let body = br#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        let reply = Reply::interpret(body);
        assert_eq!(reply, Reply::ApiError("API key not valid".to_string()));
        assert_eq!(reply.into_proxy_response().text, "Error from API: API key not valid");
    }
}
