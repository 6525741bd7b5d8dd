use serde::{Deserialize, Serialize};

use crate::gemini::generate_content::types::Content;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateContentPath {
    pub model: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequestBody {
    pub contents: Vec<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateContentRequest {
    pub path: GenerateContentPath,
    pub body: GenerateContentRequestBody,
}
