//! Builds the upstream `generateContent` payload for each [`Mode`].

use coach_protocol::gemini::generate_content::{
    Content, GenerateContentPath, GenerateContentRequest, GenerateContentRequestBody,
};

use crate::request::{Mode, ProxyRequest};

pub const COACH_SYSTEM_PROMPT: &str = r#"You are an expert AI English Writing Coach. Your goal is to provide comprehensive, constructive feedback to help learners improve their English writing skills. When a user submits a paragraph, you MUST provide the following in your feedback, using markdown for clear structure:

1.  **### Overall Feedback:** Start with a brief, encouraging summary of the user's paragraph.
2.  **### Grammar & Clarity:** Point out specific areas for improvement in grammar, punctuation, and sentence structure.
3.  **### Suggestions for Improvement:** Offer concrete suggestions on how to make the paragraph stronger or more descriptive.
4.  **### Related Vocabulary:** Suggest 3-4 relevant vocabulary words with brief definitions that could enhance the paragraph's topic.
5.  **### Estimated IELTS Band:** Provide an estimated IELTS writing band score for the paragraph (e.g., 5.5-6.0). Add a clear disclaimer that this is an approximation for practice purposes only.
6.  **### Keep it up!** End with a short, positive, and encouraging remark.

Your tone should always be friendly, supportive, and motivational."#;

const CONTINUE_PREFIX: &str = "Continue writing this paragraph in a similar tone and style:";
const REPHRASE_PREFIX: &str = "Rephrase the following paragraph in two different ways, maintaining the original meaning. Label them \"Option 1\" and \"Option 2\":";

pub fn continue_prompt(text: &str) -> String {
    format!("{CONTINUE_PREFIX}\n\n\"{text}\"")
}

pub fn rephrase_prompt(text: &str) -> String {
    format!("{REPHRASE_PREFIX}\n\n\"{text}\"")
}

/// Only `feedback` honours the system-prompt flag; `continue` and `rephrase`
/// carry their own instruction and `raw` never gets one.
pub fn build_body(request: &ProxyRequest) -> GenerateContentRequestBody {
    let (user_text, system_instruction) = match request.mode {
        Mode::Feedback => {
            let instruction = request
                .attach_system_prompt
                .then(|| Content::instruction(COACH_SYSTEM_PROMPT));
            (request.text.clone(), instruction)
        }
        Mode::Continue => (continue_prompt(&request.text), None),
        Mode::Rephrase => (rephrase_prompt(&request.text), None),
        Mode::Raw => (request.text.clone(), None),
    };

    GenerateContentRequestBody {
        contents: vec![Content::user_text(user_text)],
        system_instruction,
    }
}

pub fn build_request(request: &ProxyRequest, model: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        path: GenerateContentPath {
            model: model.to_string(),
        },
        body: build_body(request),
    }
}
