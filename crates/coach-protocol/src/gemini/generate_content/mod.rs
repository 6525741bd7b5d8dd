pub mod request;
pub mod response;
pub mod types;

pub use request::{GenerateContentPath, GenerateContentRequest, GenerateContentRequestBody};
pub use response::{Candidate, GenerateContentResponse, UsageMetadata};
pub use types::*;
