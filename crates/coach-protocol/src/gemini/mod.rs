pub mod error;
pub mod generate_content;

pub use error::{ErrorResponse, ErrorStatus};
