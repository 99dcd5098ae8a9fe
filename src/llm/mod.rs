pub mod provider;
pub mod providers;
pub mod sse_parser;
pub mod types;

pub use provider::ModelClient;
pub use types::{ChatMessage, ContentPart, ImageUrl, MessageContent};
