pub mod parser;
pub mod splitter;
pub mod types;

pub use parser::parse_action;
pub use splitter::split_response;
pub use types::{Command, DecodeError, DirectiveKind, DurationArg, ParsedAction, Point, SplitResponse};
