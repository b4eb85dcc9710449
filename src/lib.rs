// Topical: provider-agnostic LLM topic extraction
//
// This is the library root. A content record flows through prompt ->
// governor (rate limit + retry) -> provider adapter -> parser, and the
// extractor facade ties those together.

pub mod config;
pub mod error;
pub mod extractor;
pub mod governor;
pub mod models;
pub mod output;
pub mod parser;
pub mod prompt;
pub mod providers;

pub use error::{ExtractError, Stage, StageError};
pub use extractor::Extractor;
pub use models::{ContentRecord, ExtractionResult, Topic};
