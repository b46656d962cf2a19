// Salesbot
// Conversational query-resolution engine for a sales prediction assistant:
// natural-language questions about a tabular sales dataset are classified,
// validated against the known data domain, clarified over multiple turns
// when needed, dispatched to an analytic operation and rendered back as
// text.

pub mod clarify;
pub mod compose;
pub mod config;
pub mod context;
pub mod dates;
pub mod dispatch;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod extract;
pub mod llm;
pub mod types;
pub mod validate;

pub use config::EngineConfig;
pub use context::ConversationContext;
pub use engine::{ChatEngine, EngineReply, ReplyKind};
pub use errors::EngineError;
pub use types::{
    AnalyticResult, ExtractedCandidate, NormalizedDate, QueryDefect, QueryIntent, QuerySpan,
    RawQuery, Turn, ValidatedQuery,
};
