//! Engine-level error taxonomy.
//!
//! Domain defects ([`crate::types::QueryDefect`]) are not errors; they are
//! recoverable input states handled by the clarification manager. Only
//! capability, backend and configuration failures cross the engine
//! boundary as `EngineError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The external language capability was unreachable or returned a
    /// reply the extractor could not decode.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// The prediction/analysis collaborator failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// The clarification round limit was exceeded without producing a
    /// validated query.
    #[error("query could not be resolved after clarification")]
    UnresolvedQuery,

    /// Fatal at startup only: missing credential, empty dataset, etc.
    #[error("configuration error: {0}")]
    Config(String),
}
