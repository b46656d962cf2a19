//! Per-conversation state: append-only turn history plus the
//! clarification state machine.
//!
//! One `ConversationContext` per conversation, owned by the caller and
//! passed `&mut` into each engine call. Independent conversations may run
//! concurrently; nothing here is shared between them.

use chrono::Utc;
use uuid::Uuid;

use crate::clarify::ConversationState;
use crate::types::{AnalyticResult, Turn, ValidatedQuery};

#[derive(Debug)]
pub struct ConversationContext {
    pub conversation_id: String,
    turns: Vec<Turn>,
    pub state: ConversationState,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self {
            conversation_id: Uuid::new_v4().to_string(),
            turns: Vec::new(),
            state: ConversationState::AcceptingInput,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Append a completed turn. History is append-only; turns are never
    /// mutated after recording.
    pub fn record_turn(
        &mut self,
        raw_text: &str,
        resolved_query: Option<&ValidatedQuery>,
        result: Option<AnalyticResult>,
        response: &str,
    ) {
        self.turns.push(Turn {
            raw_text: raw_text.to_string(),
            resolved_intent: resolved_query.map(|q| q.intent),
            resolved_query: resolved_query.cloned(),
            result,
            response: response.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn awaiting_clarification(&self) -> bool {
        matches!(self.state, ConversationState::AwaitingClarification(_))
    }
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::new()
    }
}
