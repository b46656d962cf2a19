//! Turn orchestration: extract → validate → (clarify | dispatch → compose).
//!
//! One turn fully resolves (to an answer, a clarifying question, or a
//! failure) before the next input is accepted; the conversation context is
//! mutated in place and must not be shared across in-flight turns. The
//! engine itself is stateless and may serve any number of independent
//! conversations concurrently over the shared read-only table and index.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::clarify::{
    self, ConversationState, PendingClarification, MAX_CLARIFICATION_ROUNDS,
};
use crate::compose;
use crate::context::ConversationContext;
use crate::dispatch::{Dispatcher, PredictionOracle};
use crate::domain::{KnownDomainIndex, SalesTable};
use crate::errors::EngineError;
use crate::extract::Extractor;
use crate::llm::LlmProvider;
use crate::types::{QueryIntent, RawQuery};
use crate::validate::validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Answer,
    Clarification,
    Help,
}

#[derive(Debug, Clone)]
pub struct EngineReply {
    pub text: String,
    pub kind: ReplyKind,
}

pub struct ChatEngine {
    extractor: Extractor,
    dispatcher: Dispatcher,
    domain: KnownDomainIndex,
    confidence_threshold: f64,
    /// Fixed reference date for tests; `None` uses today.
    reference_date: Option<NaiveDate>,
}

impl ChatEngine {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        table: Arc<SalesTable>,
        oracle: Arc<dyn PredictionOracle>,
        confidence_threshold: f64,
    ) -> Result<Self, EngineError> {
        let domain = KnownDomainIndex::build(&table)?;
        Ok(Self {
            extractor: Extractor::new(provider),
            dispatcher: Dispatcher::new(table, oracle),
            domain,
            confidence_threshold,
            reference_date: None,
        })
    }

    /// Pin the reference date used for relative expressions. Tests only;
    /// production resolves against the current day.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn domain(&self) -> &KnownDomainIndex {
        &self.domain
    }

    fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Process one user input against a conversation. Errors returned
    /// here are system errors (extraction, backend, unresolved query);
    /// the transport renders them via [`compose::error_message`]. Domain
    /// defects never escape: they become clarifying questions.
    pub async fn handle_turn(
        &self,
        ctx: &mut ConversationContext,
        text: &str,
    ) -> Result<EngineReply, EngineError> {
        let raw = RawQuery {
            text: text.to_string(),
            turn_index: ctx.turns().len(),
        };
        let state = std::mem::take(&mut ctx.state);
        match state {
            ConversationState::AcceptingInput => self.handle_fresh(ctx, &raw).await,
            ConversationState::AwaitingClarification(pending) => {
                self.handle_follow_up(ctx, pending, &raw).await
            }
        }
    }

    async fn handle_fresh(
        &self,
        ctx: &mut ConversationContext,
        raw: &RawQuery,
    ) -> Result<EngineReply, EngineError> {
        let today = self.today();
        let candidate = match self
            .extractor
            .extract(&raw.text, ctx.turns(), &self.domain, today)
            .await
        {
            Ok(candidate) => candidate,
            Err(e) => return self.fail_turn(ctx, raw, e),
        };

        if candidate.intent == QueryIntent::Help {
            let reply = EngineReply {
                text: compose::help_message(&self.domain),
                kind: ReplyKind::Help,
            };
            ctx.record_turn(&raw.text, None, None, &reply.text);
            return Ok(reply);
        }

        match validate(&candidate, &self.domain, self.confidence_threshold, today) {
            Ok(query) => self.answer(ctx, raw, query).await,
            Err(defects) => {
                tracing::debug!(?defects, "validation produced defects, clarifying");
                let pending = clarify::open_pending(candidate, defects);
                self.ask(ctx, raw, pending)
            }
        }
    }

    async fn handle_follow_up(
        &self,
        ctx: &mut ConversationContext,
        pending: PendingClarification,
        raw: &RawQuery,
    ) -> Result<EngineReply, EngineError> {
        let today = self.today();
        let missing = clarify::missing_fields(&pending.defects);
        let follow_up = match self
            .extractor
            .extract_clarification(&raw.text, &missing, &self.domain, today)
            .await
        {
            Ok(candidate) => candidate,
            Err(e) => {
                // The question stays open; the user can answer again.
                ctx.state = ConversationState::AwaitingClarification(pending);
                ctx.record_turn(&raw.text, None, None, &compose::error_message(&e));
                return Err(e);
            }
        };

        let merged = clarify::merge(&pending, follow_up);
        match validate(&merged, &self.domain, self.confidence_threshold, today) {
            Ok(query) => self.answer(ctx, raw, query).await,
            Err(defects) => {
                if pending.rounds >= MAX_CLARIFICATION_ROUNDS {
                    tracing::info!(
                        rounds = pending.rounds,
                        "clarification round limit reached, abandoning turn"
                    );
                    return self.fail_turn(ctx, raw, EngineError::UnresolvedQuery);
                }
                let rounds = pending.rounds + 1;
                let mut next = clarify::open_pending(merged, defects);
                next.rounds = rounds;
                self.ask(ctx, raw, next)
            }
        }
    }

    async fn answer(
        &self,
        ctx: &mut ConversationContext,
        raw: &RawQuery,
        query: crate::types::ValidatedQuery,
    ) -> Result<EngineReply, EngineError> {
        let result = match self.dispatcher.dispatch(&query).await {
            Ok(result) => result,
            Err(e) => return self.fail_turn(ctx, raw, e),
        };
        let reply = EngineReply {
            text: compose::compose(&result, &query),
            kind: ReplyKind::Answer,
        };
        ctx.state = ConversationState::AcceptingInput;
        ctx.record_turn(&raw.text, Some(&query), Some(result), &reply.text);
        Ok(reply)
    }

    fn ask(
        &self,
        ctx: &mut ConversationContext,
        raw: &RawQuery,
        pending: PendingClarification,
    ) -> Result<EngineReply, EngineError> {
        let question = clarify::next_question(&pending.defects, &self.domain);
        ctx.state = ConversationState::AwaitingClarification(pending);
        ctx.record_turn(&raw.text, None, None, &question);
        Ok(EngineReply {
            text: question,
            kind: ReplyKind::Clarification,
        })
    }

    /// Record a failed turn (no resolved intent), clear any pending
    /// state, and surface the system error to the transport.
    fn fail_turn(
        &self,
        ctx: &mut ConversationContext,
        raw: &RawQuery,
        error: EngineError,
    ) -> Result<EngineReply, EngineError> {
        ctx.state = ConversationState::AcceptingInput;
        ctx.record_turn(&raw.text, None, None, &compose::error_message(&error));
        Err(error)
    }
}
