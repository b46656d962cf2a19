//! Intent and parameter extraction via the language capability.
//!
//! The extractor owns prompt construction and response-shape validation.
//! The provider's reply is treated as an untrusted payload: JSON is pulled
//! out of markdown fences or surrounding prose, fields are picked with
//! case fallbacks, unknown intent labels map to `Unknown` and confidence
//! is clamped into [0,1] (unparsable values count as 0).

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::KnownDomainIndex;
use crate::errors::EngineError;
use crate::llm::LlmProvider;
use crate::types::{ExtractedCandidate, QueryIntent, Turn};

/// Number of prior turns included in the prompt so elliptical follow-ups
/// ("what about item 5?") can inherit unset fields.
pub const CONTEXT_TURNS: usize = 3;

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").unwrap());

pub struct Extractor {
    provider: Arc<dyn LlmProvider>,
}

impl Extractor {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Classify a raw utterance and extract candidate parameters.
    ///
    /// Fails only when the capability is unreachable or its reply cannot
    /// be decoded at all; partial or low-quality extractions are returned
    /// as candidates and left to the validator.
    pub async fn extract(
        &self,
        raw_text: &str,
        context_turns: &[Turn],
        domain: &KnownDomainIndex,
        today: chrono::NaiveDate,
    ) -> Result<ExtractedCandidate, EngineError> {
        let system = self.system_prompt(domain, today);
        let user = render_user_prompt(raw_text, context_turns);
        let reply = self.provider.complete(&system, &user).await?;
        let candidate = decode_candidate(&reply)?;
        tracing::debug!(
            intent = %candidate.intent,
            item = ?candidate.item_id_raw,
            date = ?candidate.date_expression_raw,
            confidence = candidate.confidence,
            "extracted candidate"
        );
        Ok(candidate)
    }

    /// Re-run extraction on a clarification answer, scoped to the fields
    /// named in `missing`. The reply is merged with previously accepted
    /// fields by the clarification manager, not here.
    pub async fn extract_clarification(
        &self,
        follow_up: &str,
        missing: &[&str],
        domain: &KnownDomainIndex,
        today: chrono::NaiveDate,
    ) -> Result<ExtractedCandidate, EngineError> {
        let system = format!(
            "{}\n\nThe user is answering a clarification question. Only the following \
             field(s) are still needed: {}. Extract just those from the answer; leave \
             every other field null and keep the intent null unless the user clearly \
             restates a whole new request.",
            self.system_prompt(domain, today),
            missing.join(", ")
        );
        let reply = self.provider.complete(&system, follow_up).await?;
        decode_candidate(&reply)
    }

    fn system_prompt(&self, domain: &KnownDomainIndex, today: chrono::NaiveDate) -> String {
        format!(
            "You are a parameter extraction assistant for a sales prediction and \
             analytics system.\n\
             \n\
             Available item IDs: {items}\n\
             Available date range: {min} to {max}\n\
             Current date: {today}\n\
             \n\
             Classify the query as one of these intents:\n\
             - \"predict\": predict sales for a specific item and date\n\
             - \"historical\": look up historical sales records\n\
             - \"top_performer\": find the most sold item in a period\n\
             - \"summary\": sales summary for an item over a period\n\
             - \"help\": the user asks what the assistant can do\n\
             - \"unknown\": anything else\n\
             \n\
             Return ONLY a JSON object:\n\
             {{\n\
               \"intent\": \"<predict|historical|top_performer|summary|help|unknown>\",\n\
               \"item_id\": \"<item id as stated, or null>\",\n\
               \"date_expression\": \"<the date or period exactly as the user phrased it, or null>\",\n\
               \"confidence\": <float between 0 and 1>\n\
             }}\n\
             \n\
             Do not resolve or reformat dates; copy the user's wording \
             (\"tomorrow\", \"whole may\", \"4-5-2024\") into date_expression verbatim.\n\
             When the query is a follow-up, fill only the fields the user actually \
             mentions and leave the rest null.\n\
             \n\
             Examples:\n\
             - \"Predict sales for item 3 on 2024-05-01\" -> {{\"intent\": \"predict\", \
             \"item_id\": \"3\", \"date_expression\": \"2024-05-01\", \"confidence\": 0.95}}\n\
             - \"most sold item in may 2024\" -> {{\"intent\": \"top_performer\", \
             \"item_id\": null, \"date_expression\": \"may 2024\", \"confidence\": 0.9}}\n\
             - \"what about item 5?\" -> {{\"intent\": null, \"item_id\": \"5\", \
             \"date_expression\": null, \"confidence\": 0.8}}",
            items = domain.item_listing(),
            min = domain.min_date,
            max = domain.max_date,
            today = today,
        )
    }
}

/// Render the user message, prefixed with up to [`CONTEXT_TURNS`] prior
/// exchanges so the capability can resolve elliptical follow-ups.
fn render_user_prompt(raw_text: &str, context_turns: &[Turn]) -> String {
    if context_turns.is_empty() {
        return raw_text.to_string();
    }
    let mut buf = String::from("Recent conversation:\n");
    let start = context_turns.len().saturating_sub(CONTEXT_TURNS);
    for turn in &context_turns[start..] {
        buf.push_str(&format!("user: {}\n", turn.raw_text));
        if let Some(query) = &turn.resolved_query {
            buf.push_str(&format!(
                "(resolved: intent={}, item={}, date={})\n",
                query.intent,
                query
                    .item_id
                    .map(|i| i.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                query.span,
            ));
        }
        buf.push_str(&format!("assistant: {}\n", turn.response));
    }
    buf.push_str(&format!("\nCurrent query: {}", raw_text));
    buf
}

/// Extract a JSON object from an LLM reply, tolerating markdown fences
/// and surrounding prose.
pub fn extract_json_from_response(response: &str) -> String {
    if let Some(caps) = FENCED_JSON.captures(response) {
        if let Some(block) = caps.get(1) {
            return block.as_str().to_string();
        }
    }
    if let (Some(start), Some(end)) = (response.find('{'), response.rfind('}')) {
        if start < end {
            return response[start..=end].to_string();
        }
    }
    response.trim().to_string()
}

/// Decode and coerce the capability's reply into a candidate.
pub fn decode_candidate(reply: &str) -> Result<ExtractedCandidate, EngineError> {
    let json_str = extract_json_from_response(reply);
    let value: serde_json::Value = serde_json::from_str(&json_str).map_err(|e| {
        EngineError::Extraction(format!(
            "could not parse JSON from LLM reply: {} (reply preview: {:.120})",
            e, reply
        ))
    })?;

    let intent = match pick(&value, &["intent", "query_type"]) {
        Some(serde_json::Value::String(s)) => QueryIntent::from_label(s),
        Some(serde_json::Value::Null) | None => QueryIntent::Unknown,
        Some(_) => QueryIntent::Unknown,
    };

    let item_id_raw = match pick(&value, &["item_id", "itemId"]) {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    let date_expression_raw = match pick(&value, &["date_expression", "dateExpression", "date"]) {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    };

    let confidence = match pick(&value, &["confidence"]) {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    let confidence = if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };

    Ok(ExtractedCandidate {
        intent,
        item_id_raw,
        date_expression_raw,
        confidence,
    })
}

fn pick<'a>(value: &'a serde_json::Value, keys: &[&str]) -> Option<&'a serde_json::Value> {
    keys.iter().find_map(|k| value.get(k))
}
