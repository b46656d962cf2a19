//! Multi-round clarification.
//!
//! When validation yields defects, one follow-up question is asked per
//! round in a fixed priority order (item defects, then date defects, then
//! a full restatement for low confidence). Follow-up answers are merged
//! into the previously accepted fields and re-validated. The loop is an
//! explicit state machine, capped at [`MAX_CLARIFICATION_ROUNDS`] rounds.

use serde::{Deserialize, Serialize};

use crate::domain::KnownDomainIndex;
use crate::types::{ExtractedCandidate, QueryDefect, QueryIntent};

/// Maximum clarification rounds before the turn fails as unresolved.
pub const MAX_CLARIFICATION_ROUNDS: u8 = 3;

/// Partial state held while defects remain outstanding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingClarification {
    /// Fields accepted so far (the candidate minus its defective parts).
    pub accepted: ExtractedCandidate,
    /// Outstanding defects, highest priority first.
    pub defects: Vec<QueryDefect>,
    /// The defect the current question is about.
    pub asking: QueryDefect,
    /// Questions asked so far, this one included.
    pub rounds: u8,
}

/// Per-conversation input state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum ConversationState {
    #[default]
    AcceptingInput,
    AwaitingClarification(PendingClarification),
}

/// Sort defects by clarification priority, then pick the first.
fn most_relevant(defects: &[QueryDefect]) -> QueryDefect {
    let mut sorted = defects.to_vec();
    sorted.sort_by_key(|d| d.priority());
    sorted
        .into_iter()
        .next()
        .unwrap_or(QueryDefect::LowConfidence(0.0))
}

/// Open a clarification round for a fresh set of defects.
pub fn open_pending(
    candidate: ExtractedCandidate,
    mut defects: Vec<QueryDefect>,
) -> PendingClarification {
    defects.sort_by_key(|d| d.priority());
    let asking = defects.first().cloned().unwrap_or(QueryDefect::LowConfidence(0.0));
    PendingClarification {
        accepted: scrub_defective_fields(candidate, &defects),
        defects,
        asking,
        rounds: 1,
    }
}

/// Drop the fields a defect refers to so a later merge does not resurrect
/// a value that already failed validation. Low confidence taints the
/// whole extraction: nothing it produced can be trusted, so both fields
/// are cleared and only the restatement's values survive the merge.
fn scrub_defective_fields(
    mut candidate: ExtractedCandidate,
    defects: &[QueryDefect],
) -> ExtractedCandidate {
    for defect in defects {
        match defect {
            QueryDefect::MissingItemId | QueryDefect::UnknownItemId(_) => {
                candidate.item_id_raw = None;
            }
            QueryDefect::MissingDate
            | QueryDefect::UnresolvedDate(_)
            | QueryDefect::DateOutOfRange { .. } => {
                candidate.date_expression_raw = None;
            }
            QueryDefect::LowConfidence(_) => {
                candidate.item_id_raw = None;
                candidate.date_expression_raw = None;
            }
        }
    }
    candidate
}

/// The follow-up question for the highest-priority outstanding defect.
pub fn next_question(defects: &[QueryDefect], domain: &KnownDomainIndex) -> String {
    match most_relevant(defects) {
        QueryDefect::MissingItemId => format!(
            "Which item would you like me to look at? Known item ids: {}.",
            domain.item_listing()
        ),
        QueryDefect::UnknownItemId(raw) => format!(
            "I don't have an item \"{}\" in the data. Known item ids: {}. Which one did you mean?",
            raw,
            domain.item_listing()
        ),
        QueryDefect::MissingDate => {
            "For which date or period? You can say things like 2024-05-01, \"tomorrow\" or \"whole May\"."
                .to_string()
        }
        QueryDefect::UnresolvedDate(_) => {
            "I couldn't work out that date. Could you give it as YYYY-MM-DD, or a phrase like \"tomorrow\" or \"May 2024\"?"
                .to_string()
        }
        QueryDefect::DateOutOfRange { min, max, .. } => format!(
            "My historical data only covers {} to {}. Which date inside that window should I use?",
            min, max
        ),
        QueryDefect::LowConfidence(_) => {
            "I'm not sure I understood that. Could you rephrase the whole request, including the item and date?"
                .to_string()
        }
    }
}

/// Field names still outstanding, for the scoped re-extraction prompt.
pub fn missing_fields(defects: &[QueryDefect]) -> Vec<&'static str> {
    let mut fields = Vec::new();
    for defect in defects {
        let field = match defect {
            QueryDefect::MissingItemId | QueryDefect::UnknownItemId(_) => "item_id",
            QueryDefect::MissingDate
            | QueryDefect::UnresolvedDate(_)
            | QueryDefect::DateOutOfRange { .. } => "date_expression",
            QueryDefect::LowConfidence(_) => continue,
        };
        if !fields.contains(&field) {
            fields.push(field);
        }
    }
    if fields.is_empty() {
        // A pure low-confidence round re-asks for everything.
        fields.push("item_id");
        fields.push("date_expression");
    }
    fields
}

/// Merge a follow-up extraction into the accepted fields, producing a new
/// candidate for re-validation. Previously accepted fields win; the
/// follow-up only fills the gaps (or replaces the intent when the user
/// clearly restated the whole request).
pub fn merge(
    pending: &PendingClarification,
    follow_up: ExtractedCandidate,
) -> ExtractedCandidate {
    let accepted = &pending.accepted;
    // A complete restatement (classified intent plus every field that
    // intent needs) supersedes whatever was accepted before.
    if follow_up.intent != QueryIntent::Unknown
        && follow_up.date_expression_raw.is_some()
        && (follow_up.item_id_raw.is_some() || !follow_up.intent.requires_item())
    {
        return follow_up;
    }
    let intent = if accepted.intent == QueryIntent::Unknown {
        follow_up.intent
    } else if follow_up.intent != QueryIntent::Unknown && follow_up.intent != accepted.intent {
        // Full restatement with a different intent wins.
        follow_up.intent
    } else {
        accepted.intent
    };
    ExtractedCandidate {
        intent,
        item_id_raw: accepted
            .item_id_raw
            .clone()
            .or(follow_up.item_id_raw),
        date_expression_raw: accepted
            .date_expression_raw
            .clone()
            .or(follow_up.date_expression_raw),
        confidence: accepted.confidence.max(follow_up.confidence),
    }
}
