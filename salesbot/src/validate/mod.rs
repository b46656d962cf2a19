//! Confidence-gated validation of extracted candidates.
//!
//! Pure and deterministic: a candidate either becomes a fully-populated
//! [`ValidatedQuery`] or a list of specific [`QueryDefect`]s, evaluated in
//! a fixed order and collected (not short-circuited) so the clarification
//! manager can pick the most relevant question.

use crate::dates::normalize;
use crate::domain::KnownDomainIndex;
use crate::types::{
    ExtractedCandidate, NormalizedDate, QueryDefect, QueryIntent, QuerySpan, ValidatedQuery,
};

/// Validate a candidate against the domain index.
///
/// Rule order: confidence gate, item presence/membership, date
/// presence/resolvability, historical-window check. `Predict` is exempt
/// from the window check since predictions may target future dates.
pub fn validate(
    candidate: &ExtractedCandidate,
    domain: &KnownDomainIndex,
    confidence_threshold: f64,
    reference: chrono::NaiveDate,
) -> Result<ValidatedQuery, Vec<QueryDefect>> {
    let mut defects = Vec::new();

    if candidate.confidence < confidence_threshold {
        defects.push(QueryDefect::LowConfidence(candidate.confidence));
    }
    // An unclassifiable intent can only be fixed by a restatement, which
    // is exactly the low-confidence clarification path.
    if candidate.intent == QueryIntent::Unknown
        && !matches!(defects.first(), Some(QueryDefect::LowConfidence(_)))
    {
        defects.push(QueryDefect::LowConfidence(candidate.confidence));
    }

    let item_id = validate_item(candidate, domain, &mut defects);
    let span = validate_date(candidate, domain, reference, &mut defects);

    match (defects.is_empty(), span) {
        (true, Some(span)) => Ok(ValidatedQuery {
            intent: candidate.intent,
            item_id,
            span,
        }),
        (true, None) => {
            // Intent needs no date (defensively unreachable for the four
            // dispatchable intents, which all require one).
            Err(vec![QueryDefect::MissingDate])
        }
        (false, _) => Err(defects),
    }
}

fn validate_item(
    candidate: &ExtractedCandidate,
    domain: &KnownDomainIndex,
    defects: &mut Vec<QueryDefect>,
) -> Option<u32> {
    if !candidate.intent.requires_item() {
        return None;
    }
    match candidate.item_id_raw.as_deref() {
        None => {
            defects.push(QueryDefect::MissingItemId);
            None
        }
        Some(raw) => match raw.trim().parse::<u32>() {
            Ok(id) if domain.contains_item(id) => Some(id),
            Ok(_) | Err(_) => {
                defects.push(QueryDefect::UnknownItemId(raw.trim().to_string()));
                None
            }
        },
    }
}

fn validate_date(
    candidate: &ExtractedCandidate,
    domain: &KnownDomainIndex,
    reference: chrono::NaiveDate,
    defects: &mut Vec<QueryDefect>,
) -> Option<QuerySpan> {
    if !candidate.intent.requires_date() {
        return None;
    }
    let raw = match candidate.date_expression_raw.as_deref() {
        None => {
            defects.push(QueryDefect::MissingDate);
            return None;
        }
        Some(raw) => raw,
    };

    let span = match normalize(raw, reference) {
        NormalizedDate::Unresolved(reason) => {
            defects.push(QueryDefect::UnresolvedDate(reason));
            return None;
        }
        NormalizedDate::Single(date) => {
            if candidate.intent == QueryIntent::Predict {
                QuerySpan::Day(date)
            } else {
                // Aggregate intents work over ranges; a single day is a
                // one-day range.
                QuerySpan::Range {
                    start: date,
                    end: date,
                }
            }
        }
        NormalizedDate::Range { start, end } => {
            if candidate.intent == QueryIntent::Predict {
                defects.push(QueryDefect::UnresolvedDate(
                    "a prediction needs a single day, not a period".to_string(),
                ));
                return None;
            }
            QuerySpan::Range { start, end }
        }
    };

    if candidate.intent == QueryIntent::Predict {
        return Some(span);
    }

    // Historical intents must overlap the covered window; overlapping
    // ranges are clamped to it, disjoint ones are defects.
    match span {
        QuerySpan::Day(date) => {
            if date < domain.min_date || date > domain.max_date {
                defects.push(QueryDefect::DateOutOfRange {
                    start: date,
                    end: date,
                    min: domain.min_date,
                    max: domain.max_date,
                });
                None
            } else {
                Some(span)
            }
        }
        QuerySpan::Range { start, end } => {
            if end < domain.min_date || start > domain.max_date {
                defects.push(QueryDefect::DateOutOfRange {
                    start,
                    end,
                    min: domain.min_date,
                    max: domain.max_date,
                });
                None
            } else {
                Some(QuerySpan::Range {
                    start: start.max(domain.min_date),
                    end: end.min(domain.max_date),
                })
            }
        }
    }
}
