//! Core data model for the query-resolution engine.
//!
//! Everything that flows between the extractor, validator, clarification
//! manager, dispatcher and composer lives here: raw input, extracted
//! candidates, normalized dates, validated queries, defects, analytic
//! results and the conversation turn record.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::SalesRecord;

/// Classified purpose of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    Predict,
    Historical,
    TopPerformer,
    Summary,
    Help,
    Unknown,
}

impl QueryIntent {
    /// Map an arbitrary intent string from the language capability onto the
    /// known taxonomy. Anything unrecognized becomes `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "predict" | "prediction" => QueryIntent::Predict,
            "historical" | "analysis" | "history" => QueryIntent::Historical,
            "top_performer" | "most_sold" | "top-performer" => QueryIntent::TopPerformer,
            "summary" => QueryIntent::Summary,
            "help" => QueryIntent::Help,
            _ => QueryIntent::Unknown,
        }
    }

    /// Whether this intent requires an item id to be dispatchable.
    pub fn requires_item(&self) -> bool {
        matches!(
            self,
            QueryIntent::Predict | QueryIntent::Historical | QueryIntent::Summary
        )
    }

    /// Whether this intent requires a date or period.
    pub fn requires_date(&self) -> bool {
        matches!(
            self,
            QueryIntent::Predict
                | QueryIntent::Historical
                | QueryIntent::TopPerformer
                | QueryIntent::Summary
        )
    }
}

impl std::fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QueryIntent::Predict => "predict",
            QueryIntent::Historical => "historical",
            QueryIntent::TopPerformer => "top_performer",
            QueryIntent::Summary => "summary",
            QueryIntent::Help => "help",
            QueryIntent::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// One incoming user utterance. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawQuery {
    pub text: String,
    pub turn_index: usize,
}

/// Output of the extractor: unvalidated parameters plus a confidence score.
///
/// Confidence is always within [0,1] by construction; the extractor clamps
/// out-of-range values and treats unparsable scores as 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedCandidate {
    pub intent: QueryIntent,
    pub item_id_raw: Option<String>,
    pub date_expression_raw: Option<String>,
    pub confidence: f64,
}

/// Result of normalizing a textual date expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizedDate {
    Single(NaiveDate),
    Range { start: NaiveDate, end: NaiveDate },
    Unresolved(String),
}

/// A fully resolved date carried by a validated query. Unlike
/// [`NormalizedDate`] this can never be unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuerySpan {
    Day(NaiveDate),
    Range { start: NaiveDate, end: NaiveDate },
}

impl QuerySpan {
    pub fn start(&self) -> NaiveDate {
        match self {
            QuerySpan::Day(d) => *d,
            QuerySpan::Range { start, .. } => *start,
        }
    }

    pub fn end(&self) -> NaiveDate {
        match self {
            QuerySpan::Day(d) => *d,
            QuerySpan::Range { end, .. } => *end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start() <= date && date <= self.end()
    }
}

impl std::fmt::Display for QuerySpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuerySpan::Day(d) => write!(f, "{}", d),
            QuerySpan::Range { start, end } => write!(f, "{} to {}", start, end),
        }
    }
}

/// A query that passed validation and is ready for dispatch.
///
/// Invariants (enforced by the validator, never constructed elsewhere):
/// the item id is a member of the known-domain index when the intent
/// requires one; the span is a single day for `Predict` and a range for
/// the aggregate intents; dates lie inside the historical window except
/// for `Predict`, which may target future dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedQuery {
    pub intent: QueryIntent,
    pub item_id: Option<u32>,
    pub span: QuerySpan,
}

/// A specific, named reason a candidate failed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryDefect {
    MissingItemId,
    UnknownItemId(String),
    MissingDate,
    UnresolvedDate(String),
    DateOutOfRange {
        start: NaiveDate,
        end: NaiveDate,
        min: NaiveDate,
        max: NaiveDate,
    },
    LowConfidence(f64),
}

impl QueryDefect {
    /// Clarification priority: item defects first, then date defects,
    /// then a full restatement for low confidence.
    pub fn priority(&self) -> u8 {
        match self {
            QueryDefect::MissingItemId | QueryDefect::UnknownItemId(_) => 0,
            QueryDefect::MissingDate
            | QueryDefect::UnresolvedDate(_)
            | QueryDefect::DateOutOfRange { .. } => 1,
            QueryDefect::LowConfidence(_) => 2,
        }
    }
}

/// Structured result of one analytic operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnalyticResult {
    Prediction {
        predicted_qty: i64,
        actual_qty: Option<i64>,
    },
    Historical {
        records: Vec<SalesRecord>,
    },
    TopPerformer {
        item_id: u32,
        total_qty: i64,
        runners_up: Vec<(u32, i64)>,
    },
    Summary {
        item_id: u32,
        total_qty: i64,
        avg_qty: f64,
        max_qty: i64,
        min_qty: i64,
        count: usize,
    },
}

/// One request/response exchange, appended to the conversation context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub raw_text: String,
    pub resolved_intent: Option<QueryIntent>,
    pub resolved_query: Option<ValidatedQuery>,
    pub result: Option<AnalyticResult>,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}
