//! Deterministic natural-language rendering of analytic results and
//! user-facing error messages.
//!
//! Templates are fixed per result variant; internal defect and error
//! codes never appear verbatim in the output.

use crate::domain::KnownDomainIndex;
use crate::errors::EngineError;
use crate::types::{AnalyticResult, QuerySpan, ValidatedQuery};

/// Closeness thresholds for the actual-vs-predicted remark.
const CLOSE_PCT: f64 = 0.10;
const BALLPARK_PCT: f64 = 0.25;

/// Render an analytic result for the query that produced it.
pub fn compose(result: &AnalyticResult, query: &ValidatedQuery) -> String {
    match result {
        AnalyticResult::Prediction {
            predicted_qty,
            actual_qty,
        } => compose_prediction(query, *predicted_qty, *actual_qty),
        AnalyticResult::Historical { records } => compose_historical(query, records),
        AnalyticResult::TopPerformer {
            item_id,
            total_qty,
            runners_up,
        } => compose_top_performer(query, *item_id, *total_qty, runners_up),
        AnalyticResult::Summary {
            item_id,
            total_qty,
            avg_qty,
            max_qty,
            min_qty,
            count,
        } => compose_summary(query, *item_id, *total_qty, *avg_qty, *max_qty, *min_qty, *count),
    }
}

fn compose_prediction(query: &ValidatedQuery, predicted: i64, actual: Option<i64>) -> String {
    let item = query.item_id.unwrap_or_default();
    let date = query.span.start();
    match actual {
        Some(actual) => {
            let remark = closeness_remark(predicted, actual);
            format!(
                "For item {} on {}, the model predicts {} units; the actual recorded figure was {} units ({}).",
                item, date, predicted, actual, remark
            )
        }
        None => format!(
            "For item {} on {}, the model predicts {} units. No actual figure is recorded for that day.",
            item, date, predicted
        ),
    }
}

fn closeness_remark(predicted: i64, actual: i64) -> &'static str {
    if actual == 0 {
        return if predicted == 0 {
            "spot on"
        } else {
            "hard to compare against a zero-sales day"
        };
    }
    let error = (predicted - actual).abs() as f64 / actual.abs() as f64;
    if error <= CLOSE_PCT {
        "pretty close"
    } else if error <= BALLPARK_PCT {
        "in the same ballpark"
    } else {
        "a fair way off"
    }
}

fn compose_historical(query: &ValidatedQuery, records: &[crate::domain::SalesRecord]) -> String {
    let item = query.item_id.unwrap_or_default();
    if records.is_empty() {
        return format!(
            "No sales records found for item {} over {}.",
            item, query.span
        );
    }
    let mut lines = vec![format!(
        "Found {} sales record(s) for item {} over {}:",
        records.len(),
        item,
        query.span
    )];
    for record in records.iter().take(10) {
        lines.push(format!("  {}: {} units", record.date, record.quantity));
    }
    if records.len() > 10 {
        lines.push(format!("  ... and {} more day(s)", records.len() - 10));
    }
    lines.join("\n")
}

fn compose_top_performer(
    query: &ValidatedQuery,
    item_id: u32,
    total_qty: i64,
    runners_up: &[(u32, i64)],
) -> String {
    let mut lines = vec![format!(
        "The most sold item over {} was item {} with {} total units.",
        span_phrase(&query.span),
        item_id,
        total_qty
    )];
    if !runners_up.is_empty() {
        lines.push("Runners-up:".to_string());
        for (rank, (id, total)) in runners_up.iter().enumerate() {
            lines.push(format!("  {}. item {}: {} units", rank + 2, id, total));
        }
    }
    lines.join("\n")
}

fn compose_summary(
    query: &ValidatedQuery,
    item_id: u32,
    total_qty: i64,
    avg_qty: f64,
    max_qty: i64,
    min_qty: i64,
    count: usize,
) -> String {
    if count == 0 {
        return format!(
            "No sales data for item {} over {}.",
            item_id,
            span_phrase(&query.span)
        );
    }
    format!(
        "Sales summary for item {} over {}: {} units in total across {} day(s), \
         averaging {:.1} per day (best day {}, slowest day {}).",
        item_id,
        span_phrase(&query.span),
        total_qty,
        count,
        avg_qty,
        max_qty,
        min_qty
    )
}

fn span_phrase(span: &QuerySpan) -> String {
    match span {
        QuerySpan::Day(d) => format!("{}", d),
        QuerySpan::Range { start, end } if start == end => format!("{}", start),
        QuerySpan::Range { start, end } => format!("{} to {}", start, end),
    }
}

/// Fixed user-facing template for a system error. Raw error details go to
/// the log, never to the user.
pub fn error_message(error: &EngineError) -> String {
    match error {
        EngineError::Extraction(_) => {
            "I'm temporarily unable to process requests. Please try again in a moment.".to_string()
        }
        EngineError::Backend(_) => {
            "The prediction service is unavailable right now. Please try again later.".to_string()
        }
        EngineError::UnresolvedQuery => {
            "I couldn't understand that, even after a few tries. Please rephrase your request \
             with the item id and date, e.g. \"predict sales for item 3 on 2024-05-01\"."
                .to_string()
        }
        EngineError::Config(_) => {
            "The assistant is not configured correctly. Please contact the operator.".to_string()
        }
    }
}

/// Capability overview for the `help` intent.
pub fn help_message(domain: &KnownDomainIndex) -> String {
    format!(
        "I answer questions about the sales data.\n\
         \n\
         Known item ids: {items}\n\
         Historical data covers {min} to {max}.\n\
         \n\
         Things you can ask:\n\
         - Predictions: \"Predict sales for item 3 on 2024-05-01\", \"item 5 tomorrow\"\n\
         - History: \"Show sales for item 2 in May 2024\"\n\
         - Top performers: \"Most sold item in May 2024\"\n\
         - Summaries: \"Sales summary for item 2, whole May\"\n\
         \n\
         Date formats: 2024-05-01, 4-5-2024 (day first), \"tomorrow\", \
         \"next friday\", \"whole May\", \"May 2024\".",
        items = domain.item_listing(),
        min = domain.min_date,
        max = domain.max_date,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QueryIntent;
    use chrono::NaiveDate;

    fn predict_query() -> ValidatedQuery {
        ValidatedQuery {
            intent: QueryIntent::Predict,
            item_id: Some(3),
            span: QuerySpan::Day(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()),
        }
    }

    #[test]
    fn closeness_thresholds_are_fixed() {
        assert_eq!(closeness_remark(105, 100), "pretty close");
        assert_eq!(closeness_remark(110, 100), "pretty close");
        assert_eq!(closeness_remark(120, 100), "in the same ballpark");
        assert_eq!(closeness_remark(150, 100), "a fair way off");
        assert_eq!(closeness_remark(0, 0), "spot on");
    }

    #[test]
    fn prediction_with_actual_mentions_both_values() {
        let text = compose(
            &AnalyticResult::Prediction {
                predicted_qty: 42,
                actual_qty: Some(40),
            },
            &predict_query(),
        );
        assert!(text.contains("42"));
        assert!(text.contains("40"));
        assert!(text.contains("pretty close"));
    }

    #[test]
    fn error_templates_hide_internal_detail() {
        let text = error_message(&EngineError::Extraction(
            "HTTP request failed: connection refused".to_string(),
        ));
        assert!(!text.contains("HTTP"));
        assert!(!text.contains("connection refused"));

        let text = error_message(&EngineError::Backend("oracle panicked".to_string()));
        assert!(!text.contains("oracle"));
    }

    #[test]
    fn one_day_range_reads_as_a_single_date() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(
            span_phrase(&QuerySpan::Range { start: day, end: day }),
            "2024-05-01"
        );
    }
}
