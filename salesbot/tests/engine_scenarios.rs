//! End-to-end engine scenarios over a scripted stub provider and a fixed
//! oracle, covering the full extract → validate → clarify → dispatch →
//! compose loop.

use std::sync::Arc;

use chrono::NaiveDate;

use salesbot::dispatch::StubOracle;
use salesbot::domain::{SalesRecord, SalesTable};
use salesbot::llm::StubLlmProvider;
use salesbot::{
    ChatEngine, ConversationContext, EngineError, QueryIntent, QuerySpan, ReplyKind,
};

fn record(item_id: u32, y: i32, m: u32, d: u32, qty: i64) -> SalesRecord {
    SalesRecord {
        item_id,
        date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
        quantity: qty,
        festival_code: 0,
        rolling_3day_avg: qty as f64,
    }
}

/// Items {2, 3}, window 2023-01-01 to 2025-01-01.
fn table() -> Arc<SalesTable> {
    Arc::new(SalesTable::new(vec![
        record(2, 2023, 1, 1, 5),
        record(2, 2024, 5, 1, 10),
        record(2, 2024, 5, 2, 12),
        record(3, 2024, 5, 1, 30),
        record(3, 2024, 5, 2, 28),
        record(3, 2025, 1, 1, 7),
    ]))
}

fn engine_with(replies: Vec<&str>, prediction: f64) -> ChatEngine {
    let provider = Arc::new(StubLlmProvider::new(
        replies.into_iter().map(String::from).collect(),
    ));
    ChatEngine::new(provider, table(), Arc::new(StubOracle(prediction)), 0.5)
        .unwrap()
        .with_reference_date(NaiveDate::from_ymd_opt(2024, 5, 15).unwrap())
}

#[tokio::test]
async fn valid_predict_query_resolves_in_one_turn() {
    let engine = engine_with(
        vec![
            r#"{"intent": "predict", "item_id": "3", "date_expression": "2024-05-01", "confidence": 0.9}"#,
        ],
        31.0,
    );
    let mut ctx = ConversationContext::new();

    let reply = engine
        .handle_turn(&mut ctx, "Predict sales for item 3 on 2024-05-01")
        .await
        .unwrap();

    assert_eq!(reply.kind, ReplyKind::Answer);
    assert!(reply.text.contains("31"));
    assert!(reply.text.contains("30")); // actual figure attached
    assert!(reply.text.contains("pretty close"));

    let turn = ctx.turns().last().unwrap();
    assert_eq!(turn.resolved_intent, Some(QueryIntent::Predict));
    let query = turn.resolved_query.as_ref().unwrap();
    assert_eq!(query.item_id, Some(3));
    assert_eq!(
        query.span,
        QuerySpan::Day(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
    );
}

#[tokio::test]
async fn unknown_item_triggers_clarification_then_converges() {
    let engine = engine_with(
        vec![
            r#"{"intent": "predict", "item_id": "9", "date_expression": "tomorrow", "confidence": 0.9}"#,
            r#"{"intent": null, "item_id": "3", "date_expression": null, "confidence": 0.9}"#,
        ],
        18.0,
    );
    let mut ctx = ConversationContext::new();

    let reply = engine.handle_turn(&mut ctx, "item 9 tomorrow").await.unwrap();
    assert_eq!(reply.kind, ReplyKind::Clarification);
    // The question names the unknown value and the valid ids.
    assert!(reply.text.contains("\"9\""));
    assert!(reply.text.contains("2, 3"));
    assert!(ctx.awaiting_clarification());

    let reply = engine.handle_turn(&mut ctx, "I meant item 3").await.unwrap();
    assert_eq!(reply.kind, ReplyKind::Answer);
    assert!(!ctx.awaiting_clarification());

    // Accepted date survived the merge: tomorrow relative to 2024-05-15.
    let turn = ctx.turns().last().unwrap();
    let query = turn.resolved_query.as_ref().unwrap();
    assert_eq!(query.item_id, Some(3));
    assert_eq!(
        query.span,
        QuerySpan::Day(NaiveDate::from_ymd_opt(2024, 5, 16).unwrap())
    );
}

#[tokio::test]
async fn restatement_after_low_confidence_discards_stale_fields() {
    let engine = engine_with(
        vec![
            r#"{"intent": "predict", "item_id": "2", "date_expression": "tomorrow", "confidence": 0.3}"#,
            r#"{"intent": "predict", "item_id": "3", "date_expression": "2024-05-01", "confidence": 0.9}"#,
        ],
        31.0,
    );
    let mut ctx = ConversationContext::new();

    let reply = engine.handle_turn(&mut ctx, "uh item 2 maybe?").await.unwrap();
    assert_eq!(reply.kind, ReplyKind::Clarification);
    assert!(reply.text.contains("rephrase"));

    let reply = engine
        .handle_turn(&mut ctx, "predict sales for item 3 on 2024-05-01")
        .await
        .unwrap();
    assert_eq!(reply.kind, ReplyKind::Answer);

    // The restated parameters win; nothing from the distrusted first
    // extraction leaks into the answered query.
    let query = ctx.turns().last().unwrap().resolved_query.as_ref().unwrap();
    assert_eq!(query.item_id, Some(3));
    assert_eq!(
        query.span,
        QuerySpan::Day(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
    );
}

#[tokio::test]
async fn top_performer_needs_no_item_id() {
    let engine = engine_with(
        vec![
            r#"{"intent": "top_performer", "item_id": null, "date_expression": "may 2024", "confidence": 0.9}"#,
        ],
        0.0,
    );
    let mut ctx = ConversationContext::new();

    let reply = engine
        .handle_turn(&mut ctx, "most sold item in May 2024")
        .await
        .unwrap();

    assert_eq!(reply.kind, ReplyKind::Answer);
    // Item 3 sold 58 units in May 2024, item 2 sold 22.
    assert!(reply.text.contains("item 3"));
    assert!(reply.text.contains("58"));

    let query = ctx.turns().last().unwrap().resolved_query.as_ref().unwrap();
    assert_eq!(query.intent, QueryIntent::TopPerformer);
    assert_eq!(query.item_id, None);
    assert_eq!(
        query.span,
        QuerySpan::Range {
            start: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
        }
    );
}

#[tokio::test]
async fn three_failed_rounds_abandon_the_turn() {
    let useless = r#"{"intent": null, "item_id": null, "date_expression": null, "confidence": 0.0}"#;
    let engine = engine_with(
        vec![
            r#"{"intent": "predict", "item_id": null, "date_expression": null, "confidence": 0.9}"#,
            useless,
            useless,
            useless,
        ],
        0.0,
    );
    let mut ctx = ConversationContext::new();

    let reply = engine.handle_turn(&mut ctx, "predict sales").await.unwrap();
    assert_eq!(reply.kind, ReplyKind::Clarification);

    for answer in ["hmm", "not sure", "whatever"] {
        let outcome = engine.handle_turn(&mut ctx, answer).await;
        match outcome {
            Ok(reply) => assert_eq!(reply.kind, ReplyKind::Clarification),
            Err(EngineError::UnresolvedQuery) => {
                // Round limit reached: pending state cleared, turn
                // recorded without a resolved intent.
                assert!(!ctx.awaiting_clarification());
                let turn = ctx.turns().last().unwrap();
                assert!(turn.resolved_intent.is_none());
                assert!(turn.response.contains("rephrase"));
                return;
            }
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    panic!("round limit never triggered");
}

#[tokio::test]
async fn help_intent_short_circuits_validation() {
    let engine = engine_with(vec![r#"{"intent": "help", "confidence": 1.0}"#], 0.0);
    let mut ctx = ConversationContext::new();

    let reply = engine.handle_turn(&mut ctx, "what can you do?").await.unwrap();
    assert_eq!(reply.kind, ReplyKind::Help);
    assert!(reply.text.contains("2023-01-01 to 2025-01-01"));
    assert!(ctx.turns().last().unwrap().resolved_intent.is_none());
}

#[tokio::test]
async fn malformed_provider_reply_is_an_extraction_error() {
    let engine = engine_with(vec!["I am not JSON at all."], 0.0);
    let mut ctx = ConversationContext::new();

    let outcome = engine.handle_turn(&mut ctx, "predict item 3 tomorrow").await;
    assert!(matches!(outcome, Err(EngineError::Extraction(_))));
    // The failure still leaves the conversation usable.
    assert!(!ctx.awaiting_clarification());
    assert_eq!(ctx.turns().len(), 1);
}

#[tokio::test]
async fn summary_over_a_period_reports_aggregates() {
    let engine = engine_with(
        vec![
            r#"{"intent": "summary", "item_id": "2", "date_expression": "whole may", "confidence": 0.9}"#,
        ],
        0.0,
    );
    let mut ctx = ConversationContext::new();

    let reply = engine
        .handle_turn(&mut ctx, "sales summary for item 2 whole may")
        .await
        .unwrap();
    assert_eq!(reply.kind, ReplyKind::Answer);
    assert!(reply.text.contains("22 units in total"));
    assert!(reply.text.contains("2 day(s)"));
}
