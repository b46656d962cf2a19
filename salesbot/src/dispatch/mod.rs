//! Dispatch of validated queries to the analytic operations.
//!
//! Four operations run against the read-only table: Predict (external
//! oracle plus actual-vs-predicted lookup), Historical (record filter),
//! TopPerformer (per-item totals, lowest-id tie-break) and Summary
//! (total/average/extremes/count). The prediction model itself stays
//! behind the [`PredictionOracle`] trait.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::SalesTable;
use crate::errors::EngineError;
use crate::types::{AnalyticResult, QueryIntent, ValidatedQuery};

/// Feature vector handed to the prediction oracle, mirroring the
/// engineered columns of the historical table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionFeatures {
    pub item_id: u32,
    pub day: u32,
    pub month: u32,
    pub year: i32,
    /// Weekday number, Monday = 0.
    pub day_num: u32,
    pub is_weekend: bool,
    pub festival_code: i64,
    pub rolling_3day_avg: f64,
}

impl PredictionFeatures {
    /// Features for an (item, date) pair. Uses the observed feature row
    /// when the table has the day; otherwise derives calendar features
    /// from the date and carries the item's most recent rolling average.
    pub fn derive(table: &SalesTable, item_id: u32, date: NaiveDate) -> Self {
        let (festival_code, rolling_3day_avg) = match table.record_for(item_id, date) {
            Some(r) => (r.festival_code, r.rolling_3day_avg),
            None => (
                0,
                table
                    .latest_before(item_id, date)
                    .map(|r| r.rolling_3day_avg)
                    .unwrap_or(0.0),
            ),
        };
        let day_num = date.weekday().num_days_from_monday();
        Self {
            item_id,
            day: date.day(),
            month: date.month(),
            year: date.year(),
            day_num,
            is_weekend: day_num >= 5,
            festival_code,
            rolling_3day_avg,
        }
    }
}

/// External prediction model seam.
#[async_trait]
pub trait PredictionOracle: Send + Sync {
    async fn predict(
        &self,
        item_id: u32,
        date: NaiveDate,
        features: &PredictionFeatures,
    ) -> Result<f64, EngineError>;
}

/// Stand-in oracle for the CLI: predicts the item's trailing 3-day
/// average. Deterministic; a real deployment plugs the trained model in
/// behind the same trait.
pub struct RollingAverageOracle;

#[async_trait]
impl PredictionOracle for RollingAverageOracle {
    async fn predict(
        &self,
        _item_id: u32,
        _date: NaiveDate,
        features: &PredictionFeatures,
    ) -> Result<f64, EngineError> {
        Ok(features.rolling_3day_avg)
    }
}

/// Fixed-value oracle for tests.
pub struct StubOracle(pub f64);

#[async_trait]
impl PredictionOracle for StubOracle {
    async fn predict(
        &self,
        _item_id: u32,
        _date: NaiveDate,
        _features: &PredictionFeatures,
    ) -> Result<f64, EngineError> {
        Ok(self.0)
    }
}

pub struct Dispatcher {
    table: Arc<SalesTable>,
    oracle: Arc<dyn PredictionOracle>,
}

impl Dispatcher {
    pub fn new(table: Arc<SalesTable>, oracle: Arc<dyn PredictionOracle>) -> Self {
        Self { table, oracle }
    }

    /// Route a validated query to its analytic operation. Uses exactly
    /// the item/span the validator produced; nothing is recomputed here.
    pub async fn dispatch(&self, query: &ValidatedQuery) -> Result<AnalyticResult, EngineError> {
        match query.intent {
            QueryIntent::Predict => self.predict(query).await,
            QueryIntent::Historical => Ok(self.historical(query)),
            QueryIntent::TopPerformer => self.top_performer(query),
            QueryIntent::Summary => self.summary(query),
            QueryIntent::Help | QueryIntent::Unknown => Err(EngineError::Backend(format!(
                "intent {} is not dispatchable",
                query.intent
            ))),
        }
    }

    async fn predict(&self, query: &ValidatedQuery) -> Result<AnalyticResult, EngineError> {
        let item_id = query
            .item_id
            .ok_or_else(|| EngineError::Backend("predict query without item id".into()))?;
        let date = query.span.start();
        let features = PredictionFeatures::derive(&self.table, item_id, date);
        let predicted = self.oracle.predict(item_id, date, &features).await?;
        if !predicted.is_finite() {
            return Err(EngineError::Backend(
                "prediction oracle returned a non-finite value".into(),
            ));
        }
        let actual_qty = self.table.record_for(item_id, date).map(|r| r.quantity);
        Ok(AnalyticResult::Prediction {
            predicted_qty: predicted.round() as i64,
            actual_qty,
        })
    }

    fn historical(&self, query: &ValidatedQuery) -> AnalyticResult {
        let records = match query.item_id {
            Some(item_id) => self.table.records_in_span(item_id, query.span),
            None => Vec::new(),
        };
        // Empty is a valid answer, not an error.
        AnalyticResult::Historical { records }
    }

    fn top_performer(&self, query: &ValidatedQuery) -> Result<AnalyticResult, EngineError> {
        let mut totals: BTreeMap<u32, i64> = BTreeMap::new();
        for record in self.table.records() {
            if query.span.contains(record.date) {
                *totals.entry(record.item_id).or_insert(0) += record.quantity;
            }
        }
        // BTreeMap iteration is ascending by item id, so on equal totals
        // the lowest item id wins.
        let (&item_id, &total_qty) = totals
            .iter()
            .max_by_key(|(id, total)| (**total, std::cmp::Reverse(**id)))
            .ok_or_else(|| {
                EngineError::Backend("no sales records in the requested period".into())
            })?;
        let mut ranked: Vec<(u32, i64)> = totals.iter().map(|(id, t)| (*id, *t)).collect();
        ranked.sort_by_key(|(id, total)| (std::cmp::Reverse(*total), *id));
        let runners_up = ranked.into_iter().skip(1).take(4).collect();
        Ok(AnalyticResult::TopPerformer {
            item_id,
            total_qty,
            runners_up,
        })
    }

    fn summary(&self, query: &ValidatedQuery) -> Result<AnalyticResult, EngineError> {
        let item_id = query
            .item_id
            .ok_or_else(|| EngineError::Backend("summary query without item id".into()))?;
        let records = self.table.records_in_span(item_id, query.span);
        let count = records.len();
        let total_qty: i64 = records.iter().map(|r| r.quantity).sum();
        let max_qty = records.iter().map(|r| r.quantity).max().unwrap_or(0);
        let min_qty = records.iter().map(|r| r.quantity).min().unwrap_or(0);
        let avg_qty = if count == 0 {
            0.0
        } else {
            total_qty as f64 / count as f64
        };
        Ok(AnalyticResult::Summary {
            item_id,
            total_qty,
            avg_qty,
            max_qty,
            min_qty,
            count,
        })
    }
}
