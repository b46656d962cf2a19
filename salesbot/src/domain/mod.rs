//! In-memory sales dataset and the known-domain index built from it.
//!
//! The table is read-only after startup and may be shared freely across
//! concurrent conversations. Storage mechanics stay at the boundary: the
//! binary deserializes a JSON file into `Vec<SalesRecord>` and hands it
//! over; the engine never touches the filesystem.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::types::QuerySpan;

/// One observed day of sales for one item, with the auxiliary feature
/// columns the prediction oracle consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub item_id: u32,
    pub date: NaiveDate,
    pub quantity: i64,
    /// Encoded festival/occasion flag for the day (0 = none).
    #[serde(default)]
    pub festival_code: i64,
    /// Trailing 3-day average quantity, precomputed upstream.
    #[serde(default)]
    pub rolling_3day_avg: f64,
}

/// Read-only historical sales table.
#[derive(Debug, Clone)]
pub struct SalesTable {
    records: Vec<SalesRecord>,
}

impl SalesTable {
    pub fn new(mut records: Vec<SalesRecord>) -> Self {
        records.sort_by(|a, b| (a.item_id, a.date).cmp(&(b.item_id, b.date)));
        Self { records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[SalesRecord] {
        &self.records
    }

    /// The record for an exact (item, day) pair, if observed.
    pub fn record_for(&self, item_id: u32, date: NaiveDate) -> Option<&SalesRecord> {
        self.records
            .iter()
            .find(|r| r.item_id == item_id && r.date == date)
    }

    /// All records for an item inside a span, in date order.
    pub fn records_in_span(&self, item_id: u32, span: QuerySpan) -> Vec<SalesRecord> {
        self.records
            .iter()
            .filter(|r| r.item_id == item_id && span.contains(r.date))
            .cloned()
            .collect()
    }

    /// The most recent record for an item strictly before `date`.
    pub fn latest_before(&self, item_id: u32, date: NaiveDate) -> Option<&SalesRecord> {
        self.records
            .iter()
            .filter(|r| r.item_id == item_id && r.date < date)
            .max_by_key(|r| r.date)
    }
}

/// Authoritative set of valid item identifiers and the covered date
/// window. Built once at startup; read-only thereafter.
#[derive(Debug, Clone)]
pub struct KnownDomainIndex {
    pub item_ids: BTreeSet<u32>,
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
}

impl KnownDomainIndex {
    pub fn build(table: &SalesTable) -> Result<Self, EngineError> {
        if table.is_empty() {
            return Err(EngineError::Config(
                "cannot build domain index from an empty dataset".to_string(),
            ));
        }
        let item_ids: BTreeSet<u32> = table.records().iter().map(|r| r.item_id).collect();
        let min_date = table.records().iter().map(|r| r.date).min().unwrap_or_default();
        let max_date = table.records().iter().map(|r| r.date).max().unwrap_or_default();
        tracing::info!(
            items = item_ids.len(),
            %min_date,
            %max_date,
            "built known-domain index"
        );
        Ok(Self {
            item_ids,
            min_date,
            max_date,
        })
    }

    pub fn contains_item(&self, item_id: u32) -> bool {
        self.item_ids.contains(&item_id)
    }

    /// Short, human-readable listing of known item ids for clarification
    /// questions and the help message (first ten, then an ellipsis).
    pub fn item_listing(&self) -> String {
        let ids: Vec<String> = self.item_ids.iter().take(10).map(|i| i.to_string()).collect();
        if self.item_ids.len() > 10 {
            format!("{}, ...", ids.join(", "))
        } else {
            ids.join(", ")
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::types::QuerySpan;

    #[test]
    fn index_covers_items_and_window() {
        let table = small_table();
        let index = KnownDomainIndex::build(&table).unwrap();
        assert!(index.contains_item(2));
        assert!(index.contains_item(3));
        assert!(!index.contains_item(9));
        assert_eq!(index.min_date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(index.max_date, NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
    }

    #[test]
    fn empty_table_is_a_config_error() {
        let table = SalesTable::new(vec![]);
        assert!(KnownDomainIndex::build(&table).is_err());
    }

    #[test]
    fn span_filtering_is_inclusive() {
        let table = small_table();
        let span = QuerySpan::Range {
            start: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
        };
        let records = table.records_in_span(2, span);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.item_id == 2));
    }

    #[test]
    fn latest_before_picks_most_recent_prior_day() {
        let table = small_table();
        let prior = table
            .latest_before(2, NaiveDate::from_ymd_opt(2024, 5, 3).unwrap())
            .unwrap();
        assert_eq!(prior.date, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
    }
}
