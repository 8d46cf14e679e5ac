//! Basket constituent weights with as-of (step function) lookup.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use super::CurrencyCode;

/// Percentage weights that take effect on `effective` and hold until the
/// next row.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightRow {
    pub effective: NaiveDate,
    pub weights: BTreeMap<CurrencyCode, f64>,
}

impl WeightRow {
    pub fn new(effective: NaiveDate, weights: BTreeMap<CurrencyCode, f64>) -> Self {
        Self { effective, weights }
    }

    /// Sum of the row's percentages (nominally 100).
    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }
}

/// Weight rows ordered by effective date, one row per date.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeightTable {
    rows: Vec<WeightRow>,
}

impl WeightTable {
    /// Build from rows in any order; a repeated date keeps the last row given.
    pub fn new(mut rows: Vec<WeightRow>) -> Self {
        rows.sort_by_key(|r| r.effective);
        let mut deduped: Vec<WeightRow> = Vec::with_capacity(rows.len());
        for row in rows {
            match deduped.last_mut() {
                Some(last) if last.effective == row.effective => *last = row,
                _ => deduped.push(row),
            }
        }
        Self { rows: deduped }
    }

    pub fn rows(&self) -> &[WeightRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// The most recent row effective on or before `date`.
    pub fn as_of(&self, date: NaiveDate) -> Option<&WeightRow> {
        let idx = self.rows.partition_point(|r| r.effective <= date);
        idx.checked_sub(1).map(|i| &self.rows[i])
    }

    /// Every currency named by any row.
    pub fn currencies(&self) -> BTreeSet<CurrencyCode> {
        self.rows
            .iter()
            .flat_map(|r| r.weights.keys().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(effective: NaiveDate, pairs: &[(&str, f64)]) -> WeightRow {
        WeightRow::new(
            effective,
            pairs
                .iter()
                .map(|(c, w)| (CurrencyCode::parse(c).unwrap(), *w))
                .collect(),
        )
    }

    #[test]
    fn test_as_of_picks_latest_effective_row() {
        let table = WeightTable::new(vec![
            row(date(2024, 2, 1), &[("USD", 50.0), ("EUR", 50.0)]),
            row(date(2024, 1, 1), &[("USD", 60.0), ("EUR", 40.0)]),
        ]);

        assert!(table.as_of(date(2023, 12, 31)).is_none());
        assert_eq!(table.as_of(date(2024, 1, 1)).unwrap().effective, date(2024, 1, 1));
        assert_eq!(table.as_of(date(2024, 1, 15)).unwrap().effective, date(2024, 1, 1));
        assert_eq!(table.as_of(date(2024, 2, 1)).unwrap().effective, date(2024, 2, 1));
        assert_eq!(table.as_of(date(2030, 1, 1)).unwrap().effective, date(2024, 2, 1));
    }

    #[test]
    fn test_duplicate_dates_keep_last() {
        let table = WeightTable::new(vec![
            row(date(2024, 1, 1), &[("USD", 60.0)]),
            row(date(2024, 1, 1), &[("USD", 70.0)]),
        ]);
        assert_eq!(table.len(), 1);
        let usd = CurrencyCode::parse("USD").unwrap();
        assert_eq!(table.rows()[0].weights[&usd], 70.0);
    }

    #[test]
    fn test_total_and_currencies() {
        let table = WeightTable::new(vec![
            row(date(2024, 1, 1), &[("USD", 60.0), ("EUR", 40.0)]),
            row(date(2024, 2, 1), &[("USD", 50.0), ("JPY", 50.0)]),
        ]);
        assert_eq!(table.rows()[0].total(), 100.0);
        assert_eq!(table.currencies().len(), 3);
    }
}
