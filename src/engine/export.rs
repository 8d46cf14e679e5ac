//! Delimited-text export of a price series.
//!
//! Format: a `timestamp,price` header, then one row per sample in ascending
//! time order. Timestamps are RFC 3339 with an explicit offset; prices use
//! the shortest text that parses back to the same `f64`.

use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use crate::domain::{PriceSeries, SeriesPoint};

pub const EXPORT_HEADER: [&str; 2] = ["timestamp", "price"];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("write error: {0}")]
    Io(String),
    #[error("row {row}: invalid timestamp {value:?}")]
    Timestamp { row: usize, value: String },
    #[error("row {row}: invalid price {value:?}")]
    Price { row: usize, value: String },
}

/// Render `series` with timestamps shown in `zone`.
pub fn to_csv(series: &PriceSeries, zone: Tz) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_HEADER)?;
    for p in series {
        let stamp = p
            .time
            .with_timezone(&zone)
            .to_rfc3339_opts(SecondsFormat::AutoSi, false);
        writer.write_record([stamp, p.value.to_string()])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.error().to_string()))?;
    String::from_utf8(bytes).map_err(|e| ExportError::Io(e.to_string()))
}

/// Parse text produced by [`to_csv`] back into a series.
pub fn parse_csv(text: &str) -> Result<PriceSeries, ExportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut points = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let row = i + 2;
        let raw_time = record.get(0).unwrap_or_default();
        let raw_price = record.get(1).unwrap_or_default();

        let time = DateTime::parse_from_rfc3339(raw_time)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| ExportError::Timestamp {
                row,
                value: raw_time.to_string(),
            })?;
        let price = raw_price.parse::<f64>().map_err(|_| ExportError::Price {
            row,
            value: raw_price.to_string(),
        })?;
        points.push(SeriesPoint::new(time, price));
    }
    Ok(PriceSeries::from_points(points))
}
