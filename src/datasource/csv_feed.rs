//! Parsing raw CSV feeds into tidy, zone-aware series.
//!
//! All loaders share the same header handling: the header row is the first
//! row (within `LoadOptions::header_scan_rows`) that names a timestamp
//! column, header cells are trimmed and lose trailing `=` markers, and rows
//! whose timestamp or value cannot be parsed are dropped.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use csv::StringRecord;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::{FeedKind, LoadError, LoadOptions};
use crate::domain::calendar::{local_date, localize, midnight};
use crate::domain::{
    Basket, CurrencyCode, CurrencyRates, Feed, Granularity, PriceSeries, RateSeries, SeriesPoint,
    TimePoint, WeightRow, WeightTable,
};

/// Header names recognized as the timestamp column.
pub const TIMESTAMP_COLUMNS: [&str; 4] = ["date", "datetime", "timestamp", "time"];

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

const NAIVE_DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// One tick from the paired `timestamp, price` layout.
#[derive(Debug, Clone, PartialEq)]
pub struct TickQuote {
    pub time: TimePoint,
    pub currency: CurrencyCode,
    pub price: f64,
}

/// Trimmed header without its trailing `=` markers (`"USD= "` -> `"USD"`).
pub fn normalize_header(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('\u{feff}')
        .trim_end_matches('=')
        .trim()
        .to_string()
}

pub fn is_timestamp_header(header: &str) -> bool {
    let lower = normalize_header(header).to_ascii_lowercase();
    TIMESTAMP_COLUMNS.contains(&lower.as_str())
        || lower.contains("timestamp")
        || lower.contains("datetime")
}

/// Parse a timestamp cell.
///
/// Offset-bearing text is converted to UTC. Naive date-times and bare dates
/// are read as local time in `zone`.
pub fn parse_timestamp(raw: &str, zone: Tz) -> Option<TimePoint> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(t) = DateTime::parse_from_str(raw, fmt) {
            return Some(t.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return localize(naive, zone);
        }
    }
    parse_date(raw).and_then(|d| midnight(d, zone))
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Finite number, or `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

struct RawTable {
    headers: Vec<String>,
    rows: Vec<StringRecord>,
}

impl RawTable {
    fn timestamp_column(&self) -> Option<usize> {
        self.headers.iter().position(|h| is_timestamp_header(h))
    }
}

/// Rows that are not valid UTF-8 are dropped like any other unreadable row.
fn read_records(bytes: &[u8], feed: FeedKind) -> Result<Vec<StringRecord>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let mut records = Vec::new();
    let mut undecodable = 0usize;
    for record in reader.byte_records() {
        let record = record.map_err(|e| LoadError::Csv {
            feed,
            message: e.to_string(),
        })?;
        match StringRecord::from_byte_record(record) {
            Ok(r) => records.push(r),
            Err(_) => undecodable += 1,
        }
    }
    if undecodable > 0 {
        debug!(%feed, dropped = undecodable, "dropped rows with invalid utf-8");
    }
    Ok(records)
}

fn missing_timestamp(feed: FeedKind) -> LoadError {
    LoadError::MissingColumn {
        feed,
        searched: TIMESTAMP_COLUMNS.iter().map(|s| s.to_string()).collect(),
    }
}

/// Split raw bytes into a header row and data rows.
///
/// `Ok(None)` for input with no rows at all.
fn read_table(
    bytes: &[u8],
    feed: FeedKind,
    opts: &LoadOptions,
) -> Result<Option<RawTable>, LoadError> {
    let mut records = read_records(bytes, feed)?;
    if records.iter().all(|r| r.iter().all(str::is_empty)) {
        return Ok(None);
    }

    let scan = opts.header_scan_rows.max(1).min(records.len());
    let header_at = records[..scan]
        .iter()
        .position(|r| r.iter().any(is_timestamp_header))
        .ok_or_else(|| missing_timestamp(feed))?;

    let rows = records.split_off(header_at + 1);
    let headers = records[header_at].iter().map(normalize_header).collect();
    Ok(Some(RawTable { headers, rows }))
}

fn choose_price_column(headers: &[String], ts_col: usize, preferred: &str) -> Option<usize> {
    let preferred = normalize_header(preferred);
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("price"))
        .or_else(|| {
            headers
                .iter()
                .position(|h| !preferred.is_empty() && h.eq_ignore_ascii_case(&preferred))
        })
        .or_else(|| (0..headers.len()).find(|&i| i != ts_col && !headers[i].is_empty()))
}

fn log_dropped(feed: FeedKind, kept: usize, total: usize) {
    if kept < total {
        debug!(%feed, dropped = total - kept, kept, "dropped unparseable rows");
    }
}

/// Single-column feed: one timestamp column plus one price column.
pub fn parse_price_feed(
    bytes: &[u8],
    granularity: Granularity,
    opts: &LoadOptions,
) -> Result<Feed<f64>, LoadError> {
    let feed = FeedKind::from(granularity);
    let Some(table) = read_table(bytes, feed, opts)? else {
        return Ok(Feed::empty(granularity));
    };
    let ts_col = table
        .timestamp_column()
        .ok_or_else(|| missing_timestamp(feed))?;
    let price_col = choose_price_column(&table.headers, ts_col, &opts.preferred_column)
        .ok_or(LoadError::MissingPriceColumn { feed })?;

    let points: Vec<_> = table
        .rows
        .iter()
        .filter_map(|row| {
            let time = parse_timestamp(row.get(ts_col)?, opts.zone)?;
            let price = parse_number(row.get(price_col)?)?;
            Some(SeriesPoint::new(time, price))
        })
        .collect();
    log_dropped(feed, points.len(), table.rows.len());

    Ok(Feed::new(granularity, PriceSeries::from_points(points)))
}

/// Resolve the non-timestamp headers of a wide table to basket currencies.
fn currency_columns(
    headers: &[String],
    ts_col: usize,
    basket: &Basket,
    feed: FeedKind,
) -> Vec<(usize, CurrencyCode)> {
    headers
        .iter()
        .enumerate()
        .filter(|&(i, h)| i != ts_col && !h.is_empty())
        .filter_map(|(i, h)| match basket.admit(h) {
            Some(code) => Some((i, code)),
            None => {
                warn!(%feed, column = %h, "ignoring column outside the basket");
                None
            }
        })
        .collect()
}

/// Wide multi-currency feed: one timestamp column, one column per currency.
///
/// Columns that are not basket currencies are ignored. A row keeps whatever
/// currencies parse; rows with none are dropped.
pub fn parse_rate_feed(
    bytes: &[u8],
    granularity: Granularity,
    basket: &Basket,
    opts: &LoadOptions,
) -> Result<Feed<CurrencyRates>, LoadError> {
    let feed = FeedKind::from(granularity);
    let Some(table) = read_table(bytes, feed, opts)? else {
        return Ok(Feed::empty(granularity));
    };
    let ts_col = table
        .timestamp_column()
        .ok_or_else(|| missing_timestamp(feed))?;
    let columns = currency_columns(&table.headers, ts_col, basket, feed);

    let points: Vec<_> = table
        .rows
        .iter()
        .filter_map(|row| {
            let time = parse_timestamp(row.get(ts_col)?, opts.zone)?;
            let rates: CurrencyRates = columns
                .iter()
                .filter_map(|(i, code)| Some((*code, parse_number(row.get(*i)?)?)))
                .collect();
            (!rates.is_empty()).then(|| SeriesPoint::new(time, rates))
        })
        .collect();
    log_dropped(feed, points.len(), table.rows.len());

    Ok(Feed::new(granularity, RateSeries::from_points(points)))
}

/// Ticks from the paired layout (`timestamp, EUR=, timestamp, JPY=, ...`),
/// sorted by currency then time.
///
/// A pair is any timestamp header followed by a currency header.
pub fn parse_tick_quotes(
    bytes: &[u8],
    basket: &Basket,
    opts: &LoadOptions,
) -> Result<Vec<TickQuote>, LoadError> {
    let feed = FeedKind::Tick;
    let Some(table) = read_table(bytes, feed, opts)? else {
        return Ok(Vec::new());
    };

    let mut pairs = Vec::new();
    let mut i = 0;
    while i + 1 < table.headers.len() {
        if is_timestamp_header(&table.headers[i]) {
            let header = &table.headers[i + 1];
            match basket.admit(header) {
                Some(code) => pairs.push((i, i + 1, code)),
                None => warn!(%feed, column = %header, "ignoring column outside the basket"),
            }
        }
        i += 2;
    }

    let total = table.rows.len() * pairs.len();
    let mut quotes: Vec<TickQuote> = pairs
        .iter()
        .flat_map(|(ts_col, px_col, code)| {
            table.rows.iter().filter_map(move |row| {
                Some(TickQuote {
                    time: parse_timestamp(row.get(*ts_col)?, opts.zone)?,
                    currency: *code,
                    price: parse_number(row.get(*px_col)?)?,
                })
            })
        })
        .collect();
    log_dropped(feed, quotes.len(), total);

    quotes.sort_by(|a, b| (&a.currency, a.time).cmp(&(&b.currency, b.time)));
    Ok(quotes)
}

/// Pivot quotes into a currency-keyed tick feed; a repeated
/// `(currency, time)` keeps the later quote.
pub fn pivot_quotes(quotes: Vec<TickQuote>) -> Feed<CurrencyRates> {
    let mut by_time: BTreeMap<TimePoint, CurrencyRates> = BTreeMap::new();
    for q in quotes {
        by_time.entry(q.time).or_default().insert(q.currency, q.price);
    }
    let points = by_time
        .into_iter()
        .map(|(time, rates)| SeriesPoint::new(time, rates))
        .collect();
    Feed::new(Granularity::Tick, RateSeries::from_points(points))
}

/// Currency-keyed tick feed, in either the paired or the wide layout.
///
/// More than one timestamp header means the paired layout.
pub fn parse_tick_feed(
    bytes: &[u8],
    basket: &Basket,
    opts: &LoadOptions,
) -> Result<Feed<CurrencyRates>, LoadError> {
    let Some(table) = read_table(bytes, FeedKind::Tick, opts)? else {
        return Ok(Feed::empty(Granularity::Tick));
    };
    let timestamp_headers = table
        .headers
        .iter()
        .filter(|h| is_timestamp_header(h))
        .count();

    if timestamp_headers > 1 {
        Ok(pivot_quotes(parse_tick_quotes(bytes, basket, opts)?))
    } else {
        parse_rate_feed(bytes, Granularity::Tick, basket, opts)
    }
}

/// Weight table: first column the effective date, then one percentage
/// column per currency.
pub fn parse_weights(bytes: &[u8], opts: &LoadOptions) -> Result<WeightTable, LoadError> {
    let feed = FeedKind::Weights;
    let records = read_records(bytes, feed)?;
    let scan = opts.header_scan_rows.max(1).min(records.len());
    let Some(header_at) = records[..scan]
        .iter()
        .position(|r| r.get(0).map(is_timestamp_header).unwrap_or(false))
        .or_else(|| records.iter().position(|r| r.iter().any(|c| !c.is_empty())))
    else {
        return Ok(WeightTable::default());
    };

    let mut columns = Vec::new();
    for (i, header) in records[header_at].iter().enumerate().skip(1) {
        let header = normalize_header(header);
        match CurrencyCode::parse(&header) {
            Ok(code) => columns.push((i, code)),
            Err(_) if header.is_empty() => {}
            Err(_) => warn!(%feed, column = %header, "ignoring non-currency column"),
        }
    }

    let data = &records[header_at + 1..];
    let rows: Vec<WeightRow> = data
        .iter()
        .filter_map(|row| {
            let raw_date = row.get(0)?;
            let effective = parse_date(raw_date).or_else(|| {
                parse_timestamp(raw_date, opts.zone).map(|t| local_date(t, opts.zone))
            })?;
            let weights: BTreeMap<_, _> = columns
                .iter()
                .filter_map(|(i, code)| Some((*code, parse_number(row.get(*i)?)?)))
                .collect();
            (!weights.is_empty()).then(|| WeightRow::new(effective, weights))
        })
        .collect();
    log_dropped(feed, rows.len(), data.len());

    Ok(WeightTable::new(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32) -> TimePoint {
        Utc.with_ymd_and_hms(y, m, d, h, mi, 0).unwrap()
    }

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::parse(s).unwrap()
    }

    fn basket(codes: &[&str]) -> Basket {
        Basket::new(codes.iter().map(|c| code(c)))
    }

    #[test]
    fn test_timestamp_formats() {
        let z = Tz::UTC;
        assert_eq!(parse_timestamp("2024-01-02", z), Some(utc(2024, 1, 2, 0, 0)));
        assert_eq!(parse_timestamp("01/02/2024", z), Some(utc(2024, 1, 2, 0, 0)));
        assert_eq!(
            parse_timestamp("2024-01-02 03:04", z),
            Some(utc(2024, 1, 2, 3, 4))
        );
        assert_eq!(
            parse_timestamp("2024-01-02T03:04:00.250", z).map(|t| t.timestamp_subsec_millis()),
            Some(250)
        );
        assert_eq!(
            parse_timestamp("2024-01-02T03:04:00+02:00", z),
            Some(utc(2024, 1, 2, 1, 4))
        );
        assert_eq!(parse_timestamp("not a date", z), None);
        assert_eq!(parse_timestamp("", z), None);
    }

    #[test]
    fn test_naive_timestamps_use_zone() {
        let ny = chrono_tz::America::New_York;
        assert_eq!(
            parse_timestamp("2024-01-02 00:00:00", ny),
            Some(utc(2024, 1, 2, 5, 0))
        );
        // Offsets win over the configured zone.
        assert_eq!(
            parse_timestamp("2024-01-02T00:00:00Z", ny),
            Some(utc(2024, 1, 2, 0, 0))
        );
    }

    #[test]
    fn test_header_normalization() {
        assert_eq!(normalize_header(" USD= "), "USD");
        assert!(is_timestamp_header("Date"));
        assert!(is_timestamp_header("EUR= Timestamp"));
        assert!(!is_timestamp_header("price"));
    }

    #[test]
    fn test_price_feed_prefers_price_column() {
        let csv = b"date,open,price\n2024-01-01,1.0,1.1\n2024-01-02,1.0,1.2\n";
        let feed = parse_price_feed(csv, Granularity::Daily, &LoadOptions::default()).unwrap();
        assert_eq!(feed.granularity, Granularity::Daily);
        let values: Vec<f64> = feed.series.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1.1, 1.2]);
    }

    #[test]
    fn test_price_feed_skips_banner_and_uses_preferred_column() {
        let csv = b"WPU minute export\nTimestamp,EUR=,USD=\n2024-01-01 00:00,0.9,1.1\n2024-01-01 00:01,0.91,1.11\n";
        let feed = parse_price_feed(csv, Granularity::Minute, &LoadOptions::default()).unwrap();
        assert_eq!(feed.series.len(), 2);
        assert_eq!(feed.series.first().unwrap().value, 1.1);
    }

    #[test]
    fn test_invalid_utf8_row_is_dropped() {
        let csv = b"date,price\n2024-01-01,1.0\n2024-01-02,\xff\xfe\n2024-01-03,1.5\n";
        let feed = parse_price_feed(csv, Granularity::Daily, &LoadOptions::default()).unwrap();
        let points: Vec<_> = feed.series.iter().map(|p| (p.time, p.value)).collect();
        assert_eq!(
            points,
            vec![(utc(2024, 1, 1, 0, 0), 1.0), (utc(2024, 1, 3, 0, 0), 1.5)]
        );
    }

    #[test]
    fn test_price_feed_falls_back_to_first_column() {
        let csv = b"time,EUR\n2024-01-01 00:00,0.9\n";
        let feed = parse_price_feed(csv, Granularity::Tick, &LoadOptions::default()).unwrap();
        assert_eq!(feed.series.first().unwrap().value, 0.9);
    }

    #[test]
    fn test_bad_rows_are_dropped() {
        let csv = b"date,price\n2024-01-01,1.0\ngarbage,2.0\n2024-01-03,n/a\n2024-01-04,inf\n2024-01-05,1.5\n";
        let feed = parse_price_feed(csv, Granularity::Daily, &LoadOptions::default()).unwrap();
        assert_eq!(feed.series.len(), 2);
    }

    #[test]
    fn test_missing_timestamp_column_is_an_error() {
        let csv = b"when,price\nyesterday,1.0\n";
        let err = parse_price_feed(csv, Granularity::Minute, &LoadOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::MissingColumn {
                feed: FeedKind::Minute,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_input_is_empty_feed() {
        let feed = parse_price_feed(b"", Granularity::Daily, &LoadOptions::default()).unwrap();
        assert!(feed.series.is_empty());
    }

    #[test]
    fn test_rate_feed_ignores_columns_outside_basket() {
        let csv = b"date,USD=,EUR=,XAU=,note\n2024-01-01,1.1,0.95,2000,x\n2024-01-02,,0.96,2001,y\n";
        let feed = parse_rate_feed(
            csv,
            Granularity::Daily,
            &basket(&["USD", "EUR"]),
            &LoadOptions::default(),
        )
        .unwrap();

        assert_eq!(feed.series.len(), 2);
        let first = &feed.series.points()[0].value;
        assert_eq!(first.len(), 2);
        assert_eq!(first[&code("USD")], 1.1);
        let second = &feed.series.points()[1].value;
        assert_eq!(second.len(), 1);
        assert_eq!(second[&code("EUR")], 0.96);
    }

    #[test]
    fn test_tick_pairs_are_sorted_and_pivoted() {
        let csv = b"banner\nTimestamp,EUR=,Timestamp,USD=\n\
2024-01-01 00:00:02,0.91,2024-01-01 00:00:01,1.10\n\
2024-01-01 00:00:01,0.90,2024-01-01 00:00:03,1.11\n";
        let b = basket(&["EUR", "USD"]);
        let opts = LoadOptions::default();

        let quotes = parse_tick_quotes(csv, &b, &opts).unwrap();
        let order: Vec<(&str, u32)> = quotes
            .iter()
            .map(|q| (q.currency.as_str(), q.time.timestamp() as u32 % 60))
            .collect();
        assert_eq!(order, vec![("EUR", 1), ("EUR", 2), ("USD", 1), ("USD", 3)]);

        let feed = parse_tick_feed(csv, &b, &opts).unwrap();
        assert_eq!(feed.granularity, Granularity::Tick);
        assert_eq!(feed.series.len(), 3);
        assert_eq!(feed.series.points()[0].value.len(), 2);
    }

    #[test]
    fn test_tick_feed_accepts_wide_layout() {
        let csv = b"timestamp,EUR=\n2024-01-01 00:00:01,0.9\n";
        let feed = parse_tick_feed(csv, &basket(&["EUR"]), &LoadOptions::default()).unwrap();
        assert_eq!(feed.series.len(), 1);
    }

    #[test]
    fn test_weights_parse_us_and_iso_dates() {
        let csv = b"Effective,USD,EUR\n01/01/2024,60,40\n2024-02-01,50,50\nbad,1,1\n";
        let table = parse_weights(csv, &LoadOptions::default()).unwrap();
        assert_eq!(table.len(), 2);
        let row = table
            .as_of(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
            .unwrap();
        assert_eq!(row.weights[&code("USD")], 60.0);
        assert_eq!(
            table.currencies().into_iter().collect::<Vec<_>>(),
            vec![code("EUR"), code("USD")]
        );
    }

    #[test]
    fn test_weights_empty_input() {
        assert!(parse_weights(b"", &LoadOptions::default()).unwrap().is_empty());
    }
}
