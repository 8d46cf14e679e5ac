use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::engine::{export, filter_range_in, RangeLabel, DEFAULT_RANGE, RANGE_PRESETS};
use crate::error::AppError;
use crate::orchestration::{FeedDiagnostic, Mode};

pub const EXPORT_FILENAME: &str = "wpu_merged.csv";

const NO_DATA_MESSAGE: &str = "No data in the selected range";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    pub mode: Mode,
    pub range_start: Option<String>,
    pub range_end: Option<String>,
    pub samples: usize,
    pub latest_price: Option<f64>,
    pub currencies: Vec<String>,
    pub range_presets: Vec<&'static str>,
    pub diagnostics: Vec<FeedDiagnostic>,
}

pub async fn get_summary(State(state): State<AppState>) -> Json<SummaryResponse> {
    let summary = state.market.summary();
    Json(SummaryResponse {
        mode: summary.mode,
        range_start: summary.range_start.map(|t| state.format_time(t)),
        range_end: summary.range_end.map(|t| state.format_time(t)),
        samples: summary.samples,
        latest_price: summary.latest_price,
        currencies: summary
            .currencies
            .iter()
            .map(|c| c.as_str().to_string())
            .collect(),
        range_presets: RANGE_PRESETS.to_vec(),
        diagnostics: summary.diagnostics,
    })
}

#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    pub range: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesResponse {
    pub range: String,
    pub empty: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub points: Vec<PricePointDto>,
}

#[derive(Debug, Serialize)]
pub struct PricePointDto {
    pub timestamp: String,
    pub price: f64,
}

pub async fn get_series(
    Query(params): Query<SeriesQuery>,
    State(state): State<AppState>,
) -> Json<SeriesResponse> {
    let label = RangeLabel::parse(params.range.as_deref().unwrap_or(DEFAULT_RANGE));
    let window = filter_range_in(state.market.prices(), &label, None, state.zone);

    let points: Vec<PricePointDto> = window
        .iter()
        .map(|p| PricePointDto {
            timestamp: state.format_time(p.time),
            price: p.value,
        })
        .collect();
    let empty = points.is_empty();

    Json(SeriesResponse {
        range: label.to_string(),
        empty,
        message: empty.then_some(NO_DATA_MESSAGE),
        points,
    })
}

pub async fn get_export(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = export::to_csv(state.market.prices(), state.zone)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILENAME),
            ),
        ],
        body,
    ))
}
