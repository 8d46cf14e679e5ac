use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;
use crate::domain::{Amount, Side};
use crate::error::AppError;
use crate::session::{LedgerEntry, Portfolio};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioDto {
    pub session_id: String,
    pub latest_price: Option<String>,
    pub holdings: String,
    pub cash: String,
    pub position_value: Option<String>,
    pub total_equity: Option<String>,
    pub recent_trades: Vec<LedgerEntryDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryDto {
    pub timestamp: String,
    pub side: String,
    pub amount: String,
    pub price: String,
    pub cash_after: String,
    pub holdings_after: String,
}

/// Order size as a JSON number or a decimal string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
pub struct TradeRequest {
    pub side: Side,
    pub amount: AmountInput,
}

#[derive(Debug, Serialize)]
pub struct TradeResponse {
    pub trade: LedgerEntryDto,
    pub portfolio: PortfolioDto,
}

impl AmountInput {
    fn to_amount(&self) -> Result<Amount, AppError> {
        let text = match self {
            AmountInput::Number(n) if n.is_finite() => n.to_string(),
            AmountInput::Number(n) => {
                return Err(AppError::BadRequest(format!("Invalid amount: {}", n)))
            }
            AmountInput::Text(s) => s.clone(),
        };
        text.parse::<Amount>()
            .map_err(|_| AppError::BadRequest(format!("Invalid amount: {}", text)))
    }
}

fn entry_dto(state: &AppState, entry: &LedgerEntry) -> LedgerEntryDto {
    LedgerEntryDto {
        timestamp: state.format_time(entry.timestamp),
        side: entry.side.to_string(),
        amount: entry.amount.to_canonical_string(),
        price: entry.price.to_canonical_string(),
        cash_after: entry.cash_after.to_canonical_string(),
        holdings_after: entry.holdings_after.to_canonical_string(),
    }
}

fn portfolio_dto(state: &AppState, portfolio: &Portfolio) -> PortfolioDto {
    PortfolioDto {
        session_id: portfolio.session_id.to_string(),
        latest_price: portfolio.latest_price.map(|p| p.to_canonical_string()),
        holdings: portfolio.holdings.to_canonical_string(),
        cash: portfolio.cash.to_canonical_string(),
        position_value: portfolio.position_value.map(|v| v.to_canonical_string()),
        total_equity: portfolio.total_equity.map(|v| v.to_canonical_string()),
        recent_trades: portfolio
            .recent_trades
            .iter()
            .map(|e| entry_dto(state, e))
            .collect(),
    }
}

fn parse_session_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest("Invalid session id".into()))
}

fn session_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("session {}", id))
}

pub async fn create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<PortfolioDto>) {
    let session = state.sessions.create().await;
    let portfolio = session.portfolio(state.market.latest_price());
    (StatusCode::CREATED, Json(portfolio_dto(&state, &portfolio)))
}

pub async fn get_session(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PortfolioDto>, AppError> {
    let id = parse_session_id(&id)?;
    let session = state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| session_not_found(id))?;
    let portfolio = session.portfolio(state.market.latest_price());
    Ok(Json(portfolio_dto(&state, &portfolio)))
}

pub async fn post_trade(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<TradeRequest>,
) -> Result<Json<TradeResponse>, AppError> {
    let id = parse_session_id(&id)?;
    let amount = request.amount.to_amount()?;
    let price = state.market.latest_price();

    let entry = state
        .sessions
        .execute(id, request.side, amount, price, Utc::now())
        .await
        .ok_or_else(|| session_not_found(id))??;
    tracing::info!(
        session_id = %id,
        side = %entry.side,
        amount = %entry.amount,
        price = %entry.price,
        "trade executed"
    );

    let session = state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| session_not_found(id))?;
    let portfolio = session.portfolio(price);
    Ok(Json(TradeResponse {
        trade: entry_dto(&state, &entry),
        portfolio: portfolio_dto(&state, &portfolio),
    }))
}
