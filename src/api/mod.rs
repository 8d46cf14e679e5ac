pub mod health;
pub mod market;
pub mod sessions;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::SecondsFormat;
use chrono_tz::Tz;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::domain::TimePoint;
use crate::orchestration::MarketData;
use crate::session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub market: Arc<MarketData>,
    pub sessions: Arc<SessionStore>,
    /// Zone timestamps are rendered in.
    pub zone: Tz,
}

impl AppState {
    pub fn new(market: Arc<MarketData>, sessions: Arc<SessionStore>, zone: Tz) -> Self {
        Self {
            market,
            sessions,
            zone,
        }
    }

    pub(crate) fn format_time(&self, t: TimePoint) -> String {
        t.with_timezone(&self.zone)
            .to_rfc3339_opts(SecondsFormat::AutoSi, false)
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/summary", get(market::get_summary))
        .route("/v1/series", get(market::get_series))
        .route("/v1/export", get(market::get_export))
        .route("/v1/sessions", post(sessions::create_session))
        .route("/v1/sessions/:id", get(sessions::get_session))
        .route("/v1/sessions/:id/trades", post(sessions::post_trade))
        .layer(cors)
        .with_state(state)
}
