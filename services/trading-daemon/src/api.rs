//! Market data HTTP/WebSocket surface (§6 "External Interfaces"). Every
//! response is wrapped in `{"status": "success"|"error", "data": ...}`;
//! dates are `YYYY-MM-DD`, defaulting to the last 30 days when omitted.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{FromRef, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use tracing::instrument;

use common::market::Interval;
use common::{Symbol, Ts};
use distribution::{handle_upgrade, WsState};

use crate::state::Runtime;

const NANOS_PER_SEC: u64 = 1_000_000_000;
const DEFAULT_RANGE_DAYS: i64 = 30;
const DEFAULT_INTERVAL: &str = "1d";

/// Combined axum state: the daemon [`Runtime`] plus the narrower
/// [`WsState`] the distribution crate's upgrade handler expects.
#[derive(Clone)]
struct AppState {
    runtime: Runtime,
    ws: WsState,
}

impl FromRef<AppState> for Runtime {
    fn from_ref(state: &AppState) -> Self {
        state.runtime.clone()
    }
}

impl FromRef<AppState> for WsState {
    fn from_ref(state: &AppState) -> Self {
        state.ws.clone()
    }
}

/// Builds the axum router for every route this daemon exposes, wired to
/// `runtime`.
pub fn router(runtime: Runtime) -> Router {
    let ws = WsState { registry: Arc::clone(&runtime.connections) };
    Router::new()
        .route("/api/v1/market-data/symbols", get(list_symbols))
        .route("/api/v1/market-data/quote/:symbol", get(get_quote))
        .route("/api/v1/market-data/quotes", get(get_quotes))
        .route("/api/v1/market-data/historical/:symbol", get(get_historical))
        .route("/api/v1/market-data/indicators/:indicator/:symbol", get(get_indicator))
        .route("/ws/market-data/stream", get(handle_upgrade))
        .with_state(AppState { runtime, ws })
}

struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

fn ok<T: Serialize>(data: T) -> Response {
    Json(json!({ "status": "success", "data": data })).into_response()
}

fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError(StatusCode::BAD_REQUEST, message.into())
}

fn upstream_error(message: impl std::fmt::Display) -> ApiError {
    ApiError(StatusCode::BAD_GATEWAY, message.to_string())
}

fn parse_symbol(raw: &str) -> Result<Symbol, ApiError> {
    raw.parse::<u32>().map(Symbol).map_err(|_| bad_request(format!("invalid symbol id: {raw}")))
}

fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| bad_request(format!("invalid date (want YYYY-MM-DD): {raw}")))
}

fn date_range(params: &HashMap<String, String>) -> Result<(Ts, Ts), ApiError> {
    let today = chrono::Utc::now().date_naive();
    let to = match params.get("to") {
        Some(raw) => parse_date(raw)?,
        None => today,
    };
    let from = match params.get("from") {
        Some(raw) => parse_date(raw)?,
        None => to - chrono::Duration::days(DEFAULT_RANGE_DAYS),
    };
    Ok((naive_date_to_ts(from), naive_date_to_ts(to)))
}

fn naive_date_to_ts(date: NaiveDate) -> Ts {
    let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    let secs = midnight.and_utc().timestamp().max(0) as u64;
    Ts::from_nanos(secs * NANOS_PER_SEC)
}

fn parse_interval(params: &HashMap<String, String>) -> Result<Interval, ApiError> {
    let raw = params.get("interval").map(String::as_str).unwrap_or(DEFAULT_INTERVAL);
    market_data_store::parse_interval(raw).ok_or_else(|| bad_request(format!("unknown interval: {raw}")))
}

#[instrument(skip(runtime))]
async fn list_symbols(State(runtime): State<Runtime>) -> Response {
    let symbols: Vec<u32> = (1..=runtime.symbol_count).collect();
    ok(symbols)
}

#[instrument(skip(runtime))]
async fn get_quote(State(runtime): State<Runtime>, Path(raw_symbol): Path<String>) -> Result<Response, ApiError> {
    let symbol = parse_symbol(&raw_symbol)?;
    if let Some(cached) = runtime.distributor.cache().get(&symbol) {
        return Ok(ok(cached));
    }
    let quotes = runtime.sources.get_quotes(&[symbol]).await.map_err(upstream_error)?;
    let quote = quotes.into_iter().next().ok_or_else(|| bad_request(format!("no quote available for {symbol}")))?;
    Ok(ok(quote))
}

#[derive(serde::Deserialize)]
struct SymbolsQuery {
    symbols: Option<String>,
}

#[instrument(skip(runtime))]
async fn get_quotes(State(runtime): State<Runtime>, Query(query): Query<SymbolsQuery>) -> Result<Response, ApiError> {
    let raw = query.symbols.ok_or_else(|| bad_request("missing symbols query parameter"))?;
    let mut symbols = Vec::new();
    for part in raw.split(',') {
        symbols.push(parse_symbol(part.trim())?);
    }

    let mut quotes = Vec::with_capacity(symbols.len());
    let mut missing = Vec::new();
    for symbol in symbols {
        match runtime.distributor.cache().get(&symbol) {
            Some(cached) => quotes.push(cached),
            None => missing.push(symbol),
        }
    }
    if !missing.is_empty() {
        let fetched = runtime.sources.get_quotes(&missing).await.map_err(upstream_error)?;
        quotes.extend(fetched);
    }
    Ok(ok(quotes))
}

#[instrument(skip(runtime))]
async fn get_historical(
    State(runtime): State<Runtime>,
    Path(raw_symbol): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let symbol = parse_symbol(&raw_symbol)?;
    let interval = parse_interval(&params)?;
    let (from, to) = date_range(&params)?;
    let bars = runtime.store.bars_range(symbol, interval, from, to).map_err(|err| {
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, format!("historical store error: {err}"))
    })?;
    Ok(ok(bars))
}

#[instrument(skip(runtime))]
async fn get_indicator(
    State(runtime): State<Runtime>,
    Path((indicator, raw_symbol)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let symbol = parse_symbol(&raw_symbol)?;
    // `interval` is accepted (and validated) for parity with the
    // historical endpoint, but indicator values are stored pre-computed
    // by (symbol, indicator, timestamp); this crate doesn't itself
    // compute indicators from bars at a chosen interval.
    let _interval = parse_interval(&params)?;
    let (from, to) = date_range(&params)?;
    let values = runtime.store.indicator_range(symbol, &indicator, from, to).map_err(|err| {
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, format!("historical store error: {err}"))
    })?;
    Ok(ok(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_symbol_accepts_numeric_ids_and_rejects_the_rest() {
        assert_eq!(parse_symbol("42").unwrap(), Symbol(42));
        assert!(parse_symbol("AAPL").is_err());
    }

    #[test]
    fn parse_interval_defaults_to_one_day() {
        let interval = parse_interval(&HashMap::new()).unwrap();
        assert_eq!(interval, Interval::OneDay);
    }

    #[test]
    fn parse_interval_rejects_unknown_values() {
        let mut params = HashMap::new();
        params.insert("interval".to_string(), "3h".to_string());
        assert!(parse_interval(&params).is_err());
    }

    #[test]
    fn date_range_defaults_to_the_last_30_days() {
        let (from, to) = date_range(&HashMap::new()).unwrap();
        let span_days = (to.as_nanos() - from.as_nanos()) / (NANOS_PER_SEC * 24 * 60 * 60);
        assert_eq!(span_days, DEFAULT_RANGE_DAYS as u64);
    }

    #[test]
    fn date_range_honors_explicit_bounds() {
        let mut params = HashMap::new();
        params.insert("from".to_string(), "2026-01-01".to_string());
        params.insert("to".to_string(), "2026-01-10".to_string());
        let (from, to) = date_range(&params).unwrap();
        assert!(from.as_nanos() < to.as_nanos());
    }

    #[test]
    fn date_range_rejects_malformed_dates() {
        let mut params = HashMap::new();
        params.insert("from".to_string(), "01/01/2026".to_string());
        assert!(date_range(&params).is_err());
    }
}
