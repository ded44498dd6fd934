use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::domain::{Address, FlightKey};
use crate::ledger::Ledger;
use crate::observability::{MetricsRegistry, TimingGuard};

use super::request::{CallRequest, EventsQuery, FlightQuery};
use super::response::{
    AirlineResponse, BalanceResponse, ErrorResponse, EventsResponse, FlightKeyResponse,
    FlightResponse, HealthResponse, InsuranceResponse, OperationalResponse, OracleIndexesResponse,
};

/// Shared application state.
pub struct AppState {
    /// The ledger all calls execute against
    pub ledger: Arc<Mutex<Ledger>>,

    /// Call counters and latency buckets
    pub metrics: Arc<MetricsRegistry>,

    /// Application start time
    pub start_time: Instant,

    /// Application version
    pub version: String,

    /// Upper bound on events returned per feed page
    pub event_page_size: usize,
}

impl AppState {
    pub fn new(ledger: Ledger, event_page_size: usize) -> Self {
        AppState {
            ledger: Arc::new(Mutex::new(ledger)),
            metrics: Arc::new(MetricsRegistry::new()),
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            event_page_size,
        }
    }
}

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api", get(handle_welcome))
        .route("/v1/calls", post(handle_call))
        .route("/v1/operational", get(handle_operational))
        .route("/v1/airlines/:address", get(handle_airline))
        .route("/v1/flights/:key", get(handle_flight))
        .route("/v1/flight-key", get(handle_flight_key))
        .route("/v1/insurance/:passenger/:key", get(handle_insurance))
        .route("/v1/oracles/:address/indexes", get(handle_oracle_indexes))
        .route("/v1/accounts/:address/balance", get(handle_balance))
        .route("/v1/events", get(handle_events))
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn parse_key(raw: &str) -> Result<FlightKey, Response> {
    raw.parse().map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request(format!("invalid flight key: {e}"))),
        )
            .into_response()
    })
}

/// Execute one call against the ledger.
async fn handle_call(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CallRequest>, JsonRejection>,
) -> Response {
    // Unknown methods and out-of-range status codes land here
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(rejection.body_text(), "VALIDATION_ERROR")),
            )
                .into_response();
        }
    };

    let value = match req.value_wei() {
        Ok(v) => v,
        Err(e) => {
            let body = ErrorResponse::bad_request(e.to_string());
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    let result = {
        let _timer = TimingGuard::new(&state.metrics);
        state.ledger.lock().execute(req.caller, value, req.command)
    };

    match result {
        Ok(receipt) => {
            state.metrics.record_receipt(&receipt);
            info!(
                tx_id = %receipt.tx_id,
                caller = %receipt.caller,
                method = receipt.method,
                events = receipt.events.len(),
                "Call committed"
            );
            (StatusCode::OK, Json(receipt)).into_response()
        }
        Err(revert) => {
            state.metrics.record_revert(&revert);
            debug!(
                tx_id = %revert.tx_id,
                caller = %revert.caller,
                method = revert.method,
                error = %revert.error,
                "Call reverted"
            );
            let (status, body) = ErrorResponse::from_revert(&revert);
            (status, Json(body)).into_response()
        }
    }
}

/// Whether the data store accepts mutations.
async fn handle_operational(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ledger = state.ledger.lock();

    Json(OperationalResponse {
        operational: ledger.store().is_operational(),
        sequence: ledger.sequence(),
    })
}

async fn handle_airline(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    let address = Address::new(address);
    let ledger = state.ledger.lock();

    Json(AirlineResponse::new(address.clone(), ledger.store().airline(&address)))
}

async fn handle_flight(State(state): State<Arc<AppState>>, Path(key): Path<String>) -> Response {
    let key = match parse_key(&key) {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    let ledger = state.ledger.lock();
    match ledger.store().flight(&key) {
        Some(flight) => (StatusCode::OK, Json(FlightResponse::from(flight))).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::not_found(format!("no flight registered under {key}"))),
        )
            .into_response(),
    }
}

/// Derive a flight key from its identifiers.
async fn handle_flight_key(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FlightQuery>,
) -> impl IntoResponse {
    let key = query.key();
    let registered = state.ledger.lock().store().is_flight_registered(&key);

    Json(FlightKeyResponse { key, registered })
}

async fn handle_insurance(
    State(state): State<Arc<AppState>>,
    Path((passenger, key)): Path<(String, String)>,
) -> Response {
    let key = match parse_key(&key) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let passenger = Address::new(passenger);

    let ledger = state.ledger.lock();
    let policy = ledger.store().policy(&passenger, &key).cloned();

    (
        StatusCode::OK,
        Json(InsuranceResponse {
            insured: policy.is_some(),
            passenger,
            flight_key: key,
            policy,
        }),
    )
        .into_response()
}

async fn handle_oracle_indexes(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    let oracle = Address::new(address);
    let indexes = state.ledger.lock().store().oracle_indexes(&oracle);

    Json(OracleIndexesResponse {
        registered: indexes.is_some(),
        oracle,
        indexes,
    })
}

async fn handle_balance(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    let account = Address::new(address);
    let wei = state.ledger.lock().balance_of(&account);

    Json(BalanceResponse::new(account, wei))
}

/// Page through the notification feed.
async fn handle_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    let limit = query
        .limit
        .unwrap_or(state.event_page_size)
        .min(state.event_page_size);

    let events = state.ledger.lock().events_since(query.since, limit);
    let next = events.last().map(|e| e.sequence).unwrap_or(query.since);

    Json(EventsResponse { events, next })
}

async fn handle_welcome() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "An API for use with your Dapp!" }))
}

/// Health check endpoint.
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Metrics endpoint (Prometheus format).
async fn handle_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (operational, sequence, events) = {
        let ledger = state.ledger.lock();
        (
            ledger.store().is_operational(),
            ledger.sequence(),
            ledger.last_event_sequence(),
        )
    };

    let metrics = format!(
        r#"# HELP surety_uptime_seconds Application uptime in seconds
# TYPE surety_uptime_seconds counter
surety_uptime_seconds {}

# HELP surety_operational Whether the data store accepts mutations
# TYPE surety_operational gauge
surety_operational {}

# HELP surety_ledger_sequence Calls executed by the ledger
# TYPE surety_ledger_sequence counter
surety_ledger_sequence {}

# HELP surety_events_logged Notifications recorded in the event log
# TYPE surety_events_logged counter
surety_events_logged {}

{}"#,
        state.start_time.elapsed().as_secs(),
        u8::from(operational),
        sequence,
        events,
        state.metrics.to_prometheus(),
    );

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        metrics,
    )
}
