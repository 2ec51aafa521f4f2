use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tickerlens_core::analysis::session::{run_analysis, AnalysisSession, RunError, RunFailure, RunState, SessionError};
use tickerlens_core::analysis::{Analyzer, BatchAnalysisError};
use tickerlens_core::config::DataSource;
use tickerlens_core::domain::view::ResultView;
use tickerlens_core::domain::watchlist::{Watchlist, WatchlistError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = tickerlens_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let analyzer = match Analyzer::from_settings(&settings) {
        Ok(analyzer) => analyzer,
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            return Err(e);
        }
    };
    tracing::info!(source = ?analyzer.source(), "analyzer ready");

    let state = AppState::new(analyzer, Watchlist::from_symbols(&settings.watchlist));
    let app = router(state).layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/watchlist", get(get_watchlist).post(add_ticker))
        .route("/watchlist/:ticker", delete(remove_ticker))
        .route("/analyze", post(analyze))
        .route("/results", get(get_results))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    session: Arc<Mutex<AnalysisSession>>,
    analyzer: Arc<Analyzer>,
}

impl AppState {
    fn new(analyzer: Analyzer, watchlist: Watchlist) -> Self {
        Self {
            session: Arc::new(Mutex::new(AnalysisSession::new(watchlist))),
            analyzer: Arc::new(analyzer),
        }
    }
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

fn api_error(status: StatusCode, error: impl Into<String>, detail: Option<String>) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error: error.into(),
            detail,
        }),
    )
}

#[derive(Debug, Serialize)]
struct WatchlistResponse {
    tickers: Vec<String>,
}

impl From<&Watchlist> for WatchlistResponse {
    fn from(w: &Watchlist) -> Self {
        Self {
            tickers: w.tickers().to_vec(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AddTickerRequest {
    ticker: String,
}

async fn get_watchlist(State(state): State<AppState>) -> Json<WatchlistResponse> {
    let session = state.session.lock().await;
    Json(WatchlistResponse::from(session.watchlist()))
}

async fn add_ticker(
    State(state): State<AppState>,
    Json(req): Json<AddTickerRequest>,
) -> ApiResult<(StatusCode, Json<WatchlistResponse>)> {
    let mut session = state.session.lock().await;
    match session.add_ticker(&req.ticker) {
        Ok(ticker) => {
            tracing::info!(%ticker, "ticker added");
            Ok((StatusCode::CREATED, Json(WatchlistResponse::from(session.watchlist()))))
        }
        Err(e @ WatchlistError::Duplicate(_)) => Err(api_error(StatusCode::CONFLICT, e.to_string(), None)),
        Err(e) => Err(api_error(StatusCode::BAD_REQUEST, e.to_string(), None)),
    }
}

async fn remove_ticker(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> ApiResult<Json<WatchlistResponse>> {
    let mut session = state.session.lock().await;
    if !session.remove_ticker(&ticker) {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("{} is not in the watchlist", ticker.trim().to_ascii_uppercase()),
            None,
        ));
    }
    Ok(Json(WatchlistResponse::from(session.watchlist())))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResultsResponse {
    #[serde(flatten)]
    state: RunState,
    source: DataSource,
    tickers: Vec<String>,
    results: Vec<ResultView>,
    last_error: Option<RunFailure>,
}

fn results_response(session: &AnalysisSession, source: DataSource) -> ResultsResponse {
    ResultsResponse {
        state: session.state().clone(),
        source,
        tickers: session.watchlist().tickers().to_vec(),
        results: session.results().iter().map(ResultView::from).collect(),
        last_error: session.last_error().cloned(),
    }
}

async fn analyze(State(state): State<AppState>) -> ApiResult<Json<ResultsResponse>> {
    match run_analysis(&state.session, &state.analyzer).await {
        Ok(_) => {
            let session = state.session.lock().await;
            Ok(Json(results_response(&session, state.analyzer.source())))
        }
        Err(RunError::Session(e @ SessionError::AlreadyRunning(_))) => {
            Err(api_error(StatusCode::CONFLICT, e.to_string(), None))
        }
        Err(RunError::Session(e)) => Err(api_error(StatusCode::BAD_REQUEST, e.to_string(), None)),
        Err(RunError::Batch(e @ BatchAnalysisError::EmptyWatchlist)) => {
            Err(api_error(StatusCode::BAD_REQUEST, e.user_message(), None))
        }
        Err(RunError::Batch(e)) => {
            let message = e.user_message();
            let detail = e.to_string();
            sentry_anyhow::capture_anyhow(&anyhow::Error::new(e));
            Err(api_error(StatusCode::BAD_GATEWAY, message, Some(detail)))
        }
        Err(e @ RunError::Aborted { .. }) => {
            let detail = e.to_string();
            sentry_anyhow::capture_anyhow(&anyhow::Error::new(e));
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "The analysis run stopped unexpectedly.",
                Some(detail),
            ))
        }
    }
}

async fn get_results(State(state): State<AppState>) -> Json<ResultsResponse> {
    let session = state.session.lock().await;
    Json(results_response(&session, state.analyzer.source()))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &tickerlens_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
