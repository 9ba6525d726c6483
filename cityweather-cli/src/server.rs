//! HTTP surface over the weather table.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use cityweather_core::{
    AggregationReport, SortOrder, WeatherAggregator, WeatherField, WeatherRecord, WeatherTable,
    chart,
};
use serde::Deserialize;
use tokio::sync::RwLock;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

const HOME: &str = r#"<h2>Welcome to the Weather API</h2>
<ul>
  <li><a href="/csv">Download CSV</a></li>
  <li><a href="/temperature_chart">Temperature Chart</a></li>
  <li><a href="/humidity_chart">Humidity Chart</a></li>
  <li><a href="/weather">Weather table (JSON)</a></li>
  <li><a href="/top?field=temperature_c&amp;n=5">Warmest cities</a></li>
</ul>
"#;

const DEFAULT_TOP_N: usize = 5;

#[derive(Clone)]
pub struct AppState {
    aggregator: Arc<WeatherAggregator>,
    table: Arc<RwLock<WeatherTable>>,
    export_path: Arc<PathBuf>,
}

impl AppState {
    pub fn new(aggregator: WeatherAggregator, table: WeatherTable, export_path: PathBuf) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            table: Arc::new(RwLock::new(table)),
            export_path: Arc::new(export_path),
        }
    }

    /// Aggregate the default city list and export it, producing the initial state.
    pub async fn bootstrap(aggregator: WeatherAggregator, export_path: PathBuf) -> Self {
        let report = aggregator.aggregate_default().await;
        let state = Self::new(aggregator, report.table.clone(), export_path);
        export(report.table, Arc::clone(&state.export_path)).await;
        state
    }
}

/// Write the CSV on a blocking thread; failures are logged, not returned.
async fn export(table: WeatherTable, path: Arc<PathBuf>) {
    let rows = table.len();
    let target = Arc::clone(&path);
    let result = tokio::task::spawn_blocking(move || table.export_csv(target.as_path()))
        .await
        .context("CSV export task failed")
        .and_then(|written| written);

    match result {
        Ok(()) => tracing::info!(path = %path.display(), rows, "exported weather table"),
        Err(e) => tracing::warn!(path = %path.display(), error = %format!("{e:#}"), "CSV export failed"),
    }
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(err: anyhow::Error) -> Self {
        tracing::error!(error = %format!("{err:#}"), "request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

fn parse_field(raw: &str) -> Result<WeatherField, ApiError> {
    WeatherField::try_from(raw).map_err(|e| ApiError::bad_request(e.to_string()))
}

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    field: String,
    n: Option<usize>,
    order: Option<SortOrder>,
}

/// Body of `POST /weather`.
#[derive(Debug, Deserialize)]
pub struct CityRequest {
    cities: Vec<String>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(home))
        .route("/csv", get(get_csv))
        .route("/temperature_chart", get(temperature_chart))
        .route("/humidity_chart", get(humidity_chart))
        .route("/chart/{column}", get(column_chart))
        .route("/top", get(top))
        .route("/weather", get(get_table).post(fetch_cities))
        .route("/refresh", post(refresh))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn run(state: AppState, bind: &str) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    tracing::info!("Web server running at http://{}", bind);

    axum::serve(listener, app).await.context("HTTP server stopped")?;
    Ok(())
}

async fn home() -> Html<&'static str> {
    Html(HOME)
}

async fn get_csv(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state
        .table
        .read()
        .await
        .to_csv_string()
        .map_err(ApiError::internal)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"weather_data.csv\""),
        ],
        body,
    )
        .into_response())
}

async fn render_chart(state: &AppState, field: WeatherField) -> Response {
    let svg = chart::render_bar_chart(&*state.table.read().await, field);
    ([(header::CONTENT_TYPE, chart::CONTENT_TYPE)], svg).into_response()
}

async fn temperature_chart(State(state): State<AppState>) -> Response {
    render_chart(&state, WeatherField::TemperatureC).await
}

async fn humidity_chart(State(state): State<AppState>) -> Response {
    render_chart(&state, WeatherField::HumidityPct).await
}

async fn column_chart(
    State(state): State<AppState>,
    Path(column): Path<String>,
) -> Result<Response, ApiError> {
    let field = parse_field(&column)?;
    Ok(render_chart(&state, field).await)
}

async fn top(
    State(state): State<AppState>,
    Query(query): Query<TopQuery>,
) -> Result<Json<Vec<WeatherRecord>>, ApiError> {
    let field = parse_field(&query.field)?;
    let n = query.n.unwrap_or(DEFAULT_TOP_N);
    let order = query.order.unwrap_or_default();

    let table = state.table.read().await;
    let ranked = table.top_n(field, n, order).into_iter().cloned().collect();
    Ok(Json(ranked))
}

async fn get_table(State(state): State<AppState>) -> Json<WeatherTable> {
    Json(state.table.read().await.clone())
}

async fn fetch_cities(
    State(state): State<AppState>,
    Json(request): Json<CityRequest>,
) -> Result<Json<AggregationReport>, ApiError> {
    let cities: Vec<String> = request
        .cities
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();

    if cities.is_empty() {
        return Err(ApiError::bad_request("cities must contain at least one city name"));
    }

    Ok(Json(state.aggregator.aggregate_with_report(&cities).await))
}

async fn refresh(State(state): State<AppState>) -> Json<AggregationReport> {
    let report = state.aggregator.aggregate_default().await;

    // The file and the served table change together under the write lock.
    let mut table = state.table.write().await;
    export(report.table.clone(), Arc::clone(&state.export_path)).await;
    *table = report.table.clone();
    drop(table);

    Json(report)
}
