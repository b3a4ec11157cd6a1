use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use meridian_core::{CanonicalTransaction, Domain, NormalizedRecords, RawRecord};
use meridian_ingest::{extract_rows, normalize_rows};
use meridian_recon::{ReconError, ReconciliationRun, Reconciler, ResolutionRecord, Status};
use meridian_storage::{Datasets, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub datasets: Datasets,
    pub reconciler: Arc<Reconciler>,
}

pub enum ApiError {
    BadRequest(String),
    Upstream(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Upstream(m) => (StatusCode::BAD_GATEWAY, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({"error": message}))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        ApiError::Internal(error.to_string())
    }
}

impl From<ReconError> for ApiError {
    fn from(error: ReconError) -> Self {
        match error {
            ReconError::OracleUnavailable(message) => ApiError::Upstream(message),
            ReconError::Store(inner) => ApiError::Internal(inner.to_string()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/normalize", post(normalize))
        .route("/api/ingest", post(ingest))
        .route("/api/datasets/{domain}", get(get_dataset).post(merge_dataset))
        .route("/api/reconciliation/analyze", post(analyze))
        .route("/api/reconciliation/runs", get(runs))
        .route(
            "/api/reconciliation/resolutions",
            get(resolutions).post(resolve),
        )
        .route("/api/reconciliation/status/{txn_id}", get(txn_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

#[derive(Deserialize)]
struct NormalizeRequest {
    rows: Vec<RawRecord>,
    #[serde(default)]
    document_identity: Option<String>,
}

async fn normalize(Json(request): Json<NormalizeRequest>) -> Json<NormalizedRecords> {
    let identity = request.document_identity.as_deref().unwrap_or("manual");
    Json(normalize_rows(&request.rows, identity))
}

#[derive(Deserialize)]
struct IngestRequest {
    content: String,
    #[serde(default)]
    content_type: String,
    document_identity: String,
}

#[derive(Serialize)]
struct IngestResponse {
    normalized: NormalizedRecords,
    dataset_sizes: Value,
}

/// Full pipeline: extract rows, normalize, merge each shape into its domain
/// dataset.
async fn ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let rows = extract_rows(request.content.as_bytes(), &request.content_type)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let normalized = normalize_rows(&rows, &request.document_identity);

    let txns = state
        .datasets
        .merge_into(Domain::Transactions, to_values(&normalized.transactions)?)
        .await?;
    let entities = state
        .datasets
        .merge_into(Domain::Entities, to_values(&normalized.entities)?)
        .await?;
    let positions = state
        .datasets
        .merge_into(Domain::Portfolio, to_values(&normalized.portfolio_positions)?)
        .await?;
    let scenarios = state
        .datasets
        .merge_into(Domain::Scenarios, to_values(&normalized.scenarios)?)
        .await?;

    Ok(Json(IngestResponse {
        normalized,
        dataset_sizes: json!({
            "transactions": txns.len(),
            "entities": entities.len(),
            "portfolio": positions.len(),
            "scenarios": scenarios.len(),
        }),
    }))
}

async fn get_dataset(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let domain = parse_domain(&domain)?;
    Ok(Json(state.datasets.dataset(domain).await?))
}

#[derive(Deserialize)]
struct MergeRequest {
    records: Vec<Value>,
}

async fn merge_dataset(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Json(request): Json<MergeRequest>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let domain = parse_domain(&domain)?;
    Ok(Json(state.datasets.merge_into(domain, request.records).await?))
}

#[derive(Deserialize)]
struct AnalyzeRequest {
    #[serde(default)]
    transactions: Option<Vec<CanonicalTransaction>>,
}

/// Reconciles the supplied transactions, or the persisted transaction
/// dataset when the request carries none.
async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<ReconciliationRun>, ApiError> {
    let transactions = match request.transactions {
        Some(transactions) => transactions,
        None => {
            let dataset = state.datasets.dataset(Domain::Transactions).await?;
            dataset
                .into_iter()
                .filter_map(|record| match serde_json::from_value(record) {
                    Ok(txn) => Some(txn),
                    Err(error) => {
                        tracing::warn!(%error, "skipping malformed dataset transaction");
                        None
                    }
                })
                .collect()
        }
    };

    let run = state.reconciler.run(transactions).await?;
    Ok(Json(run))
}

async fn runs(State(state): State<AppState>) -> Result<Json<Vec<ReconciliationRun>>, ApiError> {
    Ok(Json(state.reconciler.runs().await?))
}

#[derive(Deserialize)]
struct ResolveRequest {
    #[serde(rename = "transactionId")]
    transaction_id: String,
    status: Status,
    #[serde(default)]
    matched_with: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

async fn resolve(
    State(state): State<AppState>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<ResolutionRecord>, ApiError> {
    let record = state
        .reconciler
        .resolutions()
        .apply(
            &request.transaction_id,
            request.status,
            request.matched_with,
            request.notes,
        )
        .await?;
    Ok(Json(record))
}

async fn resolutions(
    State(state): State<AppState>,
) -> Result<Json<Vec<ResolutionRecord>>, ApiError> {
    Ok(Json(state.reconciler.resolutions().all().await?))
}

async fn txn_status(
    State(state): State<AppState>,
    Path(txn_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let status = state.reconciler.transaction_status(&txn_id).await?;
    Ok(Json(json!({"transactionId": txn_id, "status": status})))
}

fn to_values<T: Serialize>(records: &[T]) -> Result<Vec<Value>, ApiError> {
    records
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<_, _>>()
        .map_err(|e| ApiError::Internal(e.to_string()))
}

fn parse_domain(raw: &str) -> Result<Domain, ApiError> {
    raw.parse()
        .map_err(|e: meridian_core::DomainParseError| ApiError::BadRequest(e.to_string()))
}
