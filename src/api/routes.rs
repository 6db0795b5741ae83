//! Route table, shared state, and request handlers.
//!
//! An upload replaces the dataset under the write lock in one assignment; a
//! pass clones a snapshot under the read lock, so in-flight passes never see
//! a torn mix of old and new data.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use uuid::Uuid;

use crate::allocation::{AllocationEngine, AllocationOutcome, LlmAllocationSource};
use crate::config::Config;
use crate::dataset::Dataset;
use crate::export;
use crate::ingest;
use crate::llm::OpenAiClient;

/// Uploaded workbooks are rejected above this size.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Shared state behind every handler.
pub struct AppState {
    pub dataset: RwLock<Dataset>,
    pub engine: AllocationEngine,
}

/// Row counts reported back after a successful upload.
#[derive(Debug, Serialize)]
pub struct UploadSummary {
    pub programs: usize,
    pub positions: usize,
    pub items: usize,
}

/// One allocation pass, wrapped with run metadata for the caller.
#[derive(Debug, Serialize)]
pub struct AllocationReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: AllocationOutcome,
}

/// Build the application and serve it until shutdown.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let llm = Arc::new(OpenAiClient::new(
        &config.base_url,
        &config.api_key,
        config.request_timeout,
    )?);
    let source = Arc::new(LlmAllocationSource::new(llm, config.model.clone()));
    let state = Arc::new(AppState {
        dataset: RwLock::new(Dataset::default()),
        engine: AllocationEngine::new(source),
    });

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, model = %config.model, "serving allocation API");
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/upload", post(upload))
        .route("/api/allocations", get(allocations))
        .route("/api/allocations/csv", get(allocations_csv))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Accept a workbook upload and swap it in as the new dataset.
///
/// The workbook fully parses before any state changes; a malformed upload
/// returns 400 and leaves the previous dataset untouched.
async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadSummary>, (StatusCode, String)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let bytes = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        if bytes.is_empty() {
            continue;
        }

        let dataset =
            ingest::parse_workbook(&bytes).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        let summary = UploadSummary {
            programs: dataset.programs.len(),
            positions: dataset.positions.len(),
            items: dataset.items.len(),
        };

        *state.dataset.write().await = dataset;
        info!(
            programs = summary.programs,
            positions = summary.positions,
            items = summary.items,
            "dataset replaced"
        );
        return Ok(Json(summary));
    }

    Err((StatusCode::BAD_REQUEST, "missing file".to_string()))
}

/// Run an allocation pass over the current dataset.
///
/// Always succeeds: source failures are absorbed by the engine's fallback.
async fn allocations(State(state): State<Arc<AppState>>) -> Json<AllocationReport> {
    let snapshot = state.dataset.read().await.clone();
    let outcome = state.engine.run(&snapshot).await;
    Json(AllocationReport {
        run_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        outcome,
    })
}

async fn allocations_csv(
    State(state): State<Arc<AppState>>,
) -> Result<Response, (StatusCode, String)> {
    let snapshot = state.dataset.read().await.clone();
    let outcome = state.engine.run(&snapshot).await;
    let rendered = export::summary_csv(&outcome.summary)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, "text/csv".parse().unwrap());
    headers.insert(
        header::CONTENT_DISPOSITION,
        "attachment; filename=\"program_summary.csv\"".parse().unwrap(),
    );
    Ok((headers, rendered).into_response())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::allocation::{AllocationMap, AllocationSource, AllocationSourceError, CostEntity};
    use crate::dataset::{Position, Program};

    struct EqualOnly;

    #[async_trait]
    impl AllocationSource for EqualOnly {
        async fn propose(
            &self,
            _entity: &CostEntity<'_>,
            _programs: &[&Program],
        ) -> Result<AllocationMap, AllocationSourceError> {
            Err(AllocationSourceError::Malformed("stubbed".to_string()))
        }
    }

    fn state_with_dataset(dataset: Dataset) -> Arc<AppState> {
        Arc::new(AppState {
            dataset: RwLock::new(dataset),
            engine: AllocationEngine::new(Arc::new(EqualOnly)),
        })
    }

    fn small_dataset() -> Dataset {
        Dataset {
            programs: vec![
                Program {
                    department: "Finance".to_string(),
                    name: "Audit".to_string(),
                },
                Program {
                    department: "Finance".to_string(),
                    name: "Budget Analysis".to_string(),
                },
            ],
            positions: vec![Position {
                department: "Finance".to_string(),
                position: "Analyst".to_string(),
                cost: dec!(1000),
            }],
            items: vec![],
        }
    }

    #[tokio::test]
    async fn allocations_handler_reports_all_three_outputs() {
        let state = state_with_dataset(small_dataset());

        let Json(report) = allocations(State(state)).await;

        assert_eq!(report.outcome.personnel.len(), 2);
        assert!(report.outcome.non_personnel.is_empty());
        assert_eq!(report.outcome.summary.len(), 2);

        let value = serde_json::to_value(&report).unwrap();
        for key in ["run_id", "generated_at", "personnel", "non_personnel", "summary"] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
    }

    #[tokio::test]
    async fn allocations_handler_on_empty_dataset_is_empty_not_an_error() {
        let state = state_with_dataset(Dataset::default());

        let Json(report) = allocations(State(state)).await;

        assert!(report.outcome.personnel.is_empty());
        assert!(report.outcome.summary.is_empty());
    }

    #[tokio::test]
    async fn csv_handler_renders_the_summary() {
        let state = state_with_dataset(small_dataset());

        let snapshot = state.dataset.read().await.clone();
        let outcome = state.engine.run(&snapshot).await;
        let rendered = export::summary_csv(&outcome.summary).unwrap();

        assert!(rendered.starts_with("Program,"));
        assert!(rendered.contains("Audit"));
        assert!(rendered.contains("Budget Analysis"));
    }
}
