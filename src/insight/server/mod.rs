// SPDX-License-Identifier: MIT

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::eval::EvaluatorError;
use crate::insight::essay::EssayPipeline;
use crate::insight::workflow::error::WorkflowError;

pub async fn serve(
    port: u16,
    pipeline: Arc<EssayPipeline>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/evaluations", post(create_evaluation))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(pipeline);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
struct EvaluationRequest {
    essay: String,
}

async fn create_evaluation(
    State(pipeline): State<Arc<EssayPipeline>>,
    Json(payload): Json<EvaluationRequest>,
) -> (StatusCode, Json<Value>) {
    match pipeline.evaluate(&payload.essay).await {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({
                "status": "completed",
                "verdict": report.verdict().as_str(),
                "approved": report.approved(),
                "report": report,
            })),
        ),
        Err(e) => {
            log::error!("evaluation failed: {}", e);
            error_response(&e)
        }
    }
}

/// Each error class gets its own status and message; an aborted run never
/// leaks a partial report.
fn error_response(err: &WorkflowError) -> (StatusCode, Json<Value>) {
    let status = match err {
        WorkflowError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        WorkflowError::Evaluator(
            EvaluatorError::Contract(_) | EvaluatorError::Transport(_) | EvaluatorError::Api { .. },
        ) => StatusCode::BAD_GATEWAY,
        WorkflowError::Evaluator(EvaluatorError::Config(_))
        | WorkflowError::IncompleteAggregation { .. }
        | WorkflowError::MissingField(_)
        | WorkflowError::Stalled(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() })))
}
