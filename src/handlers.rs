use anyhow::anyhow;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Json, Multipart, State};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::services;
use crate::state::AppState;
use crate::upload;

/// Health check handler - returns server status
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary_and_quiz: String,
}

/// Accepts a `videoFile` upload and returns the model's summary and quiz.
///
/// A request that is not `multipart/form-data` at all has no file part, so it
/// gets the same JSON 400 as a form without `videoFile`.
pub async fn process_video(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<SummaryResponse>> {
    let span = info_span!("process_video", request_id = %Uuid::new_v4());
    run(state, multipart).instrument(span).await
}

// Validation failures are 400s with nothing written. Once the scratch file
// exists, every outcome goes through cleanup before the response is built.
async fn run(
    state: AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<SummaryResponse>> {
    let mut multipart = multipart.map_err(|rejection| {
        warn!("Rejected upload: {}", rejection.body_text());
        ApiError::MissingFile
    })?;

    let scratch = upload::receive_video(&mut multipart, &state.config.upload_dir)
        .await
        .inspect_err(|e| match e {
            ApiError::Processing(e) => error!("Failed to save upload: {:#}", e),
            e => warn!("Rejected upload: {}", e),
        })?;

    let model = &*state.model;
    let timeout = state.config.process_timeout;
    let mut uploaded = None;
    let outcome = match tokio::time::timeout(
        timeout,
        services::summarize_video(model, &scratch, state.config.poll_policy(), &mut uploaded),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(anyhow!("timed out after {:?}", timeout)),
    };

    services::cleanup(model, scratch, uploaded).await;

    match outcome {
        Ok(summary_and_quiz) => Ok(Json(SummaryResponse { summary_and_quiz })),
        Err(e) => {
            error!("Processing failed: {:#}", e);
            Err(ApiError::processing(e))
        }
    }
}
