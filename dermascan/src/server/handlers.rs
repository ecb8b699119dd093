use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{PipelineError, PredictError};
use crate::model::{Classifier, ModelStatus};
use crate::preprocessing;
use crate::server::types::*;
use crate::server::upload;
use crate::storage::{blob_key, PredictionRecord};
use crate::telemetry::{
    INFERENCE_SECONDS, PIPELINE_FAILURES_TOTAL, PREDICTIONS_TOTAL, REJECTIONS_TOTAL, UPLOAD_BYTES,
};
use crate::verdict::Verdict;

pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let model = state.model.status();
    let (code, status) = match model {
        ModelStatus::Ready => (StatusCode::OK, "ok"),
        ModelStatus::Loading | ModelStatus::Failed => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
    };
    (code, Json(HealthResponse { status, model }))
}

/// `POST /predict`: validate, store the upload, classify, persist, respond.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<PredictResponse>), PredictError> {
    // 1. Validate
    let upload = upload::read_image(multipart, state.settings.max_upload_bytes)
        .await
        .inspect_err(|e| {
            tracing::warn!(reason = e.kind(), "upload rejected");
            counter!(REJECTIONS_TOTAL, "reason" => e.kind()).increment(1);
        })?;
    histogram!(UPLOAD_BYTES).record(upload.size as f64);

    // 2. Gate on the model before anything is written
    let model = state.model.get().inspect_err(|e| {
        tracing::warn!(reason = e.kind(), "prediction refused, model not available");
        counter!(REJECTIONS_TOTAL, "reason" => e.kind()).increment(1);
    })?;

    // 3. Store the artifact
    let key = blob_key(&upload.file_name);
    state
        .blobs
        .put(&key, upload.bytes.clone(), &upload.content_type)
        .await
        .map_err(|e| {
            tracing::error!(blob_key = %key, backend = state.blobs.backend_name(), error = %e, "upload failed");
            counter!(REJECTIONS_TOTAL, "reason" => "upload").increment(1);
            PredictError::Upload(e)
        })?;

    // 4. Classify and persist
    match run_pipeline(&state, model, upload.bytes).await {
        Ok(record) => {
            tracing::info!(
                id = %record.id,
                blob_key = %key,
                result = record.result.as_str(),
                "prediction saved"
            );
            counter!(PREDICTIONS_TOTAL, "result" => record.result.as_str()).increment(1);
            Ok((StatusCode::CREATED, Json(PredictResponse::success(record))))
        }
        Err(e) => {
            // the blob stays behind; the key is logged so it can be found later
            tracing::error!(stage = e.stage(), blob_key = %key, error = %e, "prediction error");
            counter!(PIPELINE_FAILURES_TOTAL, "stage" => e.stage()).increment(1);
            Err(e.into())
        }
    }
}

async fn run_pipeline(
    state: &AppState,
    model: Arc<dyn Classifier>,
    bytes: Bytes,
) -> Result<PredictionRecord, PipelineError> {
    let start = Instant::now();
    let score = tokio::task::spawn_blocking(move || {
        let input = preprocessing::image::process_bytes(&bytes)?;
        model.score(input)
    })
    .await
    .map_err(|e| PipelineError::Interrupted(e.to_string()))??;
    histogram!(INFERENCE_SECONDS).record(start.elapsed().as_secs_f64());

    let verdict = Verdict::from_score(score, state.settings.threshold);
    tracing::debug!(score, result = verdict.result.as_str(), "scored upload");

    let record = PredictionRecord::new(verdict);
    state
        .records
        .put(&state.settings.collection, &record)
        .await
        .map_err(PipelineError::Record)?;

    Ok(record)
}
