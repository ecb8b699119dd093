use crate::config::AppConfig;
use crate::model::{ModelHandle, ModelStatus};
use crate::storage::{BlobStore, PredictionRecord, RecordStore};
use serde::Serialize;
use std::sync::Arc;

pub const SUCCESS_MESSAGE: &str = "Model is predicted successfully";

/// Shared Application State
#[derive(Clone)]
pub struct AppState {
    pub model: ModelHandle,
    pub blobs: Arc<dyn BlobStore>,
    pub records: Arc<dyn RecordStore>,
    pub settings: PredictSettings,
}

/// Tunables of the `/predict` pipeline.
#[derive(Clone, Debug)]
pub struct PredictSettings {
    pub max_upload_bytes: usize,
    pub threshold: f32,
    pub collection: String,
}

impl PredictSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_upload_bytes: config.upload.max_bytes,
            threshold: config.verdict.threshold,
            collection: config.storage.records.collection().to_string(),
        }
    }
}

impl Default for PredictSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

// --- DTOs ---

#[derive(Serialize)]
pub struct PredictResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub data: PredictionRecord,
}

impl PredictResponse {
    pub fn success(data: PredictionRecord) -> Self {
        Self {
            status: "success",
            message: SUCCESS_MESSAGE,
            data,
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: ModelStatus,
}
