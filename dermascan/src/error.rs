use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ndarray::ShapeError;
use serde_json::json;
use thiserror::Error;

pub const PREDICTION_FAILED_MESSAGE: &str = "Terjadi kesalahan dalam melakukan prediksi";
pub const UPLOAD_FAILED_MESSAGE: &str = "Error uploading file";

/// Failures of the blob and record backends.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("key already exists: {0}")]
    Conflict(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("storage task failed: {0}")]
    Task(String),
}

/// Everything that can go wrong after the upload has been stored.
/// Callers see one uniform message; the variant is kept for logs and metrics.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("tensor shape error: {0}")]
    Shape(#[from] ShapeError),

    #[error("inference failed: {0}")]
    Inference(#[from] ort::Error),

    #[error("model produced an empty output tensor")]
    EmptyOutput,

    #[error("model session lock poisoned")]
    ModelPoisoned,

    #[error("prediction task aborted: {0}")]
    Interrupted(String),

    #[error("failed to save prediction: {0}")]
    Record(#[source] StoreError),
}

impl PipelineError {
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Decode(_) | PipelineError::Shape(_) => "decode",
            PipelineError::Inference(_)
            | PipelineError::EmptyOutput
            | PipelineError::ModelPoisoned
            | PipelineError::Interrupted(_) => "inference",
            PipelineError::Record(_) => "record",
        }
    }
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Model not found at path: {0}")]
    ModelNotFound(String),

    #[error("failed to fetch model: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("model download returned status {0}")]
    FetchStatus(u16),

    #[error("model artifact exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ONNX Runtime error: {0}")]
    OrtError(#[from] ort::Error),

    #[error("model has no inputs")]
    NoInputs,

    #[error("model load task failed: {0}")]
    Task(String),
}

/// Error returned by the `/predict` handler.
#[derive(Error, Debug)]
pub enum PredictError {
    #[error("No file uploaded")]
    MissingFile,

    #[error("Only image files are allowed")]
    NotAnImage,

    #[error("Payload content length greater than maximum allowed: {limit}")]
    PayloadTooLarge { limit: usize },

    #[error("Malformed multipart body: {0}")]
    Malformed(String),

    #[error("Service not ready")]
    NotReady,

    #[error("Model failed to load")]
    ModelUnavailable,

    #[error("Error uploading file: {0}")]
    Upload(#[source] StoreError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl PredictError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PredictError::MissingFile
            | PredictError::NotAnImage
            | PredictError::Malformed(_)
            | PredictError::Pipeline(_) => StatusCode::BAD_REQUEST,
            PredictError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            PredictError::NotReady | PredictError::ModelUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            PredictError::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::MissingFile => "missing_file",
            PredictError::NotAnImage => "not_an_image",
            PredictError::PayloadTooLarge { .. } => "too_large",
            PredictError::Malformed(_) => "malformed",
            PredictError::NotReady => "not_ready",
            PredictError::ModelUnavailable => "model_unavailable",
            PredictError::Upload(_) => "upload",
            PredictError::Pipeline(e) => e.stage(),
        }
    }

    fn public_message(&self) -> String {
        match self {
            PredictError::Upload(_) => UPLOAD_FAILED_MESSAGE.to_string(),
            PredictError::Pipeline(_) => PREDICTION_FAILED_MESSAGE.to_string(),
            PredictError::Malformed(_) => "Malformed multipart body".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            PredictError::Upload(e) => json!({
                "status": "fail",
                "message": self.public_message(),
                "error": e.to_string(),
            }),
            _ => json!({
                "status": "fail",
                "message": self.public_message(),
            }),
        };

        (status, Json(body)).into_response()
    }
}
